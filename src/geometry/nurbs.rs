//! Non-uniform rational B-spline curves and surfaces.
//!
//! Evaluation follows the standard span search plus Cox-de Boor basis
//! recursion (Piegl & Tiller, *The NURBS Book*, A2.1 and A2.2), carried out in
//! homogeneous coordinates so weighted control points evaluate exactly.

use nalgebra::{Point3, Vector4};

use crate::error::{Result, SquishError};

/// Find the knot span index containing `u`.
///
/// `count` is the number of control points. The last span is returned for
/// `u` at the end of the domain so that the end point is reachable.
pub(crate) fn find_span(count: usize, degree: usize, u: f64, knots: &[f64]) -> usize {
    let n = count - 1;
    if u >= knots[n + 1] {
        return n;
    }
    if u <= knots[degree] {
        return degree;
    }

    let mut low = degree;
    let mut high = n + 1;
    let mut mid = (low + high) / 2;
    while u < knots[mid] || u >= knots[mid + 1] {
        if u < knots[mid] {
            high = mid;
        } else {
            low = mid;
        }
        mid = (low + high) / 2;
    }
    mid
}

/// Evaluate the `degree + 1` non-vanishing basis functions at `u`.
pub(crate) fn basis_funs(span: usize, u: f64, degree: usize, knots: &[f64]) -> Vec<f64> {
    let mut n = vec![0.0; degree + 1];
    let mut left = vec![0.0; degree + 1];
    let mut right = vec![0.0; degree + 1];
    n[0] = 1.0;

    for j in 1..=degree {
        left[j] = u - knots[span + 1 - j];
        right[j] = knots[span + j] - u;
        let mut saved = 0.0;
        for r in 0..j {
            let denom = right[r + 1] + left[j - r];
            let temp = if denom.abs() < f64::EPSILON {
                0.0
            } else {
                n[r] / denom
            };
            n[r] = saved + right[r + 1] * temp;
            saved = left[j - r] * temp;
        }
        n[j] = saved;
    }

    n
}

/// Clamped knot vector with uniformly spaced interior knots on `[0, 1]`.
pub(crate) fn clamped_uniform_knots(count: usize, degree: usize) -> Vec<f64> {
    let interior = count - degree - 1;
    let mut knots = Vec::with_capacity(count + degree + 1);
    knots.extend(std::iter::repeat(0.0).take(degree + 1));
    for i in 1..=interior {
        knots.push(i as f64 / (interior + 1) as f64);
    }
    knots.extend(std::iter::repeat(1.0).take(degree + 1));
    knots
}

fn validate_direction(
    name: &'static str,
    degree: usize,
    count: usize,
    knots: &[f64],
) -> Result<()> {
    if degree == 0 {
        return Err(SquishError::invalid_param(name, degree, "degree must be at least 1"));
    }
    if count < degree + 1 {
        return Err(SquishError::invalid_input(format!(
            "{name}: {count} control points cannot support degree {degree}"
        )));
    }
    if knots.len() != count + degree + 1 {
        return Err(SquishError::invalid_input(format!(
            "{name}: expected {} knots, got {}",
            count + degree + 1,
            knots.len()
        )));
    }
    if knots.iter().any(|k| !k.is_finite()) || knots.windows(2).any(|w| w[1] < w[0]) {
        return Err(SquishError::invalid_input(format!(
            "{name}: knot vector must be finite and non-decreasing"
        )));
    }
    if knots[count] - knots[degree] <= 0.0 {
        return Err(SquishError::invalid_input(format!("{name}: empty parameter domain")));
    }
    Ok(())
}

fn validate_weights(weights: &[f64], count: usize) -> Result<()> {
    if weights.len() != count {
        return Err(SquishError::invalid_input(format!(
            "expected {count} weights, got {}",
            weights.len()
        )));
    }
    if weights.iter().any(|w| !w.is_finite() || *w <= 0.0) {
        return Err(SquishError::invalid_input("weights must be finite and positive"));
    }
    Ok(())
}

#[inline]
fn homogeneous(p: &Point3<f64>, w: f64) -> Vector4<f64> {
    Vector4::new(p.x * w, p.y * w, p.z * w, w)
}

#[inline]
fn dehomogenize(h: Vector4<f64>) -> Point3<f64> {
    Point3::new(h.x / h.w, h.y / h.w, h.z / h.w)
}

/// A NURBS curve in 3D.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsCurve {
    degree: usize,
    knots: Vec<f64>,
    control_points: Vec<Point3<f64>>,
    weights: Vec<f64>,
}

impl NurbsCurve {
    /// Create a curve, validating knots and weights.
    pub fn new(
        degree: usize,
        knots: Vec<f64>,
        control_points: Vec<Point3<f64>>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        validate_direction("curve", degree, control_points.len(), &knots)?;
        validate_weights(&weights, control_points.len())?;
        Ok(Self {
            degree,
            knots,
            control_points,
            weights,
        })
    }

    /// Create a non-rational curve with a clamped uniform knot vector.
    pub fn clamped(degree: usize, control_points: Vec<Point3<f64>>) -> Result<Self> {
        if degree == 0 || control_points.len() < degree + 1 {
            return Err(SquishError::invalid_input(format!(
                "{} control points cannot support degree {degree}",
                control_points.len()
            )));
        }
        let knots = clamped_uniform_knots(control_points.len(), degree);
        let weights = vec![1.0; control_points.len()];
        Self::new(degree, knots, control_points, weights)
    }

    /// The polynomial degree.
    pub fn degree(&self) -> usize {
        self.degree
    }

    /// The control points.
    pub fn control_points(&self) -> &[Point3<f64>] {
        &self.control_points
    }

    /// The parameter domain `(start, end)`.
    pub fn domain(&self) -> (f64, f64) {
        (
            self.knots[self.degree],
            self.knots[self.control_points.len()],
        )
    }

    /// Distinct knot values inside the domain, including both ends.
    pub fn breakpoints(&self) -> Vec<f64> {
        let (t0, t1) = self.domain();
        let mut out: Vec<f64> = Vec::new();
        for &k in &self.knots[self.degree..=self.control_points.len()] {
            if k >= t0 && k <= t1 && out.last().map_or(true, |&last| k > last) {
                out.push(k);
            }
        }
        out
    }

    /// Evaluate the curve at parameter `t` (clamped to the domain).
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        let (t0, t1) = self.domain();
        let t = t.clamp(t0, t1);
        let count = self.control_points.len();
        let span = find_span(count, self.degree, t, &self.knots);
        let basis = basis_funs(span, t, self.degree, &self.knots);

        let mut h = Vector4::zeros();
        for (j, b) in basis.iter().enumerate() {
            let idx = span - self.degree + j;
            h += homogeneous(&self.control_points[idx], self.weights[idx]) * *b;
        }
        dehomogenize(h)
    }
}

/// A NURBS surface in 3D.
///
/// Control points are stored row-major with `u` as the slow index:
/// point `(i, j)` lives at `i * count_v + j`.
#[derive(Debug, Clone, PartialEq)]
pub struct NurbsSurface {
    degree_u: usize,
    degree_v: usize,
    count_u: usize,
    count_v: usize,
    knots_u: Vec<f64>,
    knots_v: Vec<f64>,
    control_points: Vec<Point3<f64>>,
    weights: Vec<f64>,
}

impl NurbsSurface {
    /// Create a surface, validating knots and weights.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        degree_u: usize,
        degree_v: usize,
        count_u: usize,
        count_v: usize,
        knots_u: Vec<f64>,
        knots_v: Vec<f64>,
        control_points: Vec<Point3<f64>>,
        weights: Vec<f64>,
    ) -> Result<Self> {
        if control_points.len() != count_u * count_v {
            return Err(SquishError::invalid_input(format!(
                "expected {} control points for a {count_u}x{count_v} grid, got {}",
                count_u * count_v,
                control_points.len()
            )));
        }
        validate_direction("surface u", degree_u, count_u, &knots_u)?;
        validate_direction("surface v", degree_v, count_v, &knots_v)?;
        validate_weights(&weights, control_points.len())?;
        Ok(Self {
            degree_u,
            degree_v,
            count_u,
            count_v,
            knots_u,
            knots_v,
            control_points,
            weights,
        })
    }

    /// Create a non-rational surface with clamped uniform knot vectors.
    pub fn clamped(
        degree_u: usize,
        degree_v: usize,
        count_u: usize,
        count_v: usize,
        control_points: Vec<Point3<f64>>,
    ) -> Result<Self> {
        if degree_u == 0 || degree_v == 0 || count_u <= degree_u || count_v <= degree_v {
            return Err(SquishError::invalid_input(format!(
                "a {count_u}x{count_v} grid cannot support degree ({degree_u}, {degree_v})"
            )));
        }
        let knots_u = clamped_uniform_knots(count_u, degree_u);
        let knots_v = clamped_uniform_knots(count_v, degree_v);
        let weights = vec![1.0; control_points.len()];
        Self::new(
            degree_u,
            degree_v,
            count_u,
            count_v,
            knots_u,
            knots_v,
            control_points,
            weights,
        )
    }

    /// Bilinear patch through four corners `[p00, p10, p11, p01]`.
    pub fn bilinear(corners: [Point3<f64>; 4]) -> Result<Self> {
        let [p00, p10, p11, p01] = corners;
        Self::clamped(1, 1, 2, 2, vec![p00, p01, p10, p11])
    }

    /// Degrees `(u, v)`.
    pub fn degrees(&self) -> (usize, usize) {
        (self.degree_u, self.degree_v)
    }

    /// Control grid size `(u, v)`.
    pub fn control_counts(&self) -> (usize, usize) {
        (self.count_u, self.count_v)
    }

    /// The control points, row-major with `u` as the slow index.
    pub fn control_points(&self) -> &[Point3<f64>] {
        &self.control_points
    }

    /// The parameter domain `((u0, u1), (v0, v1))`.
    pub fn domain(&self) -> ((f64, f64), (f64, f64)) {
        (
            (self.knots_u[self.degree_u], self.knots_u[self.count_u]),
            (self.knots_v[self.degree_v], self.knots_v[self.count_v]),
        )
    }

    /// Evaluate the surface at `(u, v)` (clamped to the domain).
    pub fn point_at(&self, u: f64, v: f64) -> Point3<f64> {
        let ((u0, u1), (v0, v1)) = self.domain();
        let u = u.clamp(u0, u1);
        let v = v.clamp(v0, v1);

        let span_u = find_span(self.count_u, self.degree_u, u, &self.knots_u);
        let span_v = find_span(self.count_v, self.degree_v, v, &self.knots_v);
        let nu = basis_funs(span_u, u, self.degree_u, &self.knots_u);
        let nv = basis_funs(span_v, v, self.degree_v, &self.knots_v);

        let mut h = Vector4::zeros();
        for (a, bu) in nu.iter().enumerate() {
            let i = span_u - self.degree_u + a;
            let mut row = Vector4::zeros();
            for (b, bv) in nv.iter().enumerate() {
                let j = span_v - self.degree_v + b;
                let idx = i * self.count_v + j;
                row += homogeneous(&self.control_points[idx], self.weights[idx]) * *bv;
            }
            h += row * *bu;
        }
        dehomogenize(h)
    }

    /// Diagonal of the control net's bounding box.
    pub fn control_net_diagonal(&self) -> f64 {
        let mut min = self.control_points[0];
        let mut max = self.control_points[0];
        for p in &self.control_points {
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        (max - min).norm()
    }
}
