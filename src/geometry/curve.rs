//! Curves and their polyline sampling.

use nalgebra::{Point2, Point3};

use crate::error::{Result, SquishError};

use super::nurbs::NurbsCurve;

/// Maximum bisection depth when refining a curve interval.
const MAX_REFINE_DEPTH: usize = 24;

/// A curve in 3D.
#[derive(Debug, Clone, PartialEq)]
pub enum Curve {
    /// Straight segment.
    Line {
        /// Start point.
        start: Point3<f64>,
        /// End point.
        end: Point3<f64>,
    },
    /// Open polyline through at least two points.
    Polyline(Vec<Point3<f64>>),
    /// NURBS curve.
    Nurbs(NurbsCurve),
}

impl Curve {
    /// Straight segment between two points.
    pub fn line(start: Point3<f64>, end: Point3<f64>) -> Self {
        Curve::Line { start, end }
    }

    /// Short name of the curve type.
    pub fn kind(&self) -> &'static str {
        match self {
            Curve::Line { .. } => "line",
            Curve::Polyline(_) => "polyline",
            Curve::Nurbs(_) => "nurbs curve",
        }
    }

    /// Sample the curve as an ordered point list.
    ///
    /// Every chord of the result deviates from the curve by at most
    /// `tolerance` and is no longer than `max_segment`. Both ends are
    /// included exactly.
    pub fn sample(&self, tolerance: f64, max_segment: f64) -> Result<Vec<Point3<f64>>> {
        if !(max_segment > 0.0) || !(tolerance > 0.0) {
            return Err(SquishError::invalid_param(
                "max_segment",
                max_segment,
                "sampling resolution must be positive",
            ));
        }

        match self {
            Curve::Line { start, end } => {
                if (end - start).norm() == 0.0 {
                    return Err(SquishError::invalid_input("line has zero length"));
                }
                Ok(subdivide_polyline(&[*start, *end], max_segment))
            }
            Curve::Polyline(points) => {
                if points.len() < 2 {
                    return Err(SquishError::invalid_input(
                        "polyline needs at least two points",
                    ));
                }
                let length: f64 = points.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
                if length == 0.0 {
                    return Err(SquishError::invalid_input("polyline has zero length"));
                }
                Ok(subdivide_polyline(points, max_segment))
            }
            Curve::Nurbs(nurbs) => sample_nurbs(nurbs, tolerance, max_segment),
        }
    }
}

/// Split every segment so that none is longer than `max_segment`.
fn subdivide_polyline(points: &[Point3<f64>], max_segment: f64) -> Vec<Point3<f64>> {
    let mut out = vec![points[0]];
    for w in points.windows(2) {
        let len = (w[1] - w[0]).norm();
        let pieces = ((len / max_segment).ceil() as usize).max(1);
        for k in 1..=pieces {
            let t = k as f64 / pieces as f64;
            out.push(w[0] + (w[1] - w[0]) * t);
        }
    }
    out
}

fn sample_nurbs(curve: &NurbsCurve, tolerance: f64, max_segment: f64) -> Result<Vec<Point3<f64>>> {
    let breaks = curve.breakpoints();
    // Interior probes catch spans whose chord happens to pass through the midpoint.
    let probes = (curve.degree() + 1).max(2);

    let mut params = vec![breaks[0]];
    for w in breaks.windows(2) {
        for k in 1..=probes {
            params.push(w[0] + (w[1] - w[0]) * k as f64 / probes as f64);
        }
    }

    let mut out = vec![curve.point_at(params[0])];
    for w in params.windows(2) {
        refine(curve, w[0], w[1], tolerance, max_segment, 0, &mut out);
    }

    let length: f64 = out.windows(2).map(|w| (w[1] - w[0]).norm()).sum();
    if length == 0.0 {
        return Err(SquishError::invalid_input("curve has zero length"));
    }
    Ok(out)
}

/// Append samples for `(t0, t1]`, bisecting while the chord is too coarse.
fn refine(
    curve: &NurbsCurve,
    t0: f64,
    t1: f64,
    tolerance: f64,
    max_segment: f64,
    depth: usize,
    out: &mut Vec<Point3<f64>>,
) {
    let p0 = curve.point_at(t0);
    let p1 = curve.point_at(t1);
    let tm = 0.5 * (t0 + t1);
    let pm = curve.point_at(tm);

    let too_long = (p1 - p0).norm() > max_segment;
    let too_far = distance_to_segment(&pm, &p0, &p1) > tolerance;

    if depth < MAX_REFINE_DEPTH && (too_long || too_far) {
        refine(curve, t0, tm, tolerance, max_segment, depth + 1, out);
        refine(curve, tm, t1, tolerance, max_segment, depth + 1, out);
    } else {
        out.push(p1);
    }
}

fn distance_to_segment(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

/// A polyline in the flattening plane.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polyline2 {
    /// The vertices, in order.
    pub points: Vec<Point2<f64>>,
}

impl Polyline2 {
    /// Create a polyline from its vertices.
    pub fn new(points: Vec<Point2<f64>>) -> Self {
        Self { points }
    }

    /// Total length.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    /// Lift onto the `z = 0` plane as a 3D polyline curve.
    pub fn to_curve(&self) -> Curve {
        Curve::Polyline(
            self.points
                .iter()
                .map(|p| Point3::new(p.x, p.y, 0.0))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_sampling_respects_max_segment() {
        let line = Curve::line(Point3::origin(), Point3::new(1.0, 0.0, 0.0));
        let pts = line.sample(1e-3, 0.3).unwrap();
        assert_eq!(pts.len(), 5); // 4 pieces of 0.25
        assert_eq!(pts[0], Point3::origin());
        assert_eq!(*pts.last().unwrap(), Point3::new(1.0, 0.0, 0.0));
        for w in pts.windows(2) {
            assert!((w[1] - w[0]).norm() <= 0.3 + 1e-12);
        }
    }

    #[test]
    fn test_zero_length_curves_rejected() {
        let line = Curve::line(Point3::origin(), Point3::origin());
        assert!(line.sample(1e-3, 1.0).unwrap_err().is_invalid_input());

        let poly = Curve::Polyline(vec![Point3::origin()]);
        assert!(poly.sample(1e-3, 1.0).unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_nurbs_sampling_within_tolerance() {
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let arc = NurbsCurve::new(
            2,
            vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
            vec![
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![1.0, w, 1.0],
        )
        .unwrap();
        let tol = 1e-4;
        let pts = Curve::Nurbs(arc).sample(tol, 10.0).unwrap();

        // Sagitta of each chord on the unit circle must stay under tolerance.
        for seg in pts.windows(2) {
            let mid = Point3::from((seg[0].coords + seg[1].coords) * 0.5);
            assert!(1.0 - mid.coords.norm() <= tol * 1.1);
        }
        assert!((pts[0] - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((pts.last().unwrap() - Point3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_polyline2_lift() {
        let pl = Polyline2::new(vec![Point2::new(0.0, 0.0), Point2::new(3.0, 4.0)]);
        assert!((pl.length() - 5.0).abs() < 1e-12);
        match pl.to_curve() {
            Curve::Polyline(pts) => assert_eq!(pts[1], Point3::new(3.0, 4.0, 0.0)),
            other => panic!("expected polyline, got {:?}", other),
        }
    }
}
