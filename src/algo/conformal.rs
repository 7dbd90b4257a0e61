//! Least squares conformal initial layout.
//!
//! Both flattening algorithms start from an LSCM embedding: the conformal
//! energy is minimised with two boundary vertices pinned at their 3D distance
//! apart. The pins are eliminated from the linear system rather than enforced
//! by penalty, so the reduced system is well conditioned and symmetric
//! positive definite.
//!
//! The layout is then scaled uniformly to the component's 3D area and
//! mirrored if it came out with reversed orientation.
//!
//! # References
//!
//! - Lévy, B., Petitjean, S., Ray, N., & Maillot, J. (2002). "Least squares
//!   conformal maps for automatic texture atlas generation." ACM SIGGRAPH.

use nalgebra::{DVector, Point2, Point3};

use crate::error::{Result, SquishError};
use crate::params::SquishOptions;

use super::patch::Patch;
use super::sparse::{conjugate_gradient, CsrMatrix};

/// A vertex held at a fixed 2D position.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Pin {
    pub vertex: usize,
    pub position: Point2<f64>,
}

/// Compute the initial 2D layout of `patch`.
pub(crate) fn conformal_layout(patch: &Patch, options: &SquishOptions) -> Result<Vec<Point2<f64>>> {
    let (pin0, pin1) = select_pins(patch)?;
    let n = patch.len();

    // Unknown k < n is u_k, k >= n is v_(k - n).
    let pinned = |k: usize| -> Option<f64> {
        let (vertex, axis) = (k % n, k / n);
        [pin0, pin1]
            .iter()
            .find(|p| p.vertex == vertex)
            .map(|p| if axis == 0 { p.position.x } else { p.position.y })
    };

    let mut reduced = vec![usize::MAX; 2 * n];
    let mut free = 0;
    for (k, slot) in reduced.iter_mut().enumerate() {
        if pinned(k).is_none() {
            *slot = free;
            free += 1;
        }
    }

    let mut triplets = Vec::with_capacity(patch.triangles.len() * 36);
    let mut rhs = DVector::zeros(free);
    for (row, col, value) in conformal_energy(patch) {
        let r = reduced[row];
        if r == usize::MAX {
            continue;
        }
        match pinned(col) {
            Some(fixed) => rhs[r] -= value * fixed,
            None => triplets.push((r, reduced[col], value)),
        }
    }
    let matrix = CsrMatrix::from_triplets(free, free, triplets);

    let outcome = conjugate_gradient(
        &matrix,
        &rhs,
        None,
        options.cg_max_iterations,
        options.cg_tolerance,
    );
    if !outcome.converged {
        log::warn!(
            "conformal layout: linear solve stopped after {} iterations without converging",
            outcome.iterations
        );
    }
    log::debug!(
        "conformal layout: {} unknowns, {} iterations",
        free,
        outcome.iterations
    );

    let value = |k: usize| pinned(k).unwrap_or_else(|| outcome.solution[reduced[k]]);
    let mut layout: Vec<Point2<f64>> = (0..n).map(|i| Point2::new(value(i), value(n + i))).collect();

    let area_2d = patch.signed_area_2d(&layout);
    let area_3d = patch.area();
    if !(area_2d.abs() > f64::EPSILON * area_3d) {
        return Err(SquishError::degenerate("conformal layout collapsed to zero area"));
    }

    let scale = (area_3d / area_2d.abs()).sqrt();
    let mirror = if area_2d < 0.0 { -1.0 } else { 1.0 };
    let origin = pin0.position;
    for p in &mut layout {
        let d = *p - origin;
        *p = origin + nalgebra::Vector2::new(d.x * scale, d.y * scale * mirror);
    }

    Ok(layout)
}

/// Two far-apart boundary vertices, placed on the x axis at their 3D distance.
///
/// Linear in the boundary size: start from the boundary vertex lowest along
/// the longest bounding-box axis, then sweep twice for the farthest vertex.
/// Ties go to the lowest index.
pub(crate) fn select_pins(patch: &Patch) -> Result<(Pin, Pin)> {
    let boundary: Vec<usize> = (0..patch.len()).filter(|&v| patch.boundary[v]).collect();
    if boundary.len() < 2 {
        return Err(SquishError::degenerate("component has no boundary"));
    }

    let points = || boundary.iter().map(|&v| patch.positions[v]);
    let (min, max) = points().fold(
        (
            Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        ),
        |(lo, hi), p| (lo.inf(&p), hi.sup(&p)),
    );
    let axis = (max - min).imax();

    let mut start = boundary[0];
    for &v in &boundary[1..] {
        if patch.positions[v][axis] < patch.positions[start][axis] {
            start = v;
        }
    }

    let farthest = |from: usize| {
        let mut best = (from, -1.0);
        for &v in &boundary {
            let d = (patch.positions[v] - patch.positions[from]).norm_squared();
            if d > best.1 {
                best = (v, d);
            }
        }
        best
    };
    let (b, _) = farthest(start);
    let (a, best_dist) = farthest(b);
    let best = (a.min(b), a.max(b));

    let distance = best_dist.sqrt();
    if !(distance > 0.0) {
        return Err(SquishError::degenerate("boundary has zero extent"));
    }

    Ok((
        Pin {
            vertex: best.0,
            position: Point2::origin(),
        },
        Pin {
            vertex: best.1,
            position: Point2::new(distance, 0.0),
        },
    ))
}

/// Triplets of the area-weighted conformal energy over unknowns `[u; v]`.
fn conformal_energy(patch: &Patch) -> Vec<(usize, usize, f64)> {
    let n = patch.len();
    let mut triplets = Vec::with_capacity(patch.triangles.len() * 36);

    for tri in &patch.triangles {
        let Some(local) = local_frame(&tri.map(|v| patch.positions[v])) else {
            continue;
        };
        let [q0, q1, q2] = local;
        let area = 0.5 * (q1 - q0).perp(&(q2 - q0));
        let inv_2a = 1.0 / (2.0 * area);

        // Gradient of the linear interpolant: d/dx and d/dy coefficients per corner.
        let grad = [
            ((q1.y - q2.y) * inv_2a, (q2.x - q1.x) * inv_2a),
            ((q2.y - q0.y) * inv_2a, (q0.x - q2.x) * inv_2a),
            ((q0.y - q1.y) * inv_2a, (q1.x - q0.x) * inv_2a),
        ];

        for (a, &(ax_i, ay_i)) in grad.iter().enumerate() {
            let vi = tri[a];
            for (b, &(ax_j, ay_j)) in grad.iter().enumerate() {
                let vj = tri[b];
                let uu = (ax_i * ax_j + ay_i * ay_j) * area;
                let uv = (ay_i * ax_j - ax_i * ay_j) * area;
                triplets.push((vi, vj, uu));
                triplets.push((n + vi, n + vj, uu));
                triplets.push((vi, n + vj, uv));
                triplets.push((n + vi, vj, -uv));
            }
        }
    }

    triplets
}

/// Isometric 2D coordinates of a 3D triangle, first corner at the origin and
/// first side along +x. `None` for a degenerate triangle.
pub(crate) fn local_frame(corners: &[Point3<f64>; 3]) -> Option<[Point2<f64>; 3]> {
    let e1 = corners[1] - corners[0];
    let e2 = corners[2] - corners[0];
    let len = e1.norm();
    let normal = e1.cross(&e2);
    if len == 0.0 || normal.norm() == 0.0 {
        return None;
    }
    let x_axis = e1 / len;
    let y_axis = normal.cross(&e1).normalize();
    Some([
        Point2::origin(),
        Point2::new(len, 0.0),
        Point2::new(e2.dot(&x_axis), e2.dot(&y_axis)),
    ])
}
