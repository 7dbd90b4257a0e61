//! Geometric flattening: as-rigid-as-possible energy minimisation.
//!
//! Alternates between:
//! 1. **Local step**: the best-fit rotation of every triangle's 3D shape onto
//!    its current 2D image
//! 2. **Global step**: a cotangent-Laplacian solve for the positions that best
//!    match the rotated shapes
//!
//! One vertex per component is held fixed to remove the translational
//! freedom; the reduced system is solved by warm-started conjugate gradient.
//!
//! # References
//!
//! - Liu, L., Zhang, L., Xu, Y., Gotsman, C., & Gortler, S. J. (2008).
//!   "A Local/Global Approach to Mesh Parameterization." SGP 2008.

use nalgebra::{DVector, Matrix2, Point2, Point3, Vector2};

use crate::params::SquishOptions;

use super::conformal::local_frame;
use super::patch::{max_displacement, Patch, Relaxation};
use super::progress::Slot;
use super::sparse::{conjugate_gradient, CsrMatrix};

/// Smallest per-side cotangent weight.
const MIN_WEIGHT: f64 = 1e-6;

/// Relax `layout` towards an isometric embedding of `patch`.
pub(crate) fn relax_geometric(
    patch: &Patch,
    mut layout: Vec<Point2<f64>>,
    options: &SquishOptions,
    progress: &Slot<'_>,
) -> Relaxation {
    let n = patch.len();
    let threshold = options.convergence_tolerance * patch.mean_edge_length();

    let shapes = rest_shapes(patch);
    let weights = side_weights(patch);
    let fixed = (0..n).find(|&v| patch.boundary[v]).unwrap_or(0);
    let reduced: Vec<usize> = (0..n)
        .map(|v| match v.cmp(&fixed) {
            std::cmp::Ordering::Less => v,
            std::cmp::Ordering::Equal => usize::MAX,
            std::cmp::Ordering::Greater => v - 1,
        })
        .collect();
    let system = laplacian(patch, &weights, &reduced);

    let mut iterations = 0;
    let mut displacement = f64::INFINITY;
    let mut converged = false;

    while iterations < options.max_iterations {
        progress.iteration(iterations, options.max_iterations, "geometric flattening");
        iterations += 1;

        let rotations = local_rotations(patch, &layout, &shapes, &weights);
        let (bx, by) = global_rhs(patch, &layout, &shapes, &weights, &rotations, &reduced, fixed);

        let mut x0 = DVector::zeros(n - 1);
        let mut y0 = DVector::zeros(n - 1);
        for v in 0..n {
            if v != fixed {
                x0[reduced[v]] = layout[v].x;
                y0[reduced[v]] = layout[v].y;
            }
        }
        let sx = conjugate_gradient(&system, &bx, Some(&x0), options.cg_max_iterations, options.cg_tolerance);
        let sy = conjugate_gradient(&system, &by, Some(&y0), options.cg_max_iterations, options.cg_tolerance);
        if !(sx.converged && sy.converged) {
            log::debug!("geometric flattening: global step {iterations} hit the linear solver cap");
        }

        let next: Vec<Point2<f64>> = (0..n)
            .map(|v| {
                if v == fixed {
                    layout[v]
                } else {
                    Point2::new(sx.solution[reduced[v]], sy.solution[reduced[v]])
                }
            })
            .collect();

        displacement = max_displacement(&layout, &next);
        layout = next;
        if displacement < threshold {
            converged = true;
            break;
        }
    }

    log::debug!(
        "geometric flattening: {} iterations, max displacement {:.3e}",
        iterations,
        displacement
    );

    Relaxation {
        positions: layout,
        iterations,
        converged,
        max_displacement: if iterations == 0 { 0.0 } else { displacement },
    }
}

/// Side vectors `q[s + 1] - q[s]` of each triangle in its own isometric frame.
fn rest_shapes(patch: &Patch) -> Vec<[Vector2<f64>; 3]> {
    patch
        .triangles
        .iter()
        .map(|tri| match local_frame(&tri.map(|v| patch.positions[v])) {
            Some([q0, q1, q2]) => [q1 - q0, q2 - q1, q0 - q2],
            None => [Vector2::zeros(); 3],
        })
        .collect()
}

/// Half-cotangent weight of each triangle side, from the angle opposite it.
fn side_weights(patch: &Patch) -> Vec<[f64; 3]> {
    patch
        .triangles
        .iter()
        .map(|tri| {
            let p = tri.map(|v| patch.positions[v]);
            let mut w = [0.0; 3];
            for (s, weight) in w.iter_mut().enumerate() {
                let opposite = (s + 2) % 3;
                let cot = cotangent(&p[opposite], &p[s], &p[(s + 1) % 3]);
                *weight = (0.5 * cot).max(MIN_WEIGHT);
            }
            w
        })
        .collect()
}

/// Cotangent of the angle at `a` in triangle `(a, b, c)`.
fn cotangent(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ab = b - a;
    let ac = c - a;
    let cross = ab.cross(&ac).norm();
    if cross == 0.0 {
        0.0
    } else {
        ab.dot(&ac) / cross
    }
}

/// Cotangent Laplacian with the fixed vertex removed.
fn laplacian(patch: &Patch, weights: &[[f64; 3]], reduced: &[usize]) -> CsrMatrix {
    let mut triplets = Vec::with_capacity(patch.triangles.len() * 12);
    for (tri, w) in patch.triangles.iter().zip(weights) {
        for s in 0..3 {
            let (i, j) = (reduced[tri[s]], reduced[tri[(s + 1) % 3]]);
            if i != usize::MAX {
                triplets.push((i, i, w[s]));
            }
            if j != usize::MAX {
                triplets.push((j, j, w[s]));
            }
            if i != usize::MAX && j != usize::MAX {
                triplets.push((i, j, -w[s]));
                triplets.push((j, i, -w[s]));
            }
        }
    }
    let n = reduced.len() - 1;
    CsrMatrix::from_triplets(n, n, triplets)
}

/// Best-fit rotation per triangle.
fn local_rotations(
    patch: &Patch,
    layout: &[Point2<f64>],
    shapes: &[[Vector2<f64>; 3]],
    weights: &[[f64; 3]],
) -> Vec<Matrix2<f64>> {
    patch
        .triangles
        .iter()
        .enumerate()
        .map(|(t, tri)| {
            let mut s = Matrix2::zeros();
            for side in 0..3 {
                let current = layout[tri[(side + 1) % 3]] - layout[tri[side]];
                s += weights[t][side] * current * shapes[t][side].transpose();
            }
            closest_rotation(&s)
        })
        .collect()
}

/// The rotation `R` maximising `trace(R^T S)`.
fn closest_rotation(s: &Matrix2<f64>) -> Matrix2<f64> {
    let angle = (s[(1, 0)] - s[(0, 1)]).atan2(s[(0, 0)] + s[(1, 1)]);
    let (sin, cos) = angle.sin_cos();
    Matrix2::new(cos, -sin, sin, cos)
}

fn global_rhs(
    patch: &Patch,
    layout: &[Point2<f64>],
    shapes: &[[Vector2<f64>; 3]],
    weights: &[[f64; 3]],
    rotations: &[Matrix2<f64>],
    reduced: &[usize],
    fixed: usize,
) -> (DVector<f64>, DVector<f64>) {
    let n = reduced.len() - 1;
    let mut bx = DVector::zeros(n);
    let mut by = DVector::zeros(n);
    let anchor = layout[fixed];

    for (t, tri) in patch.triangles.iter().enumerate() {
        for side in 0..3 {
            let (a, b) = (tri[side], tri[(side + 1) % 3]);
            let w = weights[t][side];
            let target = w * (rotations[t] * shapes[t][side]);

            // Energy w * |(p_b - p_a) - R e|^2 pulls p_b along +Re and p_a along -Re.
            if a != fixed {
                bx[reduced[a]] -= target.x;
                by[reduced[a]] -= target.y;
                if b == fixed {
                    bx[reduced[a]] += w * anchor.x;
                    by[reduced[a]] += w * anchor.y;
                }
            }
            if b != fixed {
                bx[reduced[b]] += target.x;
                by[reduced[b]] += target.y;
                if a == fixed {
                    bx[reduced[b]] += w * anchor.x;
                    by[reduced[b]] += w * anchor.y;
                }
            }
        }
    }

    (bx, by)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::conformal::conformal_layout;
    use crate::algo::patch::tests::grid_patch;
    use crate::algo::progress::Progress;

    fn max_edge_error(patch: &Patch, layout: &[Point2<f64>]) -> f64 {
        patch
            .edges
            .iter()
            .map(|e| {
                let [a, b] = e.vertices;
                ((layout[b] - layout[a]).norm() / e.rest_length - 1.0).abs()
            })
            .fold(0.0, f64::max)
    }

    #[test]
    fn test_closest_rotation() {
        let angle: f64 = 0.7;
        let r = Matrix2::new(angle.cos(), -angle.sin(), angle.sin(), angle.cos());
        let scaled = r * 3.0;
        assert!((closest_rotation(&scaled) - r).norm() < 1e-12);
        assert!((closest_rotation(&Matrix2::identity()) - Matrix2::identity()).norm() < 1e-15);
    }

    #[test]
    fn test_planar_patch_converges_immediately() {
        let patch = grid_patch(3, |_, _| 0.0);
        let options = SquishOptions::default();
        let init = conformal_layout(&patch, &options).unwrap();
        let out = relax_geometric(&patch, init, &options, &Progress::none().slot(0, 1));
        assert!(out.converged);
        assert!(out.iterations <= 2);
        assert!(max_edge_error(&patch, &out.positions) < 1e-8);
    }

    #[test]
    fn test_reduces_distortion_on_curved_patch() {
        let patch = grid_patch(6, |x, y| 0.4 * (x - 0.5) * (y - 0.5) * 4.0);
        let options = SquishOptions::default().with_max_iterations(200);
        let init = conformal_layout(&patch, &options).unwrap();
        let before = max_edge_error(&patch, &init);
        let out = relax_geometric(&patch, init, &options, &Progress::none().slot(0, 1));
        let after = max_edge_error(&patch, &out.positions);
        assert!(after < before, "distortion {after} not below {before}");
        assert!(patch.signed_area_2d(&out.positions) > 0.0);
    }
}
