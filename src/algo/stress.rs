//! Physical-stress flattening: damped mass-spring relaxation.
//!
//! Every edge is a spring whose rest length is its 3D length. Stiffness is
//! `constant / rest_length`, with the constant chosen per edge on every
//! iteration from the four spring constants: boundary or interior, and
//! currently compressed or stretched.
//!
//! Each iteration is a Jacobi step: every vertex moves by the
//! stiffness-weighted mean of the corrections its springs ask for, scaled by
//! a damping factor. Per-vertex sums run over a fixed neighbour order, so the
//! parallel and sequential paths produce identical results.

use nalgebra::{Point2, Vector2};
use rayon::prelude::*;

use crate::params::{SquishOptions, SquishParameters};

use super::patch::{max_displacement, Patch, PatchEdge, Relaxation};
use super::progress::Slot;

/// Fraction of the Jacobi correction applied per iteration.
const DAMPING: f64 = 0.5;

/// The four spring constants.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SpringConstants {
    pub boundary_compress: f64,
    pub boundary_stretch: f64,
    pub interior_compress: f64,
    pub interior_stretch: f64,
}

impl SpringConstants {
    pub fn from_params(params: &SquishParameters) -> Self {
        Self {
            boundary_compress: params.boundary_compress_constant,
            boundary_stretch: params.boundary_stretch_constant,
            interior_compress: params.interior_compress_constant,
            interior_stretch: params.interior_stretch_constant,
        }
    }

    /// Stiffness of `edge` at its current `length`.
    #[inline]
    fn stiffness(&self, edge: &PatchEdge, length: f64) -> f64 {
        let compressed = length < edge.rest_length;
        let constant = match (edge.boundary, compressed) {
            (true, true) => self.boundary_compress,
            (true, false) => self.boundary_stretch,
            (false, true) => self.interior_compress,
            (false, false) => self.interior_stretch,
        };
        constant / edge.rest_length
    }
}

/// Relax `layout` as a spring network.
pub(crate) fn relax_springs(
    patch: &Patch,
    mut layout: Vec<Point2<f64>>,
    constants: SpringConstants,
    options: &SquishOptions,
    progress: &Slot<'_>,
) -> Relaxation {
    let n = patch.len();
    let threshold = options.convergence_tolerance * patch.mean_edge_length();

    let mut iterations = 0;
    let mut displacement = 0.0;
    let mut converged = false;

    while iterations < options.max_iterations {
        if iterations % 16 == 0 {
            progress.iteration(iterations, options.max_iterations, "relaxing springs");
        }
        iterations += 1;

        let next: Vec<Point2<f64>> = if options.parallel {
            (0..n)
                .into_par_iter()
                .map(|v| layout[v] + vertex_step(patch, &layout, v, &constants))
                .collect()
        } else {
            (0..n)
                .map(|v| layout[v] + vertex_step(patch, &layout, v, &constants))
                .collect()
        };

        displacement = max_displacement(&layout, &next);
        layout = next;
        if displacement < threshold {
            converged = true;
            break;
        }
    }

    log::debug!(
        "spring relaxation: {} iterations, max displacement {:.3e}",
        iterations,
        displacement
    );

    Relaxation {
        positions: layout,
        iterations,
        converged,
        max_displacement: displacement,
    }
}

/// Damped Jacobi correction for vertex `v`.
fn vertex_step(
    patch: &Patch,
    layout: &[Point2<f64>],
    v: usize,
    constants: &SpringConstants,
) -> Vector2<f64> {
    let mut pull = Vector2::zeros();
    let mut total = 0.0;
    for &(other, e) in &patch.adjacency[v] {
        let edge = &patch.edges[e];
        let d = layout[other] - layout[v];
        let length = d.norm();
        if length == 0.0 {
            continue;
        }
        let k = constants.stiffness(edge, length);
        pull += d * (k * (length - edge.rest_length) / length);
        total += k;
    }
    if total > 0.0 {
        pull * (DAMPING / total)
    } else {
        Vector2::zeros()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::conformal::conformal_layout;
    use crate::algo::patch::tests::grid_patch;
    use crate::algo::progress::Progress;

    /// Total spring energy `sum k/2 (length - rest)^2` of a layout.
    fn spring_energy(patch: &Patch, layout: &[Point2<f64>], constants: &SpringConstants) -> f64 {
        patch
            .edges
            .iter()
            .map(|e| {
                let [a, b] = e.vertices;
                let length = (layout[b] - layout[a]).norm();
                0.5 * constants.stiffness(e, length) * (length - e.rest_length).powi(2)
            })
            .sum()
    }

    fn unit_constants() -> SpringConstants {
        SpringConstants::from_params(&SquishParameters::default())
    }

    #[test]
    fn test_stiffness_selection() {
        let constants = SpringConstants::from_params(
            &SquishParameters::default().with_spring_constants(1.0, 2.0, 3.0, 4.0),
        );
        let boundary = PatchEdge {
            vertices: [0, 1],
            rest_length: 2.0,
            boundary: true,
        };
        let interior = PatchEdge {
            boundary: false,
            ..boundary
        };
        assert_eq!(constants.stiffness(&boundary, 1.0), 0.5);
        assert_eq!(constants.stiffness(&boundary, 3.0), 1.0);
        assert_eq!(constants.stiffness(&interior, 1.0), 1.5);
        assert_eq!(constants.stiffness(&interior, 3.0), 2.0);
    }

    #[test]
    fn test_planar_patch_is_at_rest() {
        let patch = grid_patch(3, |_, _| 0.0);
        let options = SquishOptions::default();
        let init = conformal_layout(&patch, &options).unwrap();
        let out = relax_springs(&patch, init, unit_constants(), &options, &Progress::none().slot(0, 1));
        assert!(out.converged);
        assert_eq!(out.iterations, 1);
    }

    #[test]
    fn test_relaxation_lowers_energy() {
        let patch = grid_patch(6, |x, y| 0.5 * (x * x + y * y));
        let options = SquishOptions::default().with_max_iterations(300);
        let init = conformal_layout(&patch, &options).unwrap();
        let before = spring_energy(&patch, &init, &unit_constants());
        let out = relax_springs(&patch, init, unit_constants(), &options, &Progress::none().slot(0, 1));
        let after = spring_energy(&patch, &out.positions, &unit_constants());
        assert!(after < before, "energy {after} not below {before}");
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let patch = grid_patch(5, |x, y| (x - y).powi(2));
        let options = SquishOptions::default().with_max_iterations(40);
        let init = conformal_layout(&patch, &options).unwrap();

        let par = relax_springs(&patch, init.clone(), unit_constants(), &options, &Progress::none().slot(0, 1));
        let seq = relax_springs(
            &patch,
            init,
            unit_constants(),
            &options.clone().sequential(),
            &Progress::none().slot(0, 1),
        );
        assert_eq!(par.positions, seq.positions);
        assert_eq!(par.iterations, seq.iterations);
    }
}
