//! The flattening engine.
//!
//! Every connected component is flattened on its own:
//!
//! 1. least-squares conformal initial layout
//! 2. relaxation by the selected algorithm
//! 3. enforcement of the absolute length-ratio limit
//!
//! The components are then packed side by side along +x and the result is
//! rebuilt over the source vertices and faces.

use std::sync::Arc;

use nalgebra::{Point2, Point3, Vector2};

use crate::adapt::adapt;
use crate::error::{Result, SquishError};
use crate::geometry::{Geometry, Mesh};
use crate::mapping::MappingIndex;
use crate::mesh::DiscretizedSurface;
use crate::params::{FlatteningAlgorithm, SquishOptions, SquishParameters};
use crate::result::{FlattenReport, FlattenWarning, FlattenedResult, Provenance, SquishTag};

use super::conformal::conformal_layout;
use super::geometric::relax_geometric;
use super::limits::enforce_limits;
use super::patch::Patch;
use super::progress::Progress;
use super::stress::{relax_springs, SpringConstants};

/// Flatten a discretized surface.
///
/// # Errors
///
/// - [`SquishError::InvalidParameter`] if `params` fails validation
/// - [`SquishError::DegenerateGeometry`] if a component is closed or
///   collapses in the plane
///
/// Non-convergence is not an error: the last iterate is kept and a
/// [`FlattenWarning::NotConverged`] is added to the report.
pub fn flatten(
    surface: &DiscretizedSurface,
    params: &SquishParameters,
    options: &SquishOptions,
) -> Result<FlattenedResult> {
    flatten_with_progress(surface, params, options, &Progress::none())
}

/// Flatten a discretized surface with progress reporting.
pub fn flatten_with_progress(
    surface: &DiscretizedSurface,
    params: &SquishParameters,
    options: &SquishOptions,
    progress: &Progress,
) -> Result<FlattenedResult> {
    params.validate()?;

    let components = surface.components();
    let total = components.len();
    log::info!(
        "flattening {} components ({} variables) with {:?}",
        total,
        surface.num_variables(),
        params.algorithm
    );

    let bounds = params.ratio_bounds();
    let mut patches = Vec::with_capacity(total);
    let mut warnings = Vec::new();
    let mut iterations = 0;
    let mut converged = true;
    let mut max_displacement: f64 = 0.0;

    for (ci, component) in components.iter().enumerate() {
        let patch = Patch::new(surface, component);
        if !patch.has_boundary() {
            return Err(SquishError::degenerate(format!(
                "component {ci} is closed and has no boundary to open it along"
            )));
        }

        let initial = conformal_layout(&patch, options)?;
        let relaxed = match params.algorithm {
            FlatteningAlgorithm::Geometric => {
                relax_geometric(&patch, initial, options, &progress.slot(ci, total))
            }
            FlatteningAlgorithm::PhysicalStress => relax_springs(
                &patch,
                initial,
                SpringConstants::from_params(params),
                options,
                &progress.slot(ci, total),
            ),
        };

        iterations = iterations.max(relaxed.iterations);
        max_displacement = max_displacement.max(relaxed.max_displacement);
        if !relaxed.converged {
            converged = false;
            log::warn!(
                "component {}: not converged after {} iterations (max displacement {:.3e})",
                ci,
                relaxed.iterations,
                relaxed.max_displacement
            );
            warnings.push(FlattenWarning::NotConverged {
                component: ci,
                iterations: relaxed.iterations,
                max_displacement: relaxed.max_displacement,
            });
        }

        let mut layout = relaxed.positions;
        let limits = enforce_limits(&patch, &mut layout, bounds, options)?;
        if let Some(scale) = limits.rescale {
            warnings.push(FlattenWarning::LimitRescaled {
                component: ci,
                scale,
            });
        }

        patches.push((patch, layout));
    }
    progress.finish(total);

    let variable_2d = pack(surface, &patches);

    let (min_ratio, max_ratio) = surface
        .edges()
        .iter()
        .zip(surface.rest_lengths())
        .fold((f64::INFINITY, 0.0f64), |(lo, hi), (edge, &rest)| {
            let [a, b] = edge.vertices;
            let r = (variable_2d[b] - variable_2d[a]).norm() / rest;
            (lo.min(r), hi.max(r))
        });

    let report = FlattenReport {
        algorithm: params.algorithm,
        iterations,
        converged,
        max_displacement,
        min_ratio,
        max_ratio,
        component_sizes: patches.iter().map(|(p, _)| p.len()).collect(),
        warnings,
    };
    log::info!(
        "flattened: {} iterations, length ratio {:.6} ..= {:.6}",
        report.iterations,
        report.min_ratio,
        report.max_ratio
    );

    let mapping = params.save_mapping.then(|| {
        Arc::new(MappingIndex::build(
            surface.positions().to_vec(),
            variable_2d.clone(),
            surface.triangles().to_vec(),
            options,
        ))
    });

    let positions_2d: Vec<Point2<f64>> = surface
        .source_to_variable()
        .iter()
        .map(|v| v.map_or_else(Point2::origin, |v| variable_2d[v]))
        .collect();

    let tag = SquishTag::next();
    let mesh = Mesh::new(
        positions_2d.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect(),
        surface.source_faces().to_vec(),
    )
    .with_provenance(Arc::new(Provenance::new(tag, mapping.clone())));

    Ok(FlattenedResult {
        positions_2d,
        mesh,
        mapping,
        report,
        tag,
    })
}

/// Adapt and flatten any flattenable geometry.
pub fn flatten_geometry(
    geometry: &Geometry,
    params: &SquishParameters,
    options: &SquishOptions,
) -> Result<FlattenedResult> {
    flatten_geometry_with_progress(geometry, params, options, &Progress::none())
}

/// Adapt and flatten any flattenable geometry with progress reporting.
pub fn flatten_geometry_with_progress(
    geometry: &Geometry,
    params: &SquishParameters,
    options: &SquishOptions,
    progress: &Progress,
) -> Result<FlattenedResult> {
    params.validate()?;
    let surface = adapt(geometry, params, options)?;
    flatten_with_progress(&surface, params, options, progress)
}

/// Place component layouts left to right, each with its lower-left corner on
/// the x axis, separated by one mean edge length.
fn pack(surface: &DiscretizedSurface, patches: &[(Patch, Vec<Point2<f64>>)]) -> Vec<Point2<f64>> {
    let gap = surface.mean_edge_length();
    let mut placed = vec![Point2::origin(); surface.num_variables()];
    let mut cursor = 0.0;

    for (patch, layout) in patches {
        let (min, max) = layout.iter().fold(
            (
                Point2::new(f64::INFINITY, f64::INFINITY),
                Point2::new(f64::NEG_INFINITY, f64::NEG_INFINITY),
            ),
            |(lo, hi), p| (lo.inf(p), hi.sup(p)),
        );
        let offset = Vector2::new(cursor - min.x, -min.y);
        for (local, p) in layout.iter().enumerate() {
            placed[patch.variables[local]] = p + offset;
        }
        cursor += (max.x - min.x) + gap;
    }

    placed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapt::adapt_mesh;
    use crate::algo::patch::tests::grid_mesh;
    use crate::geometry::MeshFace;

    fn surface_of(mesh: &Mesh) -> DiscretizedSurface {
        adapt_mesh(mesh, false, &SquishOptions::default()).unwrap()
    }

    fn edge_ratios(mesh: &Mesh, result: &FlattenedResult) -> Vec<f64> {
        let mut ratios = Vec::new();
        for face in &mesh.faces {
            let idx = face.indices();
            for k in 0..idx.len() {
                let (a, b) = (idx[k], idx[(k + 1) % idx.len()]);
                let rest = (mesh.vertices[b] - mesh.vertices[a]).norm();
                let flat = (result.positions_2d()[b] - result.positions_2d()[a]).norm();
                ratios.push(flat / rest);
            }
        }
        ratios
    }

    #[test]
    fn test_single_triangle_is_exact() {
        let mesh = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(3.0, 1.0, 2.0),
                Point3::new(-1.0, 2.0, 1.0),
            ],
            &[[0, 1, 2]],
        );
        let params = SquishParameters::default().with_algorithm(FlatteningAlgorithm::Geometric);
        let result = flatten(&surface_of(&mesh), &params, &SquishOptions::default()).unwrap();
        for r in edge_ratios(&mesh, &result) {
            assert!((r - 1.0).abs() < 1e-9, "ratio {r}");
        }
        assert!(result.report().converged);
    }

    #[test]
    fn test_components_are_packed_apart() {
        let mut mesh = grid_mesh(2, |_, _| 0.0);
        let offset = mesh.vertices.len();
        let second = grid_mesh(2, |x, y| x * y);
        mesh.vertices.extend(second.vertices.iter().map(|p| p + nalgebra::Vector3::new(0.0, 0.0, 5.0)));
        mesh.faces.extend(second.faces.iter().map(|f| match *f {
            MeshFace::Triangle(t) => MeshFace::Triangle(t.map(|v| v + offset)),
            MeshFace::Quad(q) => MeshFace::Quad(q.map(|v| v + offset)),
        }));

        let result = flatten(&surface_of(&mesh), &SquishParameters::default(), &SquishOptions::default()).unwrap();
        assert_eq!(result.report().component_sizes, vec![9, 9]);

        let first_max = result.positions_2d()[..offset].iter().map(|p| p.x).fold(f64::MIN, f64::max);
        let second_min = result.positions_2d()[offset..].iter().map(|p| p.x).fold(f64::MAX, f64::min);
        assert!(second_min > first_max);
        assert!(result.positions_2d().iter().all(|p| p.y >= -1e-12));
    }

    #[test]
    fn test_closed_component_is_degenerate() {
        let tetra = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.0, 0.0, 1.0),
            ],
            &[[0, 2, 1], [0, 1, 3], [1, 2, 3], [0, 3, 2]],
        );
        let err = flatten(&surface_of(&tetra), &SquishParameters::default(), &SquishOptions::default()).unwrap_err();
        assert!(matches!(err, SquishError::DegenerateGeometry { .. }));
    }

    #[test]
    fn test_stretch_limit_holds() {
        let mesh = grid_mesh(5, |x, y| 0.6 * (x - 0.5).powi(2) - 0.6 * (y - 0.5).powi(2));
        let params = SquishParameters::no_stretch();
        let result = flatten(&surface_of(&mesh), &params, &SquishOptions::default()).unwrap();
        assert!(result.report().max_ratio <= 1.0);
        assert!(edge_ratios(&mesh, &result).iter().all(|&r| r <= 1.0));
    }

    #[test]
    fn test_mapping_follows_save_flag() {
        let mesh = grid_mesh(2, |_, _| 0.0);
        let surface = surface_of(&mesh);
        let with = flatten(&surface, &SquishParameters::default(), &SquishOptions::default()).unwrap();
        assert!(with.has_mapping());
        assert!(with.mesh().provenance().unwrap().mapping().is_ok());

        let params = SquishParameters::default().with_save_mapping(false);
        let without = flatten(&surface, &params, &SquishOptions::default()).unwrap();
        assert!(matches!(without.mapping(), Err(SquishError::MappingUnavailable)));
        assert!(without.mesh().provenance().is_some());
        assert_ne!(with.tag(), without.tag());
    }

    #[test]
    fn test_invalid_params_rejected_before_work() {
        let mesh = grid_mesh(1, |_, _| 0.0);
        let params = SquishParameters::default().with_absolute_limit(2.0);
        assert!(matches!(
            flatten(&surface_of(&mesh), &params, &SquishOptions::default()),
            Err(SquishError::InvalidParameter { .. })
        ));
    }

    #[test]
    fn test_progress_reaches_end() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let last = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&last);
        let progress = Progress::new(move |current, total, _| {
            if current == total {
                seen.fetch_add(1, Ordering::Relaxed);
            }
        });
        let mesh = grid_mesh(2, |x, _| x * x);
        flatten_with_progress(&surface_of(&mesh), &SquishParameters::default(), &SquishOptions::default(), &progress)
            .unwrap();
        assert_eq!(last.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn test_iteration_cap_is_a_warning() {
        let mesh = grid_mesh(6, |x, y| 0.6 * ((x - 0.5).powi(2) - (y - 0.5).powi(2)));
        let options = SquishOptions::default().with_max_iterations(2);

        for algorithm in [FlatteningAlgorithm::Geometric, FlatteningAlgorithm::PhysicalStress] {
            let params = SquishParameters::default().with_algorithm(algorithm);
            let result = flatten(&surface_of(&mesh), &params, &options).unwrap();

            let report = result.report();
            assert!(!report.converged, "{algorithm:?}");
            assert_eq!(report.iterations, 2);
            assert!(report.warnings.iter().any(|w| matches!(
                w,
                FlattenWarning::NotConverged { component: 0, iterations: 2, .. }
            )));

            assert!(result.positions_2d().iter().all(|p| p.x.is_finite() && p.y.is_finite()));
            let mapping = result.mapping().unwrap();
            for (v, p) in mesh.vertices.iter().enumerate() {
                let q = mapping.forward(p).unwrap();
                assert!((q - result.positions_2d()[v]).norm() < 1e-9);
                assert!((mapping.backward(&q).unwrap() - p).norm() < 1e-9);
            }
        }
    }

    #[test]
    fn test_limit_rescale_is_reported() {
        let mesh = grid_mesh(6, |x, y| 0.6 * ((x - 0.5).powi(2) - (y - 0.5).powi(2)));
        let params = SquishParameters::no_compression();
        let options = SquishOptions::default().with_limit_iterations(0);

        let result = flatten(&surface_of(&mesh), &params, &options).unwrap();
        let report = result.report();
        let scale = report.warnings.iter().find_map(|w| match *w {
            FlattenWarning::LimitRescaled { component: 0, scale } => Some(scale),
            _ => None,
        });
        assert!(scale.is_some_and(|s| s > 1.0), "{:?}", report.warnings);
        assert!(report.min_ratio >= 1.0);
        for r in edge_ratios(&mesh, &result) {
            assert!(r >= 1.0, "ratio {r}");
        }
    }
}
