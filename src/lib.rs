//! # Squisher
//!
//! Flattening of 3D meshes and NURBS surfaces into 2D patterns, with
//! forward and backward mapping of points and curves between the surface and
//! its pattern.
//!
//! ## Features
//!
//! - **Two algorithms**: as-rigid-as-possible distance preservation, or a
//!   mass-spring relaxation with separate boundary/interior and
//!   compress/stretch constants
//! - **Hard length limits**: cap compression or stretching of every edge
//! - **Mapping**: send points and curves into the pattern, and marks on the
//!   pattern back onto the surface
//! - **Parallel execution** via rayon, with results identical to sequential
//!
//! ## Quick Start
//!
//! ```
//! use squisher::prelude::*;
//!
//! // A quad bent along its diagonal.
//! let mesh = Mesh::from_quads(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.3),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     &[[0, 1, 2, 3]],
//! );
//!
//! let params = SquishParameters::default()
//!     .with_algorithm(FlatteningAlgorithm::Geometric)
//!     .with_absolute_limit(1.0); // no stretching
//!
//! let mut squisher = Squisher::new();
//! let flat = squisher.squish(&params, &mesh.into())?;
//! assert!(flat.report().max_ratio <= 1.0);
//!
//! // Map a point into the pattern and back again.
//! let p = Point3::new(0.25, 0.25, 0.0);
//! let q = squisher.squish_point(&p)?;
//! let back = squish_back_points(&flat.to_geometry(), &[q])?;
//! assert!((back[0] - p).norm() < 1e-6);
//! # Ok::<(), squisher::SquishError>(())
//! ```
//!
//! ## Pipeline
//!
//! 1. [`adapt`](adapt::adapt) turns a mesh or surface into a
//!    [`DiscretizedSurface`](mesh::DiscretizedSurface)
//! 2. [`flatten`](algo::flatten) lays every component out in the plane
//! 3. the [`MappingIndex`](mapping::MappingIndex) built alongside answers
//!    point and curve queries

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapt;
pub mod algo;
pub mod error;
pub mod geometry;
pub mod io;
pub mod mapping;
pub mod mesh;
pub mod params;
pub mod result;
pub mod squisher;

pub use error::{Result, SquishError};
pub use squisher::{squish_back, squish_back_points, MapReport, Squisher};

/// Prelude module for convenient imports.
///
/// ```
/// use squisher::prelude::*;
/// ```
pub mod prelude {
    pub use crate::adapt::adapt;
    pub use crate::algo::{flatten, flatten_geometry, Progress};
    pub use crate::error::{Result, SquishError};
    pub use crate::geometry::{Curve, Geometry, Mesh, MeshFace, NurbsCurve, NurbsSurface, Polyline2};
    pub use crate::mapping::{MappingIndex, SurfacePoint};
    pub use crate::params::{FlatteningAlgorithm, RatioBounds, SquishOptions, SquishParameters};
    pub use crate::result::{FlattenReport, FlattenWarning, FlattenedResult, SquishTag};
    pub use crate::squisher::{squish_back, squish_back_points, MapReport, Squisher};
    pub use nalgebra::{Point2, Point3};
}

// Re-export nalgebra types for convenience
pub use nalgebra;

#[cfg(test)]
mod tests {
    use super::prelude::*;

    fn grid(n: usize, height: impl Fn(f64, f64) -> f64) -> Mesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let (x, y) = (i as f64 / n as f64, j as f64 / n as f64);
                vertices.push(Point3::new(x, y, height(x, y)));
            }
        }
        let idx = |i: usize, j: usize| j * (n + 1) + i;
        let mut quads = Vec::new();
        for j in 0..n {
            for i in 0..n {
                quads.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        Mesh::from_quads(vertices, &quads)
    }

    fn saddle(x: f64, y: f64) -> f64 {
        0.6 * ((x - 0.5).powi(2) - (y - 0.5).powi(2))
    }

    fn edge_ratios(mesh: &Mesh, flat: &FlattenedResult) -> Vec<f64> {
        let mut ratios = Vec::new();
        for face in &mesh.faces {
            let idx = face.indices();
            for k in 0..idx.len() {
                let (a, b) = (idx[k], idx[(k + 1) % idx.len()]);
                let rest = (mesh.vertices[b] - mesh.vertices[a]).norm();
                ratios.push((flat.positions_2d()[b] - flat.positions_2d()[a]).norm() / rest);
            }
        }
        ratios
    }

    #[test]
    fn test_bent_quad_round_trip() {
        let mesh = Mesh::from_quads(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.3),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2, 3]],
        );
        let mut squisher = Squisher::new();
        let flat = squisher
            .squish(&SquishParameters::default(), &mesh.clone().into())
            .unwrap();

        assert_eq!(flat.mesh().faces, mesh.faces);
        assert!(flat.mesh().vertices.iter().all(|p| p.z == 0.0));
        for v in &mesh.vertices {
            let q = squisher.squish_point(v).unwrap();
            let back = squish_back_points(&flat.to_geometry(), &[q]).unwrap();
            assert!((back[0] - v).norm() < 1e-9);
        }
    }

    #[test]
    fn test_round_trip_on_curved_surface() {
        let mesh = grid(8, saddle);
        for algorithm in [FlatteningAlgorithm::Geometric, FlatteningAlgorithm::PhysicalStress] {
            let params = SquishParameters::default().with_algorithm(algorithm);
            let flat = flatten_geometry(&mesh.clone().into(), &params, &SquishOptions::default()).unwrap();
            let mapping = flat.mapping().unwrap();

            // Points inside every triangle, not just at vertices.
            for (t, tri) in mapping.triangles().iter().enumerate() {
                let at = SurfacePoint {
                    triangle: t,
                    barycentric: [0.2, 0.3, 0.5],
                };
                let p = mapping.point_3d(&at);
                let q = mapping.forward(&p).unwrap();
                let back = mapping.backward(&q).unwrap();
                assert!((back - p).norm() < 1e-9, "triangle {t} {tri:?}: {p} -> {back}");
            }
        }
    }

    #[test]
    fn test_flattening_is_deterministic() {
        let mesh: Geometry = grid(10, saddle).into();
        for algorithm in [FlatteningAlgorithm::Geometric, FlatteningAlgorithm::PhysicalStress] {
            let params = SquishParameters::default().with_algorithm(algorithm);
            let options = SquishOptions::default().with_max_iterations(50);
            let a = flatten_geometry(&mesh, &params, &options).unwrap();
            let b = flatten_geometry(&mesh, &params, &options).unwrap();
            let c = flatten_geometry(&mesh, &params, &options.clone().sequential()).unwrap();
            assert_eq!(a.positions_2d(), b.positions_2d());
            assert_eq!(a.positions_2d(), c.positions_2d());
            assert_eq!(a.report().iterations, c.report().iterations);
        }
    }

    #[test]
    fn test_absolute_limit_is_never_violated() {
        let mesh = grid(8, |x, y| 0.8 * saddle(x, y) + 0.3 * x * x);
        for algorithm in [FlatteningAlgorithm::Geometric, FlatteningAlgorithm::PhysicalStress] {
            for limit in [-1.0, -0.7, 0.5, 1.0] {
                let params = SquishParameters::default()
                    .with_algorithm(algorithm)
                    .with_absolute_limit(limit);
                let bounds = params.ratio_bounds();
                let flat = flatten_geometry(&mesh.clone().into(), &params, &SquishOptions::default()).unwrap();
                for r in edge_ratios(&mesh, &flat) {
                    assert!(bounds.contains(r), "{algorithm:?} limit {limit}: ratio {r}");
                }
                assert!(bounds.contains(flat.report().min_ratio));
                assert!(bounds.contains(flat.report().max_ratio));
            }
        }
    }

    #[test]
    fn test_preserve_topology_keeps_coincident_vertices_together() {
        // Two triangles meeting along a diagonal through duplicated vertices.
        let mesh = Mesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.2),
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.2),
                Point3::new(0.0, 1.0, 0.4),
            ],
            &[[0, 1, 2], [3, 4, 5]],
        );
        let options = SquishOptions::default();

        let joined = SquishParameters::default().with_preserve_topology(true);
        let flat = flatten_geometry(&mesh.clone().into(), &joined, &options).unwrap();
        assert_eq!(flat.positions_2d()[0], flat.positions_2d()[3]);
        assert_eq!(flat.positions_2d()[2], flat.positions_2d()[4]);

        let loose = SquishParameters::default().with_preserve_topology(false);
        let flat = flatten_geometry(&mesh.into(), &loose, &options).unwrap();
        assert_eq!(flat.report().component_sizes.len(), 2);
        assert_ne!(flat.positions_2d()[0], flat.positions_2d()[3]);
    }

    #[test]
    fn test_planar_quad_is_rigid() {
        let mesh = Mesh::from_quads(
            vec![
                Point3::new(0.0, 0.0, 1.0),
                Point3::new(2.0, 0.0, 1.0),
                Point3::new(2.5, 1.5, 1.0),
                Point3::new(0.0, 1.0, 1.0),
            ],
            &[[0, 1, 2, 3]],
        );
        for algorithm in [FlatteningAlgorithm::Geometric, FlatteningAlgorithm::PhysicalStress] {
            let params = SquishParameters::default().with_algorithm(algorithm);
            let flat = flatten_geometry(&mesh.clone().into(), &params, &SquishOptions::default()).unwrap();
            let q = flat.positions_2d();
            for a in 0..4 {
                for b in a + 1..4 {
                    let d3 = (mesh.vertices[b] - mesh.vertices[a]).norm();
                    let d2 = (q[b] - q[a]).norm();
                    assert!((d3 - d2).abs() < 1e-9, "{algorithm:?} {a}-{b}: {d3} vs {d2}");
                }
            }
        }
    }

    #[test]
    fn test_developable_nurbs_surface() {
        // A parabolic cylinder: curved in u, straight in v.
        let control = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(0.5, 0.0, 0.6),
            Point3::new(0.5, 1.0, 0.6),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
        ];
        let surface = NurbsSurface::clamped(2, 1, 3, 2, control).unwrap();
        let params = SquishParameters::default().with_algorithm(FlatteningAlgorithm::Geometric);
        let flat = flatten_geometry(&surface.into(), &params, &SquishOptions::default()).unwrap();
        let report = flat.report();
        assert!(report.min_ratio > 0.999 && report.max_ratio < 1.001, "{report:?}");
    }

    #[test]
    fn test_surface_with_an_apex() {
        let apex = Point3::new(0.0, 0.0, 1.0);
        let control = vec![
            apex,
            Point3::new(-1.0, 2.0, 0.0),
            apex,
            Point3::new(0.0, 2.0, 1.0),
            apex,
            Point3::new(1.0, 2.0, 0.0),
        ];
        let cone: Geometry = NurbsSurface::clamped(2, 1, 3, 2, control).unwrap().into();

        for preserve in [false, true] {
            let params = SquishParameters::default().with_preserve_topology(preserve);
            let mut squisher = Squisher::new();
            let flat = squisher.squish(&params, &cone).unwrap();
            let mapping = flat.mapping().unwrap();

            let p = mapping.point_3d(&SurfacePoint {
                triangle: 0,
                barycentric: [0.3, 0.3, 0.4],
            });
            let q = squisher.squish_point(&p).unwrap();
            let back = squish_back_points(&flat.to_geometry(), &[q]).unwrap();
            assert_eq!(back.len(), 1);
            assert!((back[0] - p).norm() < 1e-9, "preserve {preserve}: {p} -> {}", back[0]);
        }
    }

    #[test]
    fn test_unsupported_and_unsquished_inputs() {
        let mut squisher = Squisher::new();
        squisher
            .squish(&SquishParameters::default(), &grid(2, saddle).into())
            .unwrap();

        let surface = NurbsSurface::bilinear([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
        .unwrap();
        let err = squisher.squish_geometry(&surface.into()).unwrap_err();
        assert!(matches!(err, SquishError::UnsupportedGeometry { kind: "surface", .. }));

        let err = squish_back(&grid(2, saddle).into(), &[]).unwrap_err();
        assert!(matches!(err, SquishError::InvalidInput { .. }));

        let err = flatten_geometry(
            &Geometry::Point(Point3::origin()),
            &SquishParameters::default(),
            &SquishOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SquishError::UnsupportedGeometry { kind: "point", .. }));
    }
}
