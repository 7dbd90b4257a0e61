//! Bidirectional 3D/2D correspondence for a flattening.
//!
//! A [`MappingIndex`] pairs every triangle of the original surface with its
//! image in the layout. A location on the surface is a [`SurfacePoint`]: a
//! triangle id plus barycentric weights, which mean the same thing on both
//! sides. Forward mapping finds the closest 3D triangle point and evaluates
//! it in 2D; backward mapping finds the 2D triangle containing the query (or
//! the closest one, within tolerance) and evaluates it in 3D.
//!
//! The index is immutable once built and can be queried from many threads.
//!
//! # Example
//!
//! ```
//! use squisher::prelude::*;
//!
//! let mesh = Mesh::from_triangles(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     &[[0, 1, 2]],
//! );
//! let result = flatten_geometry(&mesh.into(), &SquishParameters::default(), &SquishOptions::default())?;
//! let mapping = result.mapping()?;
//!
//! let p = Point3::new(0.25, 0.25, 0.0);
//! let q = mapping.forward(&p)?;
//! assert!((mapping.backward(&q)? - p).norm() < 1e-9);
//! # Ok::<(), squisher::SquishError>(())
//! ```

mod bvh;
mod closest;

pub use bvh::{triangle_boxes, Aabb, Bvh};
pub use closest::{barycentric_2d, closest_barycentric, interpolate2, interpolate3};

use nalgebra::{Point2, Point3};

use crate::error::{Result, SquishError};
use crate::geometry::bounding_box;
use crate::params::SquishOptions;

/// Barycentric slack accepted when testing 2D containment.
const CONTAINMENT_EPS: f64 = 1e-9;

/// A location on the surface, valid on both sides of the mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfacePoint {
    /// Triangle index.
    pub triangle: usize,
    /// Barycentric weights over the triangle's corners.
    pub barycentric: [f64; 3],
}

/// Triangle-level correspondence between a surface and its layout.
#[derive(Debug)]
pub struct MappingIndex {
    positions_3d: Vec<Point3<f64>>,
    positions_2d: Vec<Point2<f64>>,
    plane: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    bvh_3d: Bvh,
    bvh_2d: Bvh,
    diagonal_3d: f64,
    diagonal_2d: f64,
    tolerance_3d: f64,
    tolerance_2d: f64,
    curve_tolerance: f64,
    mean_edge_3d: f64,
    mean_edge_2d: f64,
}

impl MappingIndex {
    /// Index `triangles` over matching 3D and 2D vertex arrays.
    pub(crate) fn build(
        positions_3d: Vec<Point3<f64>>,
        positions_2d: Vec<Point2<f64>>,
        triangles: Vec<[usize; 3]>,
        options: &SquishOptions,
    ) -> Self {
        debug_assert_eq!(positions_3d.len(), positions_2d.len());

        let plane: Vec<Point3<f64>> = positions_2d.iter().map(|p| Point3::new(p.x, p.y, 0.0)).collect();
        let bvh_3d = Bvh::build(&triangle_boxes(&positions_3d, &triangles, options.parallel), options.parallel);
        let bvh_2d = Bvh::build(&triangle_boxes(&plane, &triangles, options.parallel), options.parallel);

        let diagonal = |points: &[Point3<f64>]| {
            bounding_box(points)
                .map(|(min, max)| (max - min).norm())
                .unwrap_or(0.0)
        };
        let diagonal_3d = diagonal(&positions_3d);
        let diagonal_2d = diagonal(&plane);

        let mean_side = |points: &[Point3<f64>]| {
            if triangles.is_empty() {
                return 0.0;
            }
            let total: f64 = triangles
                .iter()
                .map(|t| {
                    (points[t[1]] - points[t[0]]).norm()
                        + (points[t[2]] - points[t[1]]).norm()
                        + (points[t[0]] - points[t[2]]).norm()
                })
                .sum();
            total / (3 * triangles.len()) as f64
        };
        let mean_edge_3d = mean_side(&positions_3d);
        let mean_edge_2d = mean_side(&plane);

        log::debug!(
            "mapping index: {} triangles, 3D diagonal {:.4}, 2D diagonal {:.4}",
            triangles.len(),
            diagonal_3d,
            diagonal_2d
        );

        Self {
            positions_3d,
            positions_2d,
            plane,
            triangles,
            bvh_3d,
            bvh_2d,
            diagonal_3d,
            diagonal_2d,
            tolerance_3d: options.domain_tolerance * diagonal_3d,
            tolerance_2d: options.domain_tolerance * diagonal_2d,
            curve_tolerance: options.curve_tolerance,
            mean_edge_3d,
            mean_edge_2d,
        }
    }

    /// Number of indexed triangles.
    #[inline]
    pub fn num_triangles(&self) -> usize {
        self.triangles.len()
    }

    /// Indexed triangles.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// 3D vertex positions.
    #[inline]
    pub fn positions_3d(&self) -> &[Point3<f64>] {
        &self.positions_3d
    }

    /// 2D vertex positions.
    #[inline]
    pub fn positions_2d(&self) -> &[Point2<f64>] {
        &self.positions_2d
    }

    /// How far a 3D query may lie from the surface.
    pub fn tolerance_3d(&self) -> f64 {
        self.tolerance_3d
    }

    /// How far a 2D query may lie from the layout.
    pub fn tolerance_2d(&self) -> f64 {
        self.tolerance_2d
    }

    /// Chord tolerance for sampling curves on the surface.
    pub fn curve_tolerance_3d(&self) -> f64 {
        self.curve_tolerance * self.diagonal_3d
    }

    /// Chord tolerance for sampling curves in the layout.
    pub fn curve_tolerance_2d(&self) -> f64 {
        self.curve_tolerance * self.diagonal_2d
    }

    /// Bounding-box diagonal of the 3D surface.
    pub fn diagonal_3d(&self) -> f64 {
        self.diagonal_3d
    }

    /// Bounding-box diagonal of the layout.
    pub fn diagonal_2d(&self) -> f64 {
        self.diagonal_2d
    }

    /// Mean triangle side length in 3D.
    pub fn mean_edge_length_3d(&self) -> f64 {
        self.mean_edge_3d
    }

    /// Mean triangle side length in 2D.
    pub fn mean_edge_length_2d(&self) -> f64 {
        self.mean_edge_2d
    }

    /// The surface location closest to `p`.
    ///
    /// Fails with [`SquishError::OutOfDomain`] when `p` is farther than
    /// [`tolerance_3d`](Self::tolerance_3d) from the surface.
    pub fn locate_3d(&self, p: &Point3<f64>) -> Result<SurfacePoint> {
        if !p.coords.iter().all(|c| c.is_finite()) {
            return Err(SquishError::invalid_input("query point has a non-finite coordinate"));
        }
        nearest(&self.bvh_3d, &self.positions_3d, &self.triangles, p, self.tolerance_3d)
    }

    /// The surface location whose image is `q`.
    ///
    /// A triangle containing `q` wins; otherwise the closest triangle within
    /// [`tolerance_2d`](Self::tolerance_2d) is used.
    pub fn locate_2d(&self, q: &Point2<f64>) -> Result<SurfacePoint> {
        if !(q.x.is_finite() && q.y.is_finite()) {
            return Err(SquishError::invalid_input("query point has a non-finite coordinate"));
        }
        let lifted = Point3::new(q.x, q.y, 0.0);

        for t in self.bvh_2d.containing(&lifted, 0.0) {
            let [a, b, c] = self.triangles[t].map(|v| self.positions_2d[v]);
            if let Some(w) = barycentric_2d(q, &a, &b, &c) {
                if w.iter().all(|&x| x >= -CONTAINMENT_EPS) {
                    return Ok(SurfacePoint {
                        triangle: t,
                        barycentric: w,
                    });
                }
            }
        }

        nearest(&self.bvh_2d, &self.plane, &self.triangles, &lifted, self.tolerance_2d)
    }

    /// Evaluate a surface location in 3D.
    pub fn point_3d(&self, at: &SurfacePoint) -> Point3<f64> {
        interpolate3(self.triangles[at.triangle].map(|v| self.positions_3d[v]), at.barycentric)
    }

    /// Evaluate a surface location in the layout.
    pub fn point_2d(&self, at: &SurfacePoint) -> Point2<f64> {
        interpolate2(self.triangles[at.triangle].map(|v| self.positions_2d[v]), at.barycentric)
    }

    /// Map a 3D point onto the layout.
    pub fn forward(&self, p: &Point3<f64>) -> Result<Point2<f64>> {
        Ok(self.point_2d(&self.locate_3d(p)?))
    }

    /// Map a layout point back onto the 3D surface.
    pub fn backward(&self, q: &Point2<f64>) -> Result<Point3<f64>> {
        Ok(self.point_3d(&self.locate_2d(q)?))
    }
}

fn nearest(
    bvh: &Bvh,
    positions: &[Point3<f64>],
    triangles: &[[usize; 3]],
    p: &Point3<f64>,
    tolerance: f64,
) -> Result<SurfacePoint> {
    let closest = |t: usize| {
        let [a, b, c] = triangles[t].map(|v| positions[v]);
        let w = closest_barycentric(p, &a, &b, &c);
        (w, (interpolate3([a, b, c], w) - p).norm())
    };

    let (triangle, distance) = bvh
        .nearest(p, |t| closest(t).1)
        .ok_or(SquishError::MappingUnavailable)?;
    if distance > tolerance {
        return Err(SquishError::OutOfDomain { distance, tolerance });
    }
    Ok(SurfacePoint {
        triangle,
        barycentric: closest(triangle).0,
    })
}
