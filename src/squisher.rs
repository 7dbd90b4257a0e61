//! The query layer.
//!
//! A [`Squisher`] flattens geometry and remembers the mapping of its most
//! recent successful flattening, so points and curves can be sent through
//! it afterwards. [`squish_back`] goes the other way: it takes a flattened
//! mesh and carries 2D marks back onto the original surface.
//!
//! # Example
//!
//! ```
//! use squisher::prelude::*;
//!
//! let mesh = Mesh::from_quads(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.5),
//!         Point3::new(0.0, 1.0, 0.5),
//!     ],
//!     &[[0, 1, 2, 3]],
//! );
//!
//! let mut squisher = Squisher::new();
//! let flat = squisher.squish(&SquishParameters::default(), &mesh.into())?;
//!
//! let q = squisher.squish_point(&Point3::new(0.5, 0.5, 0.25))?;
//! let back = squish_back_points(&flat.to_geometry(), &[q])?;
//! assert!((back[0] - Point3::new(0.5, 0.5, 0.25)).norm() < 1e-6);
//! # Ok::<(), squisher::SquishError>(())
//! ```

use std::sync::Arc;

use nalgebra::{Point2, Point3};

use crate::adapt::{adapt_mesh, sample_surface};
use crate::algo::{flatten_geometry_with_progress, flatten_with_progress, Progress};
use crate::error::{Result, SquishError};
use crate::geometry::{Curve, Geometry, Mesh, NurbsSurface, Polyline2};
use crate::mapping::MappingIndex;
use crate::params::{SquishOptions, SquishParameters};
use crate::result::FlattenedResult;

/// Fraction of the mean edge length used as the longest curve sample step.
const CURVE_STEP: f64 = 0.5;

/// Stateful flattening front end.
#[derive(Debug, Default)]
pub struct Squisher {
    options: SquishOptions,
    mapping: Option<Arc<MappingIndex>>,
}

impl Squisher {
    /// Create a squisher with default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a squisher with the given engine options.
    pub fn with_options(options: SquishOptions) -> Self {
        Self {
            options,
            mapping: None,
        }
    }

    /// Engine options.
    pub fn options(&self) -> &SquishOptions {
        &self.options
    }

    /// Flatten a mesh or surface.
    ///
    /// On success the retained mapping is replaced by this flattening's (or
    /// cleared when `save_mapping` is off). On failure it is left unchanged.
    pub fn squish(&mut self, params: &SquishParameters, geometry: &Geometry) -> Result<FlattenedResult> {
        self.squish_with_progress(params, geometry, &Progress::none())
    }

    /// [`squish`](Self::squish) with progress reporting.
    pub fn squish_with_progress(
        &mut self,
        params: &SquishParameters,
        geometry: &Geometry,
        progress: &Progress,
    ) -> Result<FlattenedResult> {
        let result = flatten_geometry_with_progress(geometry, params, &self.options, progress)?;
        Ok(self.retain(result))
    }

    /// Flatten a mesh.
    pub fn squish_mesh(&mut self, params: &SquishParameters, mesh: &Mesh) -> Result<FlattenedResult> {
        params.validate()?;
        let surface = adapt_mesh(mesh, params.preserve_topology, &self.options)?;
        let result = flatten_with_progress(&surface, params, &self.options, &Progress::none())?;
        Ok(self.retain(result))
    }

    /// Flatten a NURBS surface.
    pub fn squish_surface(&mut self, params: &SquishParameters, surface: &NurbsSurface) -> Result<FlattenedResult> {
        params.validate()?;
        let mesh = sample_surface(surface, &self.options)?;
        self.squish_mesh(params, &mesh)
    }

    fn retain(&mut self, result: FlattenedResult) -> FlattenedResult {
        self.mapping = result.mapping_arc();
        result
    }

    /// Whether a mapping is retained.
    pub fn has_mapping(&self) -> bool {
        self.mapping.is_some()
    }

    /// The retained mapping.
    pub fn mapping(&self) -> Result<&MappingIndex> {
        self.mapping.as_deref().ok_or(SquishError::MappingUnavailable)
    }

    /// Map a point on the last flattened surface into the plane.
    pub fn squish_point(&self, point: &Point3<f64>) -> Result<Point2<f64>> {
        self.mapping()?.forward(point)
    }

    /// Map a curve on the last flattened surface into the plane.
    ///
    /// The curve is sampled finely enough that each chord stays within
    /// `curve_tolerance` of it and spans at most half a mean edge, then every
    /// sample is mapped. Any sample off the surface fails the whole call.
    pub fn squish_curve(&self, curve: &Curve) -> Result<Polyline2> {
        let mapping = self.mapping()?;
        let samples = curve.sample(
            mapping.curve_tolerance_3d(),
            CURVE_STEP * mapping.mean_edge_length_3d(),
        )?;
        let points = samples
            .iter()
            .map(|p| mapping.forward(p))
            .collect::<Result<Vec<_>>>()?;
        Ok(Polyline2::new(points))
    }

    /// Map a point or curve into the plane, returned on `z = 0`.
    ///
    /// Meshes and surfaces are rejected with
    /// [`SquishError::UnsupportedGeometry`] before any mapping is attempted.
    pub fn squish_geometry(&self, geometry: &Geometry) -> Result<Geometry> {
        match geometry {
            Geometry::Point(p) => {
                let q = self.squish_point(p)?;
                Ok(Geometry::Point(Point3::new(q.x, q.y, 0.0)))
            }
            Geometry::Curve(c) => Ok(Geometry::Curve(self.squish_curve(c)?.to_curve())),
            other => Err(SquishError::unsupported(other.kind(), "squish_geometry")),
        }
    }

    /// Map a batch of points and curves, one result per element.
    pub fn squish_all(&self, items: &[Geometry]) -> MapReport {
        MapReport {
            results: items.iter().map(|g| self.squish_geometry(g)).collect(),
        }
    }
}

/// Per-element outcome of [`Squisher::squish_all`].
#[derive(Debug)]
pub struct MapReport {
    /// One entry per input element, in order.
    pub results: Vec<Result<Geometry>>,
}

impl MapReport {
    /// Number of elements that mapped.
    pub fn succeeded(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Number of elements that failed.
    pub fn failed(&self) -> usize {
        self.results.len() - self.succeeded()
    }

    /// Whether every element mapped.
    pub fn is_complete(&self) -> bool {
        self.results.iter().all(|r| r.is_ok())
    }

    /// The mapped geometry, skipping failures.
    pub fn successes(&self) -> impl Iterator<Item = &Geometry> {
        self.results.iter().filter_map(|r| r.as_ref().ok())
    }
}

/// The mapping behind a flattened mesh.
fn provenance_mapping(squished: &Geometry) -> Result<&MappingIndex> {
    let provenance = match squished {
        Geometry::Mesh(mesh) => mesh.provenance(),
        _ => None,
    };
    provenance
        .ok_or_else(|| SquishError::invalid_input("input geometry must be the result of a squish operation"))?
        .mapping()
}

/// Carry 2D marks on a flattened mesh back onto the original surface.
///
/// Points map to points; curves are sampled in the plane (ignoring `z`) and
/// map to 3D polylines. Marks that cannot be mapped, including meshes and
/// surfaces, are skipped.
///
/// # Errors
///
/// - invalid input if `squished` is not the output of a flattening
/// - [`SquishError::MappingUnavailable`] if that flattening kept no mapping
pub fn squish_back(squished: &Geometry, marks: &[Geometry]) -> Result<Vec<Geometry>> {
    let mapping = provenance_mapping(squished)?;
    let mut out = Vec::with_capacity(marks.len());

    for (i, mark) in marks.iter().enumerate() {
        let mapped = match mark {
            Geometry::Point(p) => mapping.backward(&Point2::new(p.x, p.y)).map(Geometry::Point),
            Geometry::Curve(c) => curve_back(mapping, c).map(Geometry::Curve),
            other => Err(SquishError::unsupported(other.kind(), "squish_back")),
        };
        match mapped {
            Ok(g) => out.push(g),
            Err(e) => log::debug!("squish_back: skipping mark {i}: {e}"),
        }
    }

    Ok(out)
}

/// Carry 2D points on a flattened mesh back onto the original surface,
/// skipping any that fall outside it.
pub fn squish_back_points(squished: &Geometry, points: &[Point2<f64>]) -> Result<Vec<Point3<f64>>> {
    let mapping = provenance_mapping(squished)?;
    Ok(points
        .iter()
        .enumerate()
        .filter_map(|(i, q)| match mapping.backward(q) {
            Ok(p) => Some(p),
            Err(e) => {
                log::debug!("squish_back: skipping point {i}: {e}");
                None
            }
        })
        .collect())
}

fn curve_back(mapping: &MappingIndex, curve: &Curve) -> Result<Curve> {
    let samples = curve.sample(
        mapping.curve_tolerance_2d(),
        CURVE_STEP * mapping.mean_edge_length_2d(),
    )?;
    let points = samples
        .iter()
        .map(|p| mapping.backward(&Point2::new(p.x, p.y)))
        .collect::<Result<Vec<_>>>()?;
    Ok(Curve::Polyline(points))
}
