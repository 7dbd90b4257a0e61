//! Flattening output and provenance.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use nalgebra::Point2;

use crate::error::{Result, SquishError};
use crate::geometry::{Geometry, Mesh};
use crate::mapping::MappingIndex;
use crate::params::FlatteningAlgorithm;

static NEXT_TAG: AtomicU64 = AtomicU64::new(1);

/// Opaque identifier of one flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SquishTag(u64);

impl SquishTag {
    pub(crate) fn next() -> Self {
        SquishTag(NEXT_TAG.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SquishTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "squish#{}", self.0)
    }
}

/// Marks a mesh as the output of a flattening.
///
/// Only the crate creates these, so a mesh carrying one really is a
/// flattening result.
#[derive(Debug)]
pub struct Provenance {
    tag: SquishTag,
    mapping: Option<Arc<MappingIndex>>,
}

impl Provenance {
    pub(crate) fn new(tag: SquishTag, mapping: Option<Arc<MappingIndex>>) -> Self {
        Self { tag, mapping }
    }

    /// The flattening this mesh came from.
    pub fn tag(&self) -> SquishTag {
        self.tag
    }

    /// The mapping retained by that flattening.
    pub fn mapping(&self) -> Result<&MappingIndex> {
        self.mapping.as_deref().ok_or(SquishError::MappingUnavailable)
    }
}

/// A non-fatal condition met while flattening.
#[derive(Debug, Clone, PartialEq)]
pub enum FlattenWarning {
    /// The solver hit its iteration cap; the last state was kept.
    NotConverged {
        /// Component index.
        component: usize,
        /// Iterations performed.
        iterations: usize,
        /// Largest vertex displacement in the final iteration.
        max_displacement: f64,
    },
    /// Projection alone could not meet the length-ratio limit, so the
    /// component was scaled uniformly.
    LimitRescaled {
        /// Component index.
        component: usize,
        /// Scale factor applied.
        scale: f64,
    },
}

impl fmt::Display for FlattenWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlattenWarning::NotConverged {
                component,
                iterations,
                max_displacement,
            } => write!(
                f,
                "component {component}: not converged after {iterations} iterations (max displacement {max_displacement:.3e})"
            ),
            FlattenWarning::LimitRescaled { component, scale } => {
                write!(f, "component {component}: rescaled by {scale:.6} to meet the length limit")
            }
        }
    }
}

/// Summary of a flattening.
#[derive(Debug, Clone, PartialEq)]
pub struct FlattenReport {
    /// Algorithm used.
    pub algorithm: FlatteningAlgorithm,
    /// Largest iteration count over all components.
    pub iterations: usize,
    /// Whether every component converged.
    pub converged: bool,
    /// Largest final vertex displacement over all components.
    pub max_displacement: f64,
    /// Smallest 2D/3D edge length ratio.
    pub min_ratio: f64,
    /// Largest 2D/3D edge length ratio.
    pub max_ratio: f64,
    /// Vertex count of every component.
    pub component_sizes: Vec<usize>,
    /// Non-fatal conditions, in component order.
    pub warnings: Vec<FlattenWarning>,
}

/// The flattened counterpart of a surface.
#[derive(Debug, Clone)]
pub struct FlattenedResult {
    pub(crate) positions_2d: Vec<Point2<f64>>,
    pub(crate) mesh: Mesh,
    pub(crate) mapping: Option<Arc<MappingIndex>>,
    pub(crate) report: FlattenReport,
    pub(crate) tag: SquishTag,
}

impl FlattenedResult {
    /// 2D position of every source vertex.
    ///
    /// Vertices no face uses are placed at the origin.
    pub fn positions_2d(&self) -> &[Point2<f64>] {
        &self.positions_2d
    }

    /// The flattened mesh on `z = 0`, with the source connectivity.
    pub fn mesh(&self) -> &Mesh {
        &self.mesh
    }

    /// Take the flattened mesh.
    pub fn into_mesh(self) -> Mesh {
        self.mesh
    }

    /// The flattened mesh as geometry, for [`squish_back`](crate::squish_back).
    pub fn to_geometry(&self) -> Geometry {
        Geometry::Mesh(self.mesh.clone())
    }

    /// The retained mapping.
    pub fn mapping(&self) -> Result<&MappingIndex> {
        self.mapping.as_deref().ok_or(SquishError::MappingUnavailable)
    }

    /// Whether a mapping was retained.
    pub fn has_mapping(&self) -> bool {
        self.mapping.is_some()
    }

    pub(crate) fn mapping_arc(&self) -> Option<Arc<MappingIndex>> {
        self.mapping.clone()
    }

    /// Solver summary.
    pub fn report(&self) -> &FlattenReport {
        &self.report
    }

    /// Identifier of this flattening.
    pub fn tag(&self) -> SquishTag {
        self.tag
    }
}
