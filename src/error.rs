//! Error types for squisher.
//!
//! Every fallible operation in the crate returns [`SquishError`]. The variants
//! fall into a handful of families:
//!
//! - **invalid input**: malformed, non-manifold or wrongly typed geometry, or a
//!   backward query against geometry that was never flattened
//!   (see [`SquishError::is_invalid_input`])
//! - **degenerate geometry**: the input is well formed but cannot be flattened
//! - **mapping** failures: no retained index, or a query outside the surface
//! - **unsupported geometry**: a geometry kind the operation does not handle
//! - file I/O, used by the [`io`](crate::io) module and the CLI

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using [`SquishError`].
pub type Result<T> = std::result::Result<T, SquishError>;

/// Errors that can occur while adapting, flattening or mapping geometry.
#[derive(Error, Debug)]
pub enum SquishError {
    /// The input geometry is malformed or not of the expected kind.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What is wrong with the input.
        reason: String,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face repeats one of its corners.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// An edge has more than two incident faces.
    #[error("edge ({v0}, {v1}) has more than two incident faces")]
    NonManifoldEdge {
        /// First vertex of the edge.
        v0: usize,
        /// Second vertex of the edge.
        v1: usize,
    },

    /// Two faces traverse the same edge in the same direction.
    #[error("edge ({v0}, {v1}) is used twice in the same direction (inconsistent winding)")]
    InconsistentWinding {
        /// Origin vertex of the directed edge.
        v0: usize,
        /// Destination vertex of the directed edge.
        v1: usize,
    },

    /// The geometry is well formed but cannot be flattened.
    #[error("degenerate geometry: {reason}")]
    DegenerateGeometry {
        /// Why flattening cannot proceed.
        reason: String,
    },

    /// A mapping query was made but no mapping index was retained.
    #[error("no mapping is available; flatten with save_mapping enabled first")]
    MappingUnavailable,

    /// A query point lies outside the flattened surface.
    #[error("point lies {distance:.6} outside the surface (tolerance {tolerance:.6})")]
    OutOfDomain {
        /// Distance from the query point to the closest surface point.
        distance: f64,
        /// The tolerance that was exceeded.
        tolerance: f64,
    },

    /// The operation does not handle this kind of geometry.
    #[error("unsupported geometry: {kind} ({operation})")]
    UnsupportedGeometry {
        /// The geometry kind that was supplied.
        kind: &'static str,
        /// The operation that rejected it.
        operation: &'static str,
    },

    /// Invalid parameter value.
    #[error("invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// The invalid value (as string).
        value: String,
        /// Reason the value is invalid.
        reason: &'static str,
    },

    /// File I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Error loading mesh from file.
    #[error("failed to load mesh from {path}: {message}")]
    LoadError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Error saving mesh to file.
    #[error("failed to save mesh to {path}: {message}")]
    SaveError {
        /// The file path.
        path: PathBuf,
        /// Error message.
        message: String,
    },

    /// Unsupported file format.
    #[error("unsupported file format: {extension}")]
    UnsupportedFormat {
        /// The file extension.
        extension: String,
    },
}

impl SquishError {
    /// Create an invalid input error.
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        SquishError::InvalidInput {
            reason: reason.into(),
        }
    }

    /// Create a degenerate geometry error.
    pub fn degenerate(reason: impl Into<String>) -> Self {
        SquishError::DegenerateGeometry {
            reason: reason.into(),
        }
    }

    /// Create an unsupported geometry error.
    pub fn unsupported(kind: &'static str, operation: &'static str) -> Self {
        SquishError::UnsupportedGeometry { kind, operation }
    }

    /// Create an invalid parameter error.
    pub fn invalid_param<T: std::fmt::Display>(
        name: &'static str,
        value: T,
        reason: &'static str,
    ) -> Self {
        SquishError::InvalidParameter {
            name,
            value: value.to_string(),
            reason,
        }
    }

    /// Whether this error belongs to the invalid-input family.
    ///
    /// Mesh construction failures (bad indices, repeated corners, non-manifold
    /// edges, inconsistent winding) are reported with their own variants but
    /// are all invalid input.
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            SquishError::InvalidInput { .. }
                | SquishError::InvalidVertexIndex { .. }
                | SquishError::DegenerateFace { .. }
                | SquishError::NonManifoldEdge { .. }
                | SquishError::InconsistentWinding { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_input_family() {
        assert!(SquishError::invalid_input("x").is_invalid_input());
        assert!(SquishError::NonManifoldEdge { v0: 0, v1: 1 }.is_invalid_input());
        assert!(SquishError::InconsistentWinding { v0: 0, v1: 1 }.is_invalid_input());
        assert!(!SquishError::MappingUnavailable.is_invalid_input());
        assert!(!SquishError::degenerate("empty").is_invalid_input());
    }

    #[test]
    fn test_messages() {
        let err = SquishError::unsupported("surface", "squish_curve");
        assert_eq!(err.to_string(), "unsupported geometry: surface (squish_curve)");

        let err = SquishError::invalid_param("absolute_limit", 2.0, "must be in [-1, 1]");
        assert_eq!(
            err.to_string(),
            "invalid parameter: absolute_limit = 2 (must be in [-1, 1])"
        );
    }
}
