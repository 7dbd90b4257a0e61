//! Flattening algorithms.
//!
//! - **Conformal layout**: least-squares conformal initial embedding
//! - **Geometric**: as-rigid-as-possible local/global relaxation
//! - **Physical stress**: damped mass-spring relaxation
//! - **Limits**: enforcement of the absolute length-ratio bound
//!
//! [`flatten`] runs the whole pipeline on a
//! [`DiscretizedSurface`](crate::mesh::DiscretizedSurface);
//! [`flatten_geometry`] adapts a mesh or surface first.

mod conformal;
mod flatten;
mod geometric;
mod limits;
mod patch;
mod stress;

pub mod progress;
pub mod sparse;

pub use flatten::{flatten, flatten_geometry, flatten_geometry_with_progress, flatten_with_progress};
pub use progress::Progress;
