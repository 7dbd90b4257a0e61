//! Triangulated surface representation.
//!
//! The adapter turns every input into a [`DiscretizedSurface`]: 3D positions
//! for the flattening variables, triangles over them, and the connectivity
//! derived from those triangles ([`Topology`]): a sorted edge table with
//! boundary flags, ordered boundary loops and connected components.
//!
//! ```
//! use squisher::adapt::adapt;
//! use squisher::geometry::{Geometry, Mesh};
//! use squisher::params::{SquishOptions, SquishParameters};
//! use nalgebra::Point3;
//!
//! let mesh = Mesh::from_triangles(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.5, 1.0, 0.0),
//!     ],
//!     &[[0, 1, 2]],
//! );
//! let surface = adapt(
//!     &Geometry::Mesh(mesh),
//!     &SquishParameters::default(),
//!     &SquishOptions::default(),
//! )
//! .unwrap();
//! assert_eq!(surface.edges().len(), 3);
//! assert_eq!(surface.boundary_loops().len(), 1);
//! ```

mod surface;
mod topology;

pub use surface::DiscretizedSurface;
pub use topology::{Component, Edge, Topology};
