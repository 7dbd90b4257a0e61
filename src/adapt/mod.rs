//! Mesh and surface adapter.
//!
//! [`adapt`] normalises a mesh or a NURBS surface into the
//! [`DiscretizedSurface`] the flattening engine works on. Surfaces are first
//! sampled into a quad grid ([`sample_surface`]) and then follow the mesh
//! path: quads are split along their shorter diagonal, coincident vertices are
//! optionally welded, and the edge table is checked for manifoldness and
//! consistent winding.

mod sample;
mod weld;

pub use sample::sample_surface;

use crate::error::{Result, SquishError};
use crate::geometry::{Geometry, Mesh};
use crate::mesh::DiscretizedSurface;
use crate::params::{SquishOptions, SquishParameters};

/// Normalise `geometry` into a discretized surface.
///
/// # Errors
///
/// - [`SquishError::UnsupportedGeometry`] for points and curves
/// - invalid-input errors for bad indices, zero-area faces, non-manifold
///   edges or inconsistent winding
/// - [`SquishError::DegenerateGeometry`] for empty input
pub fn adapt(
    geometry: &Geometry,
    params: &SquishParameters,
    options: &SquishOptions,
) -> Result<DiscretizedSurface> {
    match geometry {
        Geometry::Mesh(mesh) => adapt_mesh(mesh, params.preserve_topology, options),
        Geometry::Surface(surface) => {
            let mesh = sample_surface(surface, options)?;
            adapt_mesh(&mesh, params.preserve_topology, options)
        }
        other => Err(SquishError::unsupported(other.kind(), "flatten")),
    }
}

/// Normalise a mesh.
///
/// With `preserve_topology`, vertices within `weld_tolerance` (relative to the
/// bounding-box diagonal) share one flattening variable; otherwise every
/// source vertex is its own variable.
pub fn adapt_mesh(
    mesh: &Mesh,
    preserve_topology: bool,
    options: &SquishOptions,
) -> Result<DiscretizedSurface> {
    if mesh.vertices.is_empty() {
        return Err(SquishError::degenerate("mesh has no vertices"));
    }
    if mesh.faces.is_empty() {
        return Err(SquishError::degenerate("mesh has no faces"));
    }
    mesh.validate()?;

    let representative: Vec<usize> = if preserve_topology {
        let diagonal = mesh
            .bounding_box()
            .map(|(min, max)| (max - min).norm())
            .unwrap_or(0.0);
        weld::weld(&mesh.vertices, options.weld_tolerance * diagonal)
    } else {
        (0..mesh.vertices.len()).collect()
    };

    let split = mesh.triangulate();

    let mut referenced = vec![false; mesh.vertices.len()];
    for (tri, _) in &split {
        for &v in tri {
            referenced[representative[v]] = true;
        }
    }

    // Variables are numbered by ascending representative.
    let mut variable_of = vec![usize::MAX; mesh.vertices.len()];
    let mut variable_source = Vec::new();
    for (v, &used) in referenced.iter().enumerate() {
        if used {
            variable_of[v] = variable_source.len();
            variable_source.push(v);
        }
    }

    let positions = variable_source.iter().map(|&v| mesh.vertices[v]).collect();
    let source_to_variable: Vec<Option<usize>> = representative
        .iter()
        .map(|&r| referenced[r].then(|| variable_of[r]))
        .collect();

    let mut triangles = Vec::with_capacity(split.len());
    let mut triangle_faces = Vec::with_capacity(split.len());
    for (tri, face) in split {
        let t = tri.map(|v| variable_of[representative[v]]);
        if t[0] == t[1] || t[1] == t[2] || t[0] == t[2] {
            return Err(SquishError::invalid_input(format!(
                "face {face} collapses when coincident vertices are merged"
            )));
        }
        triangles.push(t);
        triangle_faces.push(face);
    }

    let unused = source_to_variable.iter().filter(|v| v.is_none()).count();
    if unused > 0 {
        log::debug!("{unused} vertices are not used by any face");
    }

    DiscretizedSurface::new(
        positions,
        triangles,
        triangle_faces,
        source_to_variable,
        &variable_source,
        mesh.faces.clone(),
    )
}
