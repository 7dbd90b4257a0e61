//! Input and output geometry.
//!
//! [`Geometry`] is the closed set of things the engine accepts: meshes and
//! NURBS surfaces can be flattened, points and curves can be mapped. Every
//! operation matches on it explicitly and rejects the kinds it does not
//! handle with [`SquishError::UnsupportedGeometry`].

mod curve;
mod nurbs;

pub use curve::{Curve, Polyline2};
pub use nurbs::{NurbsCurve, NurbsSurface};

use std::sync::Arc;

use nalgebra::Point3;

use crate::error::{Result, SquishError};
use crate::result::Provenance;

/// A mesh face: a triangle or a quad, counter-clockwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeshFace {
    /// Three corners.
    Triangle([usize; 3]),
    /// Four corners.
    Quad([usize; 4]),
}

impl MeshFace {
    /// The corner indices.
    pub fn indices(&self) -> &[usize] {
        match self {
            MeshFace::Triangle(v) => v,
            MeshFace::Quad(v) => v,
        }
    }
}

/// A polygon mesh of triangles and quads.
///
/// A mesh returned by a flattening carries a provenance record linking it to
/// that flattening, which [`squish_back`](crate::squish_back) requires. The
/// record cannot be created outside the crate.
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions.
    pub vertices: Vec<Point3<f64>>,
    /// Faces indexing into `vertices`.
    pub faces: Vec<MeshFace>,
    provenance: Option<Arc<Provenance>>,
}

impl Mesh {
    /// Create a mesh from positions and faces.
    pub fn new(vertices: Vec<Point3<f64>>, faces: Vec<MeshFace>) -> Self {
        Self {
            vertices,
            faces,
            provenance: None,
        }
    }

    /// Create a triangle mesh.
    pub fn from_triangles(vertices: Vec<Point3<f64>>, triangles: &[[usize; 3]]) -> Self {
        Self::new(
            vertices,
            triangles.iter().map(|&t| MeshFace::Triangle(t)).collect(),
        )
    }

    /// Create a quad mesh.
    pub fn from_quads(vertices: Vec<Point3<f64>>, quads: &[[usize; 4]]) -> Self {
        Self::new(vertices, quads.iter().map(|&q| MeshFace::Quad(q)).collect())
    }

    pub(crate) fn with_provenance(mut self, provenance: Arc<Provenance>) -> Self {
        self.provenance = Some(provenance);
        self
    }

    /// The squish provenance, if this mesh is the output of a flattening.
    pub fn provenance(&self) -> Option<&Provenance> {
        self.provenance.as_deref()
    }

    /// Number of vertices.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Check face indices and repeated corners.
    pub fn validate(&self) -> Result<()> {
        for (fi, face) in self.faces.iter().enumerate() {
            let idx = face.indices();
            for &vi in idx {
                if vi >= self.vertices.len() {
                    return Err(SquishError::InvalidVertexIndex { face: fi, vertex: vi });
                }
            }
            for a in 0..idx.len() {
                for b in a + 1..idx.len() {
                    if idx[a] == idx[b] {
                        return Err(SquishError::DegenerateFace { face: fi });
                    }
                }
            }
        }
        if let Some(bad) = self.vertices.iter().position(|p| !p.coords.iter().all(|c| c.is_finite())) {
            return Err(SquishError::invalid_input(format!(
                "vertex {bad} has a non-finite coordinate"
            )));
        }
        Ok(())
    }

    /// Split faces into triangles.
    ///
    /// Quads are cut along their shorter diagonal. Each triangle is paired
    /// with the index of the face it came from.
    pub fn triangulate(&self) -> Vec<([usize; 3], usize)> {
        let mut out = Vec::with_capacity(self.faces.len() * 2);
        for (fi, face) in self.faces.iter().enumerate() {
            match *face {
                MeshFace::Triangle(t) => out.push((t, fi)),
                MeshFace::Quad([a, b, c, d]) => {
                    let p = &self.vertices;
                    if (p[c] - p[a]).norm_squared() <= (p[d] - p[b]).norm_squared() {
                        out.push(([a, b, c], fi));
                        out.push(([a, c, d], fi));
                    } else {
                        out.push(([a, b, d], fi));
                        out.push(([b, c, d], fi));
                    }
                }
            }
        }
        out
    }

    /// Axis-aligned bounding box, or `None` for an empty mesh.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        bounding_box(&self.vertices)
    }

    /// Total area of all faces.
    pub fn area(&self) -> f64 {
        self.triangulate()
            .iter()
            .map(|([a, b, c], _)| {
                let p = &self.vertices;
                0.5 * (p[*b] - p[*a]).cross(&(p[*c] - p[*a])).norm()
            })
            .sum()
    }
}

/// Axis-aligned bounding box of a point set.
pub(crate) fn bounding_box(points: &[Point3<f64>]) -> Option<(Point3<f64>, Point3<f64>)> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in points {
        for i in 0..3 {
            min[i] = min[i].min(p[i]);
            max[i] = max[i].max(p[i]);
        }
    }
    Some((min, max))
}

/// Any geometry the engine can flatten or map.
#[derive(Debug, Clone)]
pub enum Geometry {
    /// A polygon mesh.
    Mesh(Mesh),
    /// An untrimmed NURBS surface.
    Surface(NurbsSurface),
    /// A single point.
    Point(Point3<f64>),
    /// A curve.
    Curve(Curve),
}

impl Geometry {
    /// Short name of the geometry kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Mesh(_) => "mesh",
            Geometry::Surface(_) => "surface",
            Geometry::Point(_) => "point",
            Geometry::Curve(_) => "curve",
        }
    }

    /// The curve, or an unsupported-geometry error naming `operation`.
    pub fn as_curve(&self, operation: &'static str) -> Result<&Curve> {
        match self {
            Geometry::Curve(c) => Ok(c),
            other => Err(SquishError::unsupported(other.kind(), operation)),
        }
    }
}

impl From<Mesh> for Geometry {
    fn from(mesh: Mesh) -> Self {
        Geometry::Mesh(mesh)
    }
}

impl From<NurbsSurface> for Geometry {
    fn from(surface: NurbsSurface) -> Self {
        Geometry::Surface(surface)
    }
}

impl From<Point3<f64>> for Geometry {
    fn from(point: Point3<f64>) -> Self {
        Geometry::Point(point)
    }
}

impl From<Curve> for Geometry {
    fn from(curve: Curve) -> Self {
        Geometry::Curve(curve)
    }
}
