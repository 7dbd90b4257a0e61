//! The unified discretized representation consumed by the flattening engine.

use nalgebra::Point3;

use crate::error::{Result, SquishError};
use crate::geometry::{bounding_box, MeshFace};

use super::topology::{Component, Edge, Topology};

/// A triangulated surface ready for flattening.
///
/// Flattening operates on *variables*: one per distinct vertex after optional
/// welding. Source vertices map onto variables through
/// [`source_to_variable`](Self::source_to_variable), which is how the result
/// is rebuilt with the input's own connectivity.
#[derive(Debug, Clone)]
pub struct DiscretizedSurface {
    positions: Vec<Point3<f64>>,
    triangles: Vec<[usize; 3]>,
    triangle_faces: Vec<usize>,
    rest_lengths: Vec<f64>,
    topology: Topology,
    source_to_variable: Vec<Option<usize>>,
    source_faces: Vec<MeshFace>,
}

impl DiscretizedSurface {
    /// Assemble a surface from variable positions and triangles.
    ///
    /// `variable_source[v]` names the source vertex that variable `v` stands
    /// for; it is used to report topology errors in source indices.
    pub(crate) fn new(
        positions: Vec<Point3<f64>>,
        triangles: Vec<[usize; 3]>,
        triangle_faces: Vec<usize>,
        source_to_variable: Vec<Option<usize>>,
        variable_source: &[usize],
        source_faces: Vec<MeshFace>,
    ) -> Result<Self> {
        if positions.is_empty() {
            return Err(SquishError::degenerate("geometry has no vertices"));
        }
        if triangles.is_empty() {
            return Err(SquishError::degenerate("geometry has no faces"));
        }

        let diagonal = diagonal(&positions);
        let min_area = f64::EPSILON * diagonal * diagonal;
        for (t, tri) in triangles.iter().enumerate() {
            if triangle_area(&positions, tri) <= min_area {
                return Err(SquishError::invalid_input(format!(
                    "face {} has zero area",
                    triangle_faces[t]
                )));
            }
        }

        let topology = Topology::build(positions.len(), &triangles, |v| variable_source[v])?;
        let rest_lengths = topology
            .edges
            .iter()
            .map(|e| (positions[e.vertices[1]] - positions[e.vertices[0]]).norm())
            .collect();

        log::debug!(
            "discretized surface: {} variables, {} triangles, {} edges, {} boundary loops, {} components",
            positions.len(),
            triangles.len(),
            topology.edges.len(),
            topology.boundary_loops.len(),
            topology.components.len()
        );

        Ok(Self {
            positions,
            triangles,
            triangle_faces,
            rest_lengths,
            topology,
            source_to_variable,
            source_faces,
        })
    }

    /// 3D position of every variable.
    #[inline]
    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    /// Number of flattening variables.
    #[inline]
    pub fn num_variables(&self) -> usize {
        self.positions.len()
    }

    /// Triangles over variables.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// The source face each triangle was cut from.
    #[inline]
    pub fn triangle_faces(&self) -> &[usize] {
        &self.triangle_faces
    }

    /// Undirected edges, sorted by endpoints.
    #[inline]
    pub fn edges(&self) -> &[Edge] {
        &self.topology.edges
    }

    /// 3D length of every edge, indexed like [`edges`](Self::edges).
    #[inline]
    pub fn rest_lengths(&self) -> &[f64] {
        &self.rest_lengths
    }

    /// Edge ids of each triangle's sides.
    #[inline]
    pub fn triangle_edges(&self) -> &[[usize; 3]] {
        &self.topology.triangle_edges
    }

    /// Ordered boundary loops.
    #[inline]
    pub fn boundary_loops(&self) -> &[Vec<usize>] {
        &self.topology.boundary_loops
    }

    /// Connected components.
    #[inline]
    pub fn components(&self) -> &[Component] {
        &self.topology.components
    }

    /// Per-variable boundary flags.
    pub fn boundary_flags(&self) -> Vec<bool> {
        self.topology.boundary_vertices(self.positions.len())
    }

    /// The variable of each source vertex (`None` for vertices no face uses).
    #[inline]
    pub fn source_to_variable(&self) -> &[Option<usize>] {
        &self.source_to_variable
    }

    /// The source connectivity, over source vertices.
    #[inline]
    pub fn source_faces(&self) -> &[MeshFace] {
        &self.source_faces
    }

    /// Length of the bounding-box diagonal.
    pub fn diagonal(&self) -> f64 {
        diagonal(&self.positions)
    }

    /// Mean 3D edge length.
    pub fn mean_edge_length(&self) -> f64 {
        if self.rest_lengths.is_empty() {
            return 0.0;
        }
        self.rest_lengths.iter().sum::<f64>() / self.rest_lengths.len() as f64
    }

    /// Total 3D area.
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|tri| triangle_area(&self.positions, tri))
            .sum()
    }
}

fn triangle_area(positions: &[Point3<f64>], tri: &[usize; 3]) -> f64 {
    let [a, b, c] = tri.map(|v| positions[v]);
    0.5 * (b - a).cross(&(c - a)).norm()
}

fn diagonal(positions: &[Point3<f64>]) -> f64 {
    bounding_box(positions)
        .map(|(min, max)| (max - min).norm())
        .unwrap_or(0.0)
}
