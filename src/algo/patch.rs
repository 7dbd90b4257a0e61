//! Per-component flattening problem.

use nalgebra::{Point2, Point3};

use crate::mesh::{Component, DiscretizedSurface};

/// One connected component with local vertex numbering.
#[derive(Debug, Clone)]
pub(crate) struct Patch {
    /// Local vertex -> surface variable.
    pub variables: Vec<usize>,
    /// 3D positions, by local vertex.
    pub positions: Vec<Point3<f64>>,
    /// Triangles over local vertices.
    pub triangles: Vec<[usize; 3]>,
    /// Edges over local vertices, sorted by endpoints.
    pub edges: Vec<PatchEdge>,
    /// Boundary flag per local vertex.
    pub boundary: Vec<bool>,
    /// Incident `(neighbour, edge)` pairs per local vertex, by edge id.
    pub adjacency: Vec<Vec<(usize, usize)>>,
}

/// A spring between two local vertices.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PatchEdge {
    pub vertices: [usize; 2],
    pub rest_length: f64,
    pub boundary: bool,
}

/// Output of an iterative solver.
#[derive(Debug, Clone)]
pub(crate) struct Relaxation {
    pub positions: Vec<Point2<f64>>,
    pub iterations: usize,
    pub converged: bool,
    pub max_displacement: f64,
}

impl Patch {
    /// Extract `component` from `surface`.
    ///
    /// Work is proportional to the component, not the surface: local ids
    /// are found by binary search in the component's sorted vertex list.
    pub fn new(surface: &DiscretizedSurface, component: &Component) -> Self {
        let variables = component.vertices.clone();
        let local = |v: usize| variables.binary_search(&v).unwrap_or(usize::MAX);

        let mut surface_edges: Vec<usize> = component
            .triangles
            .iter()
            .flat_map(|&t| surface.triangle_edges()[t])
            .collect();
        surface_edges.sort_unstable();
        surface_edges.dedup();

        let edges: Vec<PatchEdge> = surface_edges
            .iter()
            .map(|&e| {
                let edge = &surface.edges()[e];
                PatchEdge {
                    vertices: edge.vertices.map(local),
                    rest_length: surface.rest_lengths()[e],
                    boundary: edge.is_boundary(),
                }
            })
            .collect();

        let triangles = component
            .triangles
            .iter()
            .map(|&t| surface.triangles()[t].map(local))
            .collect();

        let mut boundary = vec![false; variables.len()];
        let mut adjacency = vec![Vec::new(); variables.len()];
        for (id, edge) in edges.iter().enumerate() {
            let [a, b] = edge.vertices;
            adjacency[a].push((b, id));
            adjacency[b].push((a, id));
            if edge.boundary {
                boundary[a] = true;
                boundary[b] = true;
            }
        }

        let positions = variables.iter().map(|&v| surface.positions()[v]).collect();

        Self {
            variables,
            positions,
            triangles,
            edges,
            boundary,
            adjacency,
        }
    }

    /// Number of local vertices.
    #[inline]
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether any edge lies on the boundary.
    pub fn has_boundary(&self) -> bool {
        self.edges.iter().any(|e| e.boundary)
    }

    /// Mean rest length.
    pub fn mean_edge_length(&self) -> f64 {
        if self.edges.is_empty() {
            return 0.0;
        }
        self.edges.iter().map(|e| e.rest_length).sum::<f64>() / self.edges.len() as f64
    }

    /// Total 3D area.
    pub fn area(&self) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|v| self.positions[v]);
                0.5 * (b - a).cross(&(c - a)).norm()
            })
            .sum()
    }

    /// Signed area of a 2D layout of this patch.
    pub fn signed_area_2d(&self, layout: &[Point2<f64>]) -> f64 {
        self.triangles
            .iter()
            .map(|t| {
                let [a, b, c] = t.map(|v| layout[v]);
                0.5 * (b - a).perp(&(c - a))
            })
            .sum()
    }

    /// Largest and smallest 2D/3D length ratio over all edges.
    pub fn ratio_range(&self, layout: &[Point2<f64>]) -> (f64, f64) {
        self.edges.iter().fold((f64::INFINITY, 0.0f64), |(lo, hi), e| {
            let [a, b] = e.vertices;
            let r = (layout[b] - layout[a]).norm() / e.rest_length;
            (lo.min(r), hi.max(r))
        })
    }
}

/// Largest distance any vertex moved between two layouts.
pub(crate) fn max_displacement(before: &[Point2<f64>], after: &[Point2<f64>]) -> f64 {
    before
        .iter()
        .zip(after)
        .map(|(a, b)| (b - a).norm())
        .fold(0.0, f64::max)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapt::adapt_mesh;
    use crate::geometry::Mesh;
    use crate::params::SquishOptions;

    /// `n x n` quad grid on `z = f(x, y)`, split into triangles.
    pub(crate) fn grid_mesh(n: usize, height: impl Fn(f64, f64) -> f64) -> Mesh {
        let mut vertices = Vec::new();
        for j in 0..=n {
            for i in 0..=n {
                let x = i as f64 / n as f64;
                let y = j as f64 / n as f64;
                vertices.push(Point3::new(x, y, height(x, y)));
            }
        }
        let idx = |i: usize, j: usize| j * (n + 1) + i;
        let mut tris = Vec::new();
        for j in 0..n {
            for i in 0..n {
                tris.push([idx(i, j), idx(i + 1, j), idx(i + 1, j + 1)]);
                tris.push([idx(i, j), idx(i + 1, j + 1), idx(i, j + 1)]);
            }
        }
        Mesh::from_triangles(vertices, &tris)
    }

    pub(crate) fn grid_patch(n: usize, height: impl Fn(f64, f64) -> f64) -> Patch {
        let surface = adapt_mesh(&grid_mesh(n, height), false, &SquishOptions::default()).unwrap();
        Patch::new(&surface, &surface.components()[0])
    }

    #[test]
    fn test_patch_from_grid() {
        let patch = grid_patch(2, |_, _| 0.0);
        assert_eq!(patch.len(), 9);
        assert_eq!(patch.triangles.len(), 8);
        assert_eq!(patch.edges.len(), 16);
        assert!(patch.has_boundary());
        assert_eq!(patch.boundary.iter().filter(|&&b| b).count(), 8);
        assert!((patch.area() - 1.0).abs() < 1e-12);

        // Centre vertex of a 2x2 grid has six neighbours.
        assert_eq!(patch.adjacency[4].len(), 6);
        for tri in &patch.triangles {
            for s in 0..3 {
                let mut pair = [tri[s], tri[(s + 1) % 3]];
                pair.sort_unstable();
                assert!(patch.edges.iter().any(|e| e.vertices == pair), "{pair:?}");
            }
        }
    }

    #[test]
    fn test_patch_of_later_component_uses_local_ids() {
        let mut tris = Vec::new();
        let mut vertices = Vec::new();
        for k in 0..3 {
            let x = 2.0 * k as f64;
            vertices.push(Point3::new(x, 0.0, 0.0));
            vertices.push(Point3::new(x + 1.0, 0.0, 0.0));
            vertices.push(Point3::new(x, 1.0, 0.0));
            tris.push([3 * k, 3 * k + 1, 3 * k + 2]);
        }
        let surface =
            adapt_mesh(&Mesh::from_triangles(vertices, &tris), false, &SquishOptions::default()).unwrap();
        assert_eq!(surface.components().len(), 3);

        for component in surface.components() {
            let patch = Patch::new(&surface, component);
            assert_eq!(patch.len(), 3);
            assert_eq!(patch.triangles, vec![[0, 1, 2]]);
            assert_eq!(patch.edges.len(), 3);
            assert!(patch.edges.iter().all(|e| e.vertices.iter().all(|&v| v < 3)));
        }
    }

    #[test]
    fn test_ratio_range_of_identity_layout() {
        let patch = grid_patch(2, |_, _| 0.0);
        let layout: Vec<_> = patch.positions.iter().map(|p| Point2::new(p.x, p.y)).collect();
        let (lo, hi) = patch.ratio_range(&layout);
        assert!((lo - 1.0).abs() < 1e-12 && (hi - 1.0).abs() < 1e-12);
        assert!((patch.signed_area_2d(&layout) - 1.0).abs() < 1e-12);
    }
}
