//! Edge table, boundary loops and connected components of a triangle soup.
//!
//! Everything here is built by sorting, never by iterating a hash map, so the
//! order of edges, loops and components depends only on the input.

use crate::error::{Result, SquishError};

/// An undirected edge with its incident triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Endpoints, smaller index first.
    pub vertices: [usize; 2],
    /// Incident triangles (one for a boundary edge, two for an interior edge).
    pub triangles: Vec<usize>,
}

impl Edge {
    /// Whether the edge lies on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        self.triangles.len() == 1
    }
}

/// Connectivity derived from a list of triangles.
#[derive(Debug, Clone)]
pub struct Topology {
    /// Undirected edges sorted by endpoint pair.
    pub edges: Vec<Edge>,
    /// For each triangle, the edge ids of its sides `(0,1)`, `(1,2)`, `(2,0)`.
    pub triangle_edges: Vec<[usize; 3]>,
    /// Boundary loops, each oriented along the triangles' winding.
    pub boundary_loops: Vec<Vec<usize>>,
    /// Connected components, ordered by their first triangle.
    pub components: Vec<Component>,
}

/// A connected set of triangles.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    /// Vertices, ascending.
    pub vertices: Vec<usize>,
    /// Triangles, ascending.
    pub triangles: Vec<usize>,
}

/// A directed side of a triangle.
#[derive(Debug, Clone, Copy)]
struct HalfEdge {
    key: (usize, usize),
    from: usize,
    to: usize,
    triangle: usize,
    side: usize,
}

impl Topology {
    /// Build connectivity for `triangles` over `num_vertices` vertices.
    ///
    /// Fails if an edge has more than two incident triangles or two triangles
    /// traverse an edge in the same direction. Reported vertex ids go through
    /// `vertex_label` so callers can translate internal ids back to their own.
    pub fn build(
        num_vertices: usize,
        triangles: &[[usize; 3]],
        vertex_label: impl Fn(usize) -> usize,
    ) -> Result<Self> {
        let mut half_edges = Vec::with_capacity(triangles.len() * 3);
        for (t, tri) in triangles.iter().enumerate() {
            for side in 0..3 {
                let from = tri[side];
                let to = tri[(side + 1) % 3];
                half_edges.push(HalfEdge {
                    key: (from.min(to), from.max(to)),
                    from,
                    to,
                    triangle: t,
                    side,
                });
            }
        }
        half_edges.sort_by_key(|h| (h.key, h.triangle, h.side));

        let mut edges = Vec::new();
        let mut triangle_edges = vec![[usize::MAX; 3]; triangles.len()];
        let mut boundary_half_edges = Vec::new();

        for group in half_edges.chunk_by(|a, b| a.key == b.key) {
            let (v0, v1) = group[0].key;
            if group.len() > 2 {
                return Err(SquishError::NonManifoldEdge {
                    v0: vertex_label(v0),
                    v1: vertex_label(v1),
                });
            }
            if group.len() == 2 && group[0].from == group[1].from {
                return Err(SquishError::InconsistentWinding {
                    v0: vertex_label(group[0].from),
                    v1: vertex_label(group[0].to),
                });
            }

            let id = edges.len();
            for h in group {
                triangle_edges[h.triangle][h.side] = id;
            }
            if group.len() == 1 {
                boundary_half_edges.push((group[0].from, group[0].to));
            }
            edges.push(Edge {
                vertices: [v0, v1],
                triangles: group.iter().map(|h| h.triangle).collect(),
            });
        }

        let boundary_loops = trace_boundary_loops(boundary_half_edges);
        let components = connected_components(num_vertices, triangles);

        Ok(Self {
            edges,
            triangle_edges,
            boundary_loops,
            components,
        })
    }

    /// Per-vertex boundary flags.
    pub fn boundary_vertices(&self, num_vertices: usize) -> Vec<bool> {
        let mut flags = vec![false; num_vertices];
        for lp in &self.boundary_loops {
            for &v in lp {
                flags[v] = true;
            }
        }
        flags
    }
}

/// Chain boundary half-edges into loops.
///
/// At a vertex with several outgoing boundary half-edges (two fans touching
/// at a point) the one with the smallest destination is taken first.
fn trace_boundary_loops(mut half_edges: Vec<(usize, usize)>) -> Vec<Vec<usize>> {
    half_edges.sort_unstable();
    let mut used = vec![false; half_edges.len()];
    let mut loops = Vec::new();

    for start in 0..half_edges.len() {
        if used[start] {
            continue;
        }
        let origin = half_edges[start].0;
        let mut lp = Vec::new();
        let mut current = start;
        loop {
            used[current] = true;
            let (from, to) = half_edges[current];
            lp.push(from);
            if to == origin {
                break;
            }
            let first = half_edges.partition_point(|&(f, _)| f < to);
            let next = (first..half_edges.len())
                .take_while(|&i| half_edges[i].0 == to)
                .find(|&i| !used[i]);
            match next {
                Some(i) => current = i,
                // Open chain; only possible when the boundary touches itself.
                None => break,
            }
        }
        loops.push(lp);
    }
    loops
}

/// Group triangles that share a vertex.
fn connected_components(num_vertices: usize, triangles: &[[usize; 3]]) -> Vec<Component> {
    let mut parent: Vec<usize> = (0..num_vertices).collect();

    fn find(parent: &mut [usize], mut v: usize) -> usize {
        while parent[v] != v {
            parent[v] = parent[parent[v]];
            v = parent[v];
        }
        v
    }

    for tri in triangles {
        for k in 1..3 {
            let a = find(&mut parent, tri[0]);
            let b = find(&mut parent, tri[k]);
            if a != b {
                // Keep the smaller root so labels do not depend on merge order.
                let (lo, hi) = (a.min(b), a.max(b));
                parent[hi] = lo;
            }
        }
    }

    let mut slot = vec![usize::MAX; num_vertices];
    let mut components: Vec<Component> = Vec::new();
    for (t, tri) in triangles.iter().enumerate() {
        let root = find(&mut parent, tri[0]);
        if slot[root] == usize::MAX {
            slot[root] = components.len();
            components.push(Component {
                vertices: Vec::new(),
                triangles: Vec::new(),
            });
        }
        components[slot[root]].triangles.push(t);
    }

    let mut seen = vec![false; num_vertices];
    for component in &mut components {
        for &t in &component.triangles {
            for &v in &triangles[t] {
                if !seen[v] {
                    seen[v] = true;
                    component.vertices.push(v);
                }
            }
        }
        component.vertices.sort_unstable();
    }

    components
}
