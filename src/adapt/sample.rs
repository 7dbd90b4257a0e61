//! Adaptive grid sampling of NURBS surfaces.

use nalgebra::Point3;
use rayon::prelude::*;

use crate::error::{Result, SquishError};
use crate::geometry::{Mesh, MeshFace, NurbsSurface};
use crate::params::SquishOptions;

/// Sample `surface` into a quad mesh.
///
/// Each direction starts with `(control points - 1) * degree` spans and is
/// doubled while the midpoint of some span deviates from its chord by more
/// than `surface_tolerance` (relative to the control net's diagonal), until
/// `max_surface_samples` is reached.
///
/// Vertex `(i, j)` of the grid, `i` along u and `j` along v, has index
/// `i * (samples_v) + j`, unless an iso-line collapses to a single point.
/// Such a pole keeps one vertex (the lowest grid index) and the cells
/// touching it become triangles.
pub fn sample_surface(surface: &NurbsSurface, options: &SquishOptions) -> Result<Mesh> {
    let size = surface.control_net_diagonal();
    if !(size > 0.0) {
        return Err(SquishError::invalid_input("surface has zero area"));
    }
    let tolerance = options.surface_tolerance * size;
    let max_spans = options.max_surface_samples.saturating_sub(1).max(1);

    let ((u0, u1), (v0, v1)) = surface.domain();
    let (du, dv) = surface.degrees();
    let (cu, cv) = surface.control_counts();
    let mut spans_u = ((cu - 1) * du).clamp(1, max_spans);
    let mut spans_v = ((cv - 1) * dv).clamp(1, max_spans);

    loop {
        let us = linspace(u0, u1, spans_u);
        let vs = linspace(v0, v1, spans_v);

        let refine_u =
            spans_u < max_spans && max_deviation(&us, &vs, |u, v| surface.point_at(u, v)) > tolerance;
        let refine_v =
            spans_v < max_spans && max_deviation(&vs, &us, |v, u| surface.point_at(u, v)) > tolerance;

        if !refine_u && !refine_v {
            break;
        }
        if refine_u {
            spans_u = (spans_u * 2).min(max_spans);
        }
        if refine_v {
            spans_v = (spans_v * 2).min(max_spans);
        }
    }

    log::debug!("sampled surface on a {}x{} span grid", spans_u, spans_v);

    let us = linspace(u0, u1, spans_u);
    let vs = linspace(v0, v1, spans_v);
    let params: Vec<(f64, f64)> = us
        .iter()
        .flat_map(|&u| vs.iter().map(move |&v| (u, v)))
        .collect();
    let vertices: Vec<Point3<f64>> = if options.parallel {
        params.par_iter().map(|&(u, v)| surface.point_at(u, v)).collect()
    } else {
        params.iter().map(|&(u, v)| surface.point_at(u, v)).collect()
    };

    let row = spans_v + 1;
    let idx = |i: usize, j: usize| i * row + j;

    // Iso-lines that collapse to a point (poles, cone apexes) share a vertex.
    let coincide = options.weld_tolerance * size;
    let mut pole = Poles::new(vertices.len());
    for i in 0..=spans_u {
        let line: Vec<usize> = (0..=spans_v).map(|j| idx(i, j)).collect();
        pole.merge_if_collapsed(&line, &vertices, coincide);
    }
    for j in 0..=spans_v {
        let line: Vec<usize> = (0..=spans_u).map(|i| idx(i, j)).collect();
        pole.merge_if_collapsed(&line, &vertices, coincide);
    }

    let mut compact = vec![usize::MAX; vertices.len()];
    let mut kept = Vec::with_capacity(vertices.len());
    for v in 0..vertices.len() {
        if pole.find(v) == v {
            compact[v] = kept.len();
            kept.push(vertices[v]);
        }
    }

    let min_area = f64::EPSILON * size * size;
    let mut faces = Vec::with_capacity(spans_u * spans_v);
    for i in 0..spans_u {
        for j in 0..spans_v {
            let cell = [idx(i, j), idx(i + 1, j), idx(i + 1, j + 1), idx(i, j + 1)];
            let mut corners: Vec<usize> = Vec::with_capacity(4);
            for v in cell.map(|v| compact[pole.find(v)]) {
                if corners.last() != Some(&v) {
                    corners.push(v);
                }
            }
            if corners.len() > 1 && corners.first() == corners.last() {
                corners.pop();
            }

            let face = match corners[..] {
                [a, b, c, d] if a != c && b != d => Some(MeshFace::Quad([a, b, c, d])),
                [a, b, c] => Some(MeshFace::Triangle([a, b, c])),
                _ => None,
            };
            match face {
                Some(face) if face_area(&kept, &face) > min_area => faces.push(face),
                _ => {
                    return Err(SquishError::invalid_input(format!(
                        "surface has a zero-area region near (u, v) = ({:.4}, {:.4})",
                        0.5 * (us[i] + us[i + 1]),
                        0.5 * (vs[j] + vs[j + 1])
                    )));
                }
            }
        }
    }

    if kept.len() < vertices.len() {
        log::debug!("merged {} pole samples", vertices.len() - kept.len());
    }
    Ok(Mesh::new(kept, faces))
}

/// Union-find over grid samples, joined along collapsed iso-lines.
struct Poles {
    parent: Vec<usize>,
}

impl Poles {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&self, mut v: usize) -> usize {
        while self.parent[v] != v {
            v = self.parent[v];
        }
        v
    }

    /// Join every sample of `line` if they all lie within `tolerance` of the first.
    fn merge_if_collapsed(&mut self, line: &[usize], vertices: &[Point3<f64>], tolerance: f64) {
        let first = vertices[line[0]];
        if line.iter().any(|&v| (vertices[v] - first).norm() > tolerance) {
            return;
        }
        for &v in line {
            let (a, b) = (self.find(line[0]), self.find(v));
            // Smaller index stays the root.
            let (root, child) = (a.min(b), a.max(b));
            self.parent[child] = root;
        }
    }
}

/// `spans + 1` evenly spaced values covering `[a, b]` exactly.
fn linspace(a: f64, b: f64, spans: usize) -> Vec<f64> {
    (0..=spans)
        .map(|k| {
            if k == spans {
                b
            } else {
                a + (b - a) * k as f64 / spans as f64
            }
        })
        .collect()
}

/// Largest chord deviation of the iso-lines running along the first parameter.
fn max_deviation(
    along: &[f64],
    across: &[f64],
    eval: impl Fn(f64, f64) -> Point3<f64>,
) -> f64 {
    let mut worst = 0.0f64;
    for &s in across {
        let mut prev = eval(along[0], s);
        for w in along.windows(2) {
            let next = eval(w[1], s);
            let mid = eval(0.5 * (w[0] + w[1]), s);
            worst = worst.max(distance_to_chord(&mid, &prev, &next));
            prev = next;
        }
    }
    worst
}

fn distance_to_chord(p: &Point3<f64>, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq == 0.0 {
        return (p - a).norm();
    }
    let t = ((p - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    (p - (a + ab * t)).norm()
}

fn face_area(vertices: &[Point3<f64>], face: &MeshFace) -> f64 {
    let triangle = |a: usize, b: usize, c: usize| {
        0.5 * (vertices[b] - vertices[a]).cross(&(vertices[c] - vertices[a])).norm()
    };
    match *face {
        MeshFace::Triangle([a, b, c]) => triangle(a, b, c),
        MeshFace::Quad([a, b, c, d]) => triangle(a, b, c) + triangle(a, c, d),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bilinear_plane_is_not_refined() {
        let plane = NurbsSurface::bilinear([
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ])
        .unwrap();
        let mesh = sample_surface(&plane, &SquishOptions::default()).unwrap();
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 1);
        assert!((mesh.area() - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_curved_surface_is_refined_within_cap() {
        // Quadratic bump in u, straight in v.
        let pts = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 1.0),
            Point3::new(1.0, 1.0, 1.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        let surface = NurbsSurface::clamped(2, 1, 3, 2, pts).unwrap();
        let options = SquishOptions::default();
        let mesh = sample_surface(&surface, &options).unwrap();

        let samples_v = 2;
        let samples_u = mesh.num_vertices() / samples_v;
        assert!(samples_u > 5, "expected refinement along u, got {samples_u}");
        assert!(samples_u <= options.max_surface_samples);
        assert_eq!(mesh.num_faces(), (samples_u - 1) * (samples_v - 1));
    }

    #[test]
    fn test_degenerate_surface_rejected() {
        let p = Point3::new(1.0, 1.0, 1.0);
        let err = NurbsSurface::bilinear([p, p, p, p])
            .and_then(|s| sample_surface(&s, &SquishOptions::default()))
            .unwrap_err();
        assert!(err.is_invalid_input());
    }

    /// Quadratic arc in u swept to an apex at v = 0.
    fn cone() -> NurbsSurface {
        let apex = Point3::new(0.0, 0.0, 1.0);
        let pts = vec![
            apex,
            Point3::new(-1.0, 2.0, 0.0),
            apex,
            Point3::new(0.0, 2.0, 1.0),
            apex,
            Point3::new(1.0, 2.0, 0.0),
        ];
        NurbsSurface::clamped(2, 1, 3, 2, pts).unwrap()
    }

    #[test]
    fn test_collapsed_edge_becomes_a_fan() {
        let mesh = sample_surface(&cone(), &SquishOptions::default()).unwrap();
        let apexes = mesh
            .vertices
            .iter()
            .filter(|p| (*p - Point3::new(0.0, 0.0, 1.0)).norm() < 1e-12)
            .count();
        assert_eq!(apexes, 1);
        assert_eq!(mesh.num_vertices(), mesh.num_faces() + 2);
        assert!(mesh.faces.iter().all(|f| matches!(f, MeshFace::Triangle(_))));
        assert!(mesh.validate().is_ok());
        assert!(mesh.area() > 0.0);
    }

    #[test]
    fn test_linspace_hits_endpoints() {
        let s = linspace(0.25, 1.0, 3);
        assert_eq!(s.len(), 4);
        assert_eq!(s[0], 0.25);
        assert_eq!(s[3], 1.0);
    }
}
