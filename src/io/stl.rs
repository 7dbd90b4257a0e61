//! STL (stereolithography) format support.
//!
//! STL stores independent triangles; vertices with bit-identical coordinates
//! are merged on load so the mesh is connected again. Quads are split along
//! their shorter diagonal on save.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use nalgebra::{Point3, Vector3};

use crate::error::{Result, SquishError};
use crate::geometry::Mesh;

/// Load a mesh from an STL file (binary or ASCII).
pub fn load<P: AsRef<Path>>(path: P) -> Result<Mesh> {
    let path = path.as_ref();
    let mut file = File::open(path)?;

    // read_stl indexes the triangle corners, merging exact duplicates.
    let stl = stl_io::read_stl(&mut file).map_err(|e| SquishError::LoadError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    let vertices: Vec<Point3<f64>> = stl
        .vertices
        .iter()
        .map(|v| Point3::new(v[0] as f64, v[1] as f64, v[2] as f64))
        .collect();

    let mut triangles = Vec::with_capacity(stl.faces.len());
    let mut skipped = 0;
    for tri in &stl.faces {
        let [a, b, c] = tri.vertices;
        if a == b || b == c || a == c {
            skipped += 1;
            continue;
        }
        triangles.push([a, b, c]);
    }
    if skipped > 0 {
        log::warn!("{}: skipped {} degenerate triangles", path.display(), skipped);
    }

    if triangles.is_empty() {
        return Err(SquishError::LoadError {
            path: path.to_path_buf(),
            message: "STL file contains no valid triangles".to_string(),
        });
    }

    Ok(Mesh::from_triangles(vertices, &triangles))
}

/// Save a mesh to a binary STL file.
pub fn save<P: AsRef<Path>>(mesh: &Mesh, path: P) -> Result<()> {
    let path = path.as_ref();
    mesh.validate()?;
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);

    let vertex = |p: &Point3<f64>| stl_io::Vertex::new([p.x as f32, p.y as f32, p.z as f32]);
    let triangles: Vec<stl_io::Triangle> = mesh
        .triangulate()
        .iter()
        .map(|(t, _)| {
            let [p0, p1, p2] = t.map(|v| mesh.vertices[v]);
            let n = (p1 - p0).cross(&(p2 - p0)).try_normalize(0.0).unwrap_or_else(Vector3::zeros);
            stl_io::Triangle {
                normal: stl_io::Normal::new([n.x as f32, n.y as f32, n.z as f32]),
                vertices: [vertex(&p0), vertex(&p1), vertex(&p2)],
            }
        })
        .collect();

    stl_io::write_stl(&mut writer, triangles.iter()).map_err(|e| SquishError::SaveError {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    Ok(())
}
