//! Benchmarks for flattening and mapping.

use criterion::{criterion_group, criterion_main, Criterion};
use squisher::prelude::*;

fn create_grid_mesh(n: usize, height: impl Fn(f64, f64) -> f64) -> Mesh {
    let mut vertices = Vec::with_capacity((n + 1) * (n + 1));
    let mut quads = Vec::with_capacity(n * n);

    for j in 0..=n {
        for i in 0..=n {
            let x = i as f64 / n as f64;
            let y = j as f64 / n as f64;
            vertices.push(Point3::new(x, y, height(x, y)));
        }
    }

    for j in 0..n {
        for i in 0..n {
            let v00 = j * (n + 1) + i;
            let v10 = v00 + 1;
            let v01 = v00 + (n + 1);
            let v11 = v01 + 1;
            quads.push([v00, v10, v11, v01]);
        }
    }

    Mesh::from_quads(vertices, &quads)
}

/// `count` disjoint right triangles in a row.
fn create_triangle_soup(count: usize) -> Mesh {
    let mut vertices = Vec::with_capacity(3 * count);
    let mut triangles = Vec::with_capacity(count);
    for k in 0..count {
        let x = 2.0 * k as f64;
        vertices.push(Point3::new(x, 0.0, 0.0));
        vertices.push(Point3::new(x + 1.0, 0.0, 0.5));
        vertices.push(Point3::new(x, 1.0, 0.0));
        triangles.push([3 * k, 3 * k + 1, 3 * k + 2]);
    }
    Mesh::from_triangles(vertices, &triangles)
}

fn saddle(x: f64, y: f64) -> f64 {
    0.5 * ((x - 0.5).powi(2) - (y - 0.5).powi(2))
}

fn bench_flatten(c: &mut Criterion) {
    let grid: Geometry = create_grid_mesh(30, |_, _| 0.0).into();
    let curved: Geometry = create_grid_mesh(30, saddle).into();
    let options = SquishOptions::default().with_max_iterations(100);

    for algorithm in [FlatteningAlgorithm::Geometric, FlatteningAlgorithm::PhysicalStress] {
        let params = SquishParameters::default()
            .with_algorithm(algorithm)
            .with_save_mapping(false);
        let name = match algorithm {
            FlatteningAlgorithm::Geometric => "geometric",
            FlatteningAlgorithm::PhysicalStress => "stress",
        };

        c.bench_function(&format!("{name}_flat_grid_30"), |b| {
            b.iter(|| flatten_geometry(&grid, &params, &options).unwrap());
        });
        c.bench_function(&format!("{name}_saddle_30"), |b| {
            b.iter(|| flatten_geometry(&curved, &params, &options).unwrap());
        });
        c.bench_function(&format!("{name}_saddle_30_sequential"), |b| {
            let sequential = options.clone().sequential();
            b.iter(|| flatten_geometry(&curved, &params, &sequential).unwrap());
        });
    }

    let params = SquishParameters::default().with_save_mapping(false);
    let few = SquishOptions::default().with_max_iterations(5);
    for count in [2_000, 8_000] {
        let soup: Geometry = create_triangle_soup(count).into();
        c.bench_function(&format!("stress_triangle_soup_{count}"), |b| {
            b.iter(|| flatten_geometry(&soup, &params, &few).unwrap());
        });
    }
}

fn bench_mapping(c: &mut Criterion) {
    let mesh = create_grid_mesh(50, saddle);
    let mut squisher = Squisher::new();
    let flat = squisher
        .squish(&SquishParameters::default(), &mesh.clone().into())
        .unwrap();
    let squished = flat.to_geometry();
    let marks: Vec<Point2<f64>> = flat.positions_2d().to_vec();

    c.bench_function("squish_point_all_vertices", |b| {
        b.iter(|| {
            mesh.vertices
                .iter()
                .map(|p| squisher.squish_point(p).unwrap())
                .count()
        });
    });

    c.bench_function("squish_back_all_vertices", |b| {
        b.iter(|| squish_back_points(&squished, &marks).unwrap());
    });

    let diagonal = Curve::line(Point3::new(0.0, 0.0, saddle(0.0, 0.0)), Point3::new(1.0, 1.0, saddle(1.0, 1.0)));
    c.bench_function("squish_curve_diagonal", |b| {
        b.iter(|| squisher.squish_curve(&diagonal).unwrap());
    });
}

criterion_group!(benches, bench_flatten, bench_mapping);
criterion_main!(benches);
