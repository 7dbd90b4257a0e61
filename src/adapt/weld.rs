//! Coincident-vertex merging.

use std::collections::HashMap;

use nalgebra::Point3;

/// Map every point to the first earlier point within `tolerance` of it.
///
/// Returns, for each input index, the index of its representative. A point
/// that matches several earlier representatives takes the smallest index, so
/// the result depends only on the input order.
pub(crate) fn weld(points: &[Point3<f64>], tolerance: f64) -> Vec<usize> {
    if tolerance > 0.0 {
        weld_within(points, tolerance)
    } else {
        weld_exact(points)
    }
}

fn weld_within(points: &[Point3<f64>], tolerance: f64) -> Vec<usize> {
    let cell = |p: &Point3<f64>| {
        (
            (p.x / tolerance).floor() as i64,
            (p.y / tolerance).floor() as i64,
            (p.z / tolerance).floor() as i64,
        )
    };

    let mut grid: HashMap<(i64, i64, i64), Vec<usize>> = HashMap::new();
    let mut representative = Vec::with_capacity(points.len());

    for (i, p) in points.iter().enumerate() {
        let (cx, cy, cz) = cell(p);
        let mut best: Option<usize> = None;
        for dx in -1..=1 {
            for dy in -1..=1 {
                for dz in -1..=1 {
                    let key = (
                        cx.saturating_add(dx),
                        cy.saturating_add(dy),
                        cz.saturating_add(dz),
                    );
                    let Some(candidates) = grid.get(&key) else {
                        continue;
                    };
                    for &c in candidates {
                        if (points[c] - p).norm() <= tolerance && best.map_or(true, |b| c < b) {
                            best = Some(c);
                        }
                    }
                }
            }
        }

        match best {
            Some(rep) => representative.push(rep),
            None => {
                grid.entry((cx, cy, cz)).or_default().push(i);
                representative.push(i);
            }
        }
    }

    representative
}

fn weld_exact(points: &[Point3<f64>]) -> Vec<usize> {
    let mut seen: HashMap<[u64; 3], usize> = HashMap::new();
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            // Normalise -0.0 so it matches 0.0.
            let key = [p.x + 0.0, p.y + 0.0, p.z + 0.0].map(f64::to_bits);
            *seen.entry(key).or_insert(i)
        })
        .collect()
}
