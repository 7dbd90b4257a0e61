//! Enforcement of the absolute length-ratio limit.
//!
//! Edges outside the allowed ratio interval are first projected back into it
//! one at a time (Gauss-Seidel, in edge order). Whatever violation remains
//! after `limit_iterations` sweeps is removed by a uniform scale about the
//! centroid chosen so the worst edge lands on the bound. Because the limit is
//! one-sided, a uniform scale can always satisfy it.

use nalgebra::{Point2, Vector2};

use crate::error::{Result, SquishError};
use crate::params::{RatioBounds, SquishOptions};

use super::patch::Patch;

/// Relative margin kept inside the bounds so later translations cannot
/// round an edge across them.
const MARGIN: f64 = 1e-9;

/// What enforcement had to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct LimitOutcome {
    /// Projection sweeps performed.
    pub sweeps: usize,
    /// Uniform scale applied after projection, if any.
    pub rescale: Option<f64>,
}

/// Bring every edge ratio of `layout` inside `bounds`.
pub(crate) fn enforce_limits(
    patch: &Patch,
    layout: &mut [Point2<f64>],
    bounds: RatioBounds,
    options: &SquishOptions,
) -> Result<LimitOutcome> {
    if !bounds.is_constrained() {
        return Ok(LimitOutcome {
            sweeps: 0,
            rescale: None,
        });
    }

    let lo = bounds.min * (1.0 + MARGIN);
    let hi = bounds.max * (1.0 - MARGIN);

    let mut sweeps = 0;
    while sweeps < options.limit_iterations {
        sweeps += 1;
        let mut moved = false;
        for edge in &patch.edges {
            let [a, b] = edge.vertices;
            let d = layout[b] - layout[a];
            let length = d.norm();
            if length == 0.0 {
                continue;
            }
            let ratio = length / edge.rest_length;
            let target = if ratio > hi {
                hi * edge.rest_length
            } else if ratio < lo {
                lo * edge.rest_length
            } else {
                continue;
            };
            let correction: Vector2<f64> = d * (0.5 * (length - target) / length);
            layout[a] += correction;
            layout[b] -= correction;
            moved = true;
        }
        if !moved {
            break;
        }
    }

    let (min_ratio, max_ratio) = patch.ratio_range(layout);
    let scale = if max_ratio > hi {
        Some(hi / max_ratio)
    } else if min_ratio < lo {
        if min_ratio == 0.0 {
            return Err(SquishError::degenerate(
                "an edge collapsed to zero length; the compression limit cannot be met",
            ));
        }
        Some(lo / min_ratio)
    } else {
        None
    };

    if let Some(s) = scale {
        log::warn!(
            "length-ratio limit not met after {} projection sweeps; rescaling by {:.6}",
            sweeps,
            s
        );
        let centroid =
            layout.iter().fold(Vector2::<f64>::zeros(), |acc, p| acc + p.coords) / layout.len() as f64;
        for p in layout.iter_mut() {
            p.coords = centroid + (p.coords - centroid) * s;
        }
    }

    Ok(LimitOutcome {
        sweeps,
        rescale: scale,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::patch::tests::grid_patch;

    fn scaled_identity(patch: &Patch, s: f64) -> Vec<Point2<f64>> {
        patch
            .positions
            .iter()
            .map(|p| Point2::new(p.x * s, p.y * s))
            .collect()
    }

    #[test]
    fn test_unconstrained_is_untouched() {
        let patch = grid_patch(2, |_, _| 0.0);
        let mut layout = scaled_identity(&patch, 2.0);
        let before = layout.clone();
        let out = enforce_limits(&patch, &mut layout, RatioBounds::UNCONSTRAINED, &SquishOptions::default()).unwrap();
        assert_eq!(out.sweeps, 0);
        assert_eq!(layout, before);
    }

    #[test]
    fn test_stretch_cap_is_met() {
        let patch = grid_patch(3, |_, _| 0.0);
        let mut layout = scaled_identity(&patch, 1.5);
        let bounds = RatioBounds { min: 0.0, max: 1.0 };
        enforce_limits(&patch, &mut layout, bounds, &SquishOptions::default()).unwrap();
        let (_, hi) = patch.ratio_range(&layout);
        assert!(hi <= 1.0);
    }

    #[test]
    fn test_compression_cap_falls_back_to_rescale() {
        let patch = grid_patch(3, |_, _| 0.0);
        let mut layout = scaled_identity(&patch, 0.5);
        let bounds = RatioBounds {
            min: 0.8,
            max: f64::INFINITY,
        };
        let options = SquishOptions {
            limit_iterations: 0,
            ..SquishOptions::default()
        };
        let out = enforce_limits(&patch, &mut layout, bounds, &options).unwrap();
        assert!(out.rescale.is_some());
        let (lo, hi) = patch.ratio_range(&layout);
        assert!(lo >= 0.8);
        // Uniform: the worst edge saturates.
        assert!((lo - 0.8).abs() < 1e-6);
        assert!((hi - lo).abs() < 1e-9);
    }
}
