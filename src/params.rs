//! Flattening parameters and engine options.
//!
//! [`SquishParameters`] is the user-facing bundle: the length-ratio limit, the
//! algorithm, the four spring constants, and the topology/mapping switches.
//! [`SquishOptions`] holds the engine tolerances and iteration caps that
//! callers rarely need to touch.

use crate::error::{Result, SquishError};

/// The flattening algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlatteningAlgorithm {
    /// Distance preservation: as-rigid-as-possible energy minimisation.
    Geometric,
    /// Mass-spring relaxation driven by the four spring constants.
    #[default]
    PhysicalStress,
}

/// Parameters controlling a flattening.
///
/// # Absolute limit
///
/// Let `r = (2d length) / (3d length)` for an edge.
///
/// | `absolute_limit` | constraint |
/// |------------------|------------|
/// | `-1.0 ..= <0.0`  | `r >= |absolute_limit|` (compression cap) |
/// | `0.0`            | unconstrained |
/// | `>0.0 ..= 1.0`   | `r <= 1 / absolute_limit` (stretch cap) |
///
/// So `-1.0` forbids compression and `1.0` forbids stretching.
///
/// # Example
///
/// ```
/// use squisher::params::{FlatteningAlgorithm, SquishParameters};
///
/// let params = SquishParameters::default()
///     .with_algorithm(FlatteningAlgorithm::Geometric)
///     .with_absolute_limit(-0.5);
/// assert!(params.validate().is_ok());
/// assert_eq!(params.ratio_bounds().min, 0.5);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct SquishParameters {
    /// Length-ratio limit, see the type docs. Default: 0.0 (unconstrained).
    pub absolute_limit: f64,

    /// Flattening algorithm. Default: [`FlatteningAlgorithm::PhysicalStress`].
    pub algorithm: FlatteningAlgorithm,

    /// Spring constant for compressed boundary edges times the rest length.
    pub boundary_compress_constant: f64,

    /// Spring constant for stretched boundary edges times the rest length.
    pub boundary_stretch_constant: f64,

    /// Spring constant for compressed interior edges times the rest length.
    pub interior_compress_constant: f64,

    /// Spring constant for stretched interior edges times the rest length.
    pub interior_stretch_constant: f64,

    /// Keep coincident 3D vertices coincident in 2D. Default: false.
    pub preserve_topology: bool,

    /// Retain a mapping index for later point/curve queries. Default: true.
    pub save_mapping: bool,
}

impl Default for SquishParameters {
    fn default() -> Self {
        Self {
            absolute_limit: 0.0,
            algorithm: FlatteningAlgorithm::PhysicalStress,
            boundary_compress_constant: 1.0,
            boundary_stretch_constant: 1.0,
            interior_compress_constant: 1.0,
            interior_stretch_constant: 1.0,
            preserve_topology: false,
            save_mapping: true,
        }
    }
}

impl SquishParameters {
    /// Parameters that forbid any stretching (`absolute_limit = 1`).
    pub fn no_stretch() -> Self {
        Self::default().with_absolute_limit(1.0)
    }

    /// Parameters that forbid any compression (`absolute_limit = -1`).
    pub fn no_compression() -> Self {
        Self::default().with_absolute_limit(-1.0)
    }

    /// Set the absolute length-ratio limit.
    pub fn with_absolute_limit(mut self, limit: f64) -> Self {
        self.absolute_limit = limit;
        self
    }

    /// Set the flattening algorithm.
    pub fn with_algorithm(mut self, algorithm: FlatteningAlgorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Set all four spring constants.
    pub fn with_spring_constants(
        mut self,
        boundary_compress: f64,
        boundary_stretch: f64,
        interior_compress: f64,
        interior_stretch: f64,
    ) -> Self {
        self.boundary_compress_constant = boundary_compress;
        self.boundary_stretch_constant = boundary_stretch;
        self.interior_compress_constant = interior_compress;
        self.interior_stretch_constant = interior_stretch;
        self
    }

    /// Set whether coincident vertices stay coincident.
    pub fn with_preserve_topology(mut self, preserve: bool) -> Self {
        self.preserve_topology = preserve;
        self
    }

    /// Set whether the mapping index is retained.
    pub fn with_save_mapping(mut self, save: bool) -> Self {
        self.save_mapping = save;
        self
    }

    /// Check that every value is in range.
    pub fn validate(&self) -> Result<()> {
        if !self.absolute_limit.is_finite() || self.absolute_limit.abs() > 1.0 {
            return Err(SquishError::invalid_param(
                "absolute_limit",
                self.absolute_limit,
                "must be in [-1, 1]",
            ));
        }

        let constants = [
            ("boundary_compress_constant", self.boundary_compress_constant),
            ("boundary_stretch_constant", self.boundary_stretch_constant),
            ("interior_compress_constant", self.interior_compress_constant),
            ("interior_stretch_constant", self.interior_stretch_constant),
        ];
        for (name, value) in constants {
            if !value.is_finite() || value <= 0.0 {
                return Err(SquishError::invalid_param(
                    name,
                    value,
                    "must be finite and positive",
                ));
            }
        }

        Ok(())
    }

    /// The allowed interval for the 2D/3D edge length ratio.
    pub fn ratio_bounds(&self) -> RatioBounds {
        let limit = self.absolute_limit;
        if limit < 0.0 {
            RatioBounds {
                min: -limit,
                max: f64::INFINITY,
            }
        } else if limit > 0.0 {
            RatioBounds {
                min: 0.0,
                max: 1.0 / limit,
            }
        } else {
            RatioBounds::UNCONSTRAINED
        }
    }
}

/// Closed interval `[min, max]` for the 2D/3D edge length ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatioBounds {
    /// Smallest allowed ratio (0 when compression is free).
    pub min: f64,
    /// Largest allowed ratio (infinity when stretching is free).
    pub max: f64,
}

impl RatioBounds {
    /// No constraint at all.
    pub const UNCONSTRAINED: RatioBounds = RatioBounds {
        min: 0.0,
        max: f64::INFINITY,
    };

    /// Whether any bound is active.
    pub fn is_constrained(&self) -> bool {
        self.min > 0.0 || self.max.is_finite()
    }

    /// Whether `ratio` lies inside the interval.
    #[inline]
    pub fn contains(&self, ratio: f64) -> bool {
        ratio >= self.min && ratio <= self.max
    }
}

/// Engine-level tolerances and iteration caps.
///
/// Lengths marked *relative* are multiplied by the bounding-box diagonal of
/// the geometry being processed.
#[derive(Debug, Clone)]
pub struct SquishOptions {
    /// Maximum chord deviation when sampling a surface (relative).
    pub surface_tolerance: f64,

    /// Maximum number of samples along either surface direction.
    pub max_surface_samples: usize,

    /// Distance under which vertices count as coincident (relative).
    pub weld_tolerance: f64,

    /// Maximum outer iterations for either solver.
    pub max_iterations: usize,

    /// Convergence threshold on the largest per-iteration vertex displacement,
    /// relative to the mean rest edge length.
    pub convergence_tolerance: f64,

    /// Maximum conjugate gradient iterations per linear solve.
    pub cg_max_iterations: usize,

    /// Relative residual at which a conjugate gradient solve stops.
    pub cg_tolerance: f64,

    /// Projection sweeps spent enforcing the absolute limit before falling
    /// back to a uniform rescale.
    pub limit_iterations: usize,

    /// How far a query point may lie from the surface and still map (relative).
    pub domain_tolerance: f64,

    /// Maximum chord deviation when sampling a curve (relative).
    pub curve_tolerance: f64,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,
}

impl Default for SquishOptions {
    fn default() -> Self {
        Self {
            surface_tolerance: 1e-3,
            max_surface_samples: 128,
            weld_tolerance: 1e-9,
            max_iterations: 500,
            convergence_tolerance: 1e-7,
            cg_max_iterations: 2000,
            cg_tolerance: 1e-12,
            limit_iterations: 200,
            domain_tolerance: 1e-3,
            curve_tolerance: 1e-4,
            parallel: true,
        }
    }
}

impl SquishOptions {
    /// Set the maximum solver iterations.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the convergence threshold.
    pub fn with_convergence_tolerance(mut self, tol: f64) -> Self {
        self.convergence_tolerance = tol;
        self
    }

    /// Set the surface sampling tolerance.
    pub fn with_surface_tolerance(mut self, tol: f64) -> Self {
        self.surface_tolerance = tol;
        self
    }

    /// Set the projection sweeps spent on the absolute limit.
    pub fn with_limit_iterations(mut self, sweeps: usize) -> Self {
        self.limit_iterations = sweeps;
        self
    }

    /// Set the mapping domain tolerance.
    pub fn with_domain_tolerance(mut self, tol: f64) -> Self {
        self.domain_tolerance = tol;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_host_api() {
        let p = SquishParameters::default();
        assert_eq!(p.absolute_limit, 0.0);
        assert_eq!(p.algorithm, FlatteningAlgorithm::PhysicalStress);
        assert_eq!(p.boundary_compress_constant, 1.0);
        assert_eq!(p.interior_stretch_constant, 1.0);
        assert!(!p.preserve_topology);
        assert!(p.save_mapping);
        assert!(p.validate().is_ok());
    }

    #[test]
    fn test_ratio_bounds() {
        let free = SquishParameters::default().ratio_bounds();
        assert!(!free.is_constrained());

        let compress = SquishParameters::default()
            .with_absolute_limit(-0.5)
            .ratio_bounds();
        assert_eq!(compress.min, 0.5);
        assert!(compress.max.is_infinite());
        assert!(!compress.contains(0.49));

        let stretch = SquishParameters::default()
            .with_absolute_limit(0.5)
            .ratio_bounds();
        assert_eq!(stretch.min, 0.0);
        assert_eq!(stretch.max, 2.0);

        assert_eq!(SquishParameters::no_compression().ratio_bounds().min, 1.0);
        assert_eq!(SquishParameters::no_stretch().ratio_bounds().max, 1.0);
    }

    #[test]
    fn test_spring_constants_are_independent() {
        let p = SquishParameters::default().with_spring_constants(1.0, 2.0, 3.0, 4.0);
        assert_eq!(p.boundary_compress_constant, 1.0);
        assert_eq!(p.boundary_stretch_constant, 2.0);
        assert_eq!(p.interior_compress_constant, 3.0);
        assert_eq!(p.interior_stretch_constant, 4.0);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let p = SquishParameters::default().with_absolute_limit(1.5);
        assert!(matches!(
            p.validate(),
            Err(SquishError::InvalidParameter { name: "absolute_limit", .. })
        ));

        let p = SquishParameters::default().with_spring_constants(1.0, 0.0, 1.0, 1.0);
        assert!(matches!(
            p.validate(),
            Err(SquishError::InvalidParameter {
                name: "boundary_stretch_constant",
                ..
            })
        ));

        let p = SquishParameters::default().with_absolute_limit(f64::NAN);
        assert!(p.validate().is_err());
    }
}
