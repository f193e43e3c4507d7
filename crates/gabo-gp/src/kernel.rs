//! Geometry-aware covariance functions.
//!
//! Every kernel here is a radial profile of the manifold's geodesic distance,
//! `k(a, b) = σ² φ(d(a, b) / ℓ)`. On curved manifolds such kernels are not
//! positive definite for every length-scale (the geodesic Gaussian kernel on
//! the sphere breaks down for large `ℓ`), so a kernel carries a fixed set of
//! calibration points on which candidate hyperparameters are checked before
//! they are accepted.

use gabo_core::{
    manifold::Manifold,
    types::{constants::PSD_TOLERANCE, DMatrix},
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Default number of calibration points.
pub const DEFAULT_CALIBRATION_POINTS: usize = 24;

/// Radial profile of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum KernelFamily {
    /// `φ(r) = exp(-r²/2)`
    #[default]
    Gaussian,
    /// `φ(r) = exp(-r)`
    Laplace,
    /// `φ(r) = (1 + r²/(2α))^(-α)`
    RationalQuadratic {
        /// Shape parameter, must be positive
        alpha: f64,
    },
}

impl KernelFamily {
    /// Evaluates the profile `φ(r)`.
    pub fn profile(&self, r: f64) -> f64 {
        match *self {
            Self::Gaussian => (-0.5 * r * r).exp(),
            Self::Laplace => (-r).exp(),
            Self::RationalQuadratic { alpha } => (1.0 + r * r / (2.0 * alpha)).powf(-alpha),
        }
    }

    /// Evaluates `-r φ'(r)`, the derivative of `φ(d/ℓ)` with respect to `log ℓ`.
    pub fn log_scale_derivative(&self, r: f64) -> f64 {
        match *self {
            Self::Gaussian => r * r * (-0.5 * r * r).exp(),
            Self::Laplace => r * (-r).exp(),
            Self::RationalQuadratic { alpha } => {
                r * r * (1.0 + r * r / (2.0 * alpha)).powf(-alpha - 1.0)
            }
        }
    }

    /// Checks the family's own parameters.
    pub fn check(&self) -> ModelResult<()> {
        match *self {
            Self::RationalQuadratic { alpha } if !(alpha.is_finite() && alpha > 0.0) => Err(
                ModelError::invalid_hyperparameter(format!(
                    "rational quadratic alpha must be positive, got {alpha}"
                )),
            ),
            _ => Ok(()),
        }
    }

    /// Short name of the family.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gaussian => "gaussian",
            Self::Laplace => "laplace",
            Self::RationalQuadratic { .. } => "rational_quadratic",
        }
    }
}

/// Signal variance and length-scale of a kernel.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelHyperparameters {
    /// Signal variance `σ²`
    pub signal_variance: f64,
    /// Length-scale `ℓ`
    pub length_scale: f64,
}

impl Default for KernelHyperparameters {
    fn default() -> Self {
        Self {
            signal_variance: 1.0,
            length_scale: 0.5,
        }
    }
}

impl KernelHyperparameters {
    /// Creates checked hyperparameters.
    pub fn new(signal_variance: f64, length_scale: f64) -> ModelResult<Self> {
        let hp = Self {
            signal_variance,
            length_scale,
        };
        hp.check_range()?;
        Ok(hp)
    }

    /// Checks that both values are finite and positive.
    pub fn check_range(&self) -> ModelResult<()> {
        if !(self.signal_variance.is_finite() && self.signal_variance > 0.0) {
            return Err(ModelError::invalid_hyperparameter(format!(
                "signal variance must be positive, got {}",
                self.signal_variance
            )));
        }
        if !(self.length_scale.is_finite() && self.length_scale > 0.0) {
            return Err(ModelError::invalid_hyperparameter(format!(
                "length-scale must be positive, got {}",
                self.length_scale
            )));
        }
        Ok(())
    }
}

/// Distance-based covariance function on a manifold.
#[derive(Debug, Clone)]
pub struct GeometryKernel<M: Manifold> {
    manifold: M,
    family: KernelFamily,
    calibration: Vec<M::Point>,
    calibration_distances: DMatrix,
}

impl<M: Manifold> GeometryKernel<M> {
    /// Creates a kernel with [`DEFAULT_CALIBRATION_POINTS`] calibration points
    /// drawn from `seed`.
    pub fn new(manifold: M, family: KernelFamily, seed: u64) -> ModelResult<Self> {
        Self::with_calibration(manifold, family, DEFAULT_CALIBRATION_POINTS, seed)
    }

    /// Creates a kernel with `num_points` random calibration points.
    pub fn with_calibration(
        manifold: M,
        family: KernelFamily,
        num_points: usize,
        seed: u64,
    ) -> ModelResult<Self> {
        family.check()?;
        let mut rng = StdRng::seed_from_u64(seed);
        let calibration = (0..num_points)
            .map(|_| manifold.random_point(&mut rng, None))
            .collect::<gabo_core::Result<Vec<_>>>()?;
        let refs: Vec<&M::Point> = calibration.iter().collect();
        let calibration_distances = distance_matrix(&manifold, &refs)?;
        Ok(Self {
            manifold,
            family,
            calibration,
            calibration_distances,
        })
    }

    /// The underlying manifold.
    pub fn manifold(&self) -> &M {
        &self.manifold
    }

    /// The radial profile.
    pub fn family(&self) -> KernelFamily {
        self.family
    }

    /// Points used by [`validate`](Self::validate).
    pub fn calibration_points(&self) -> &[M::Point] {
        &self.calibration
    }

    /// Covariance for two points at geodesic distance `distance`.
    pub fn covariance_from_distance(&self, distance: f64, hp: &KernelHyperparameters) -> f64 {
        hp.signal_variance * self.family.profile(distance / hp.length_scale)
    }

    /// Derivative of [`covariance_from_distance`](Self::covariance_from_distance)
    /// with respect to `log ℓ`.
    pub fn log_length_scale_derivative(&self, distance: f64, hp: &KernelHyperparameters) -> f64 {
        hp.signal_variance * self.family.log_scale_derivative(distance / hp.length_scale)
    }

    /// Covariance between two points.
    pub fn covariance(
        &self,
        a: &M::Point,
        b: &M::Point,
        hp: &KernelHyperparameters,
    ) -> ModelResult<f64> {
        let d = self.manifold.distance(a, b)?;
        Ok(self.covariance_from_distance(d, hp))
    }

    /// Pairwise geodesic distances between `points`.
    pub fn distance_matrix(&self, points: &[&M::Point]) -> ModelResult<DMatrix> {
        distance_matrix(&self.manifold, points)
    }

    /// Gram matrix for precomputed pairwise distances.
    pub fn gram_from_distances(&self, distances: &DMatrix, hp: &KernelHyperparameters) -> DMatrix {
        distances.map(|d| self.covariance_from_distance(d, hp))
    }

    /// Checks the Gram matrix over the calibration points.
    pub fn validate(&self, hp: &KernelHyperparameters) -> bool {
        self.validate_distances(hp, &self.calibration_distances)
    }

    /// Like [`validate`](Self::validate) but reports the failure as
    /// [`ModelError::InvalidHyperparameter`].
    pub fn check(&self, hp: &KernelHyperparameters) -> ModelResult<()> {
        hp.check_range()?;
        if self.validate(hp) {
            Ok(())
        } else {
            Err(ModelError::invalid_hyperparameter(format!(
                "{} kernel with signal variance {} and length-scale {} is not positive semi-definite on {}",
                self.family.name(),
                hp.signal_variance,
                hp.length_scale,
                self.manifold.name()
            )))
        }
    }

    /// Checks the Gram matrix over an arbitrary point set.
    pub fn validate_points(
        &self,
        hp: &KernelHyperparameters,
        points: &[M::Point],
    ) -> ModelResult<bool> {
        let refs: Vec<&M::Point> = points.iter().collect();
        let distances = self.distance_matrix(&refs)?;
        Ok(self.validate_distances(hp, &distances))
    }

    /// Checks the Gram matrix built from a precomputed distance matrix.
    ///
    /// The matrix must be finite, symmetric, and have no eigenvalue below
    /// `-PSD_TOLERANCE · max(1, λ_max)`.
    pub fn validate_distances(&self, hp: &KernelHyperparameters, distances: &DMatrix) -> bool {
        if hp.check_range().is_err() {
            return false;
        }
        let gram = self.gram_from_distances(distances, hp);
        is_positive_semidefinite(&gram)
    }
}

/// PSD test shared by the kernel gate and the tests.
pub fn is_positive_semidefinite(gram: &DMatrix) -> bool {
    if gram.nrows() != gram.ncols() || gram.iter().any(|v| !v.is_finite()) {
        return false;
    }
    if gram.is_empty() {
        return true;
    }
    let scale = gram.amax().max(1.0);
    if (gram - gram.transpose()).amax() > PSD_TOLERANCE * scale {
        return false;
    }
    let eigenvalues = gram.symmetric_eigenvalues();
    let max = eigenvalues.max();
    let min = eigenvalues.min();
    min >= -PSD_TOLERANCE * max.max(1.0)
}

fn distance_matrix<M: Manifold>(manifold: &M, points: &[&M::Point]) -> ModelResult<DMatrix> {
    let n = points.len();
    let mut distances = DMatrix::zeros(n, n);
    for i in 0..n {
        for j in (i + 1)..n {
            let d = manifold.distance(points[i], points[j])?;
            distances[(i, j)] = d;
            distances[(j, i)] = d;
        }
    }
    Ok(distances)
}
