//! Type-II maximum likelihood for kernel hyperparameters.
//!
//! The search runs in log space over `θ = (log σ², log ℓ, log σ_n²)` using the
//! analytic gradient of the log marginal likelihood
//!
//! ```text
//! ∂L/∂θ_j = ½ tr((ααᵀ - K⁻¹) ∂K/∂θ_j)
//! ```
//!
//! with backtracking step control and box bounds. Several restarts run through
//! [`MultiStart`]; every local optimum is checked against the kernel's PSD
//! gate on the calibration and training points before it can be accepted.

use gabo_core::{
    manifold::Manifold,
    multistart::MultiStart,
    types::{DMatrix, DVector},
};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    error::{ModelError, ModelResult},
    kernel::{GeometryKernel, KernelHyperparameters},
    surrogate::{cholesky_with_jitter, log_marginal_likelihood_from},
};

/// Sufficient increase constant of the backtracking line search.
const ARMIJO: f64 = 1e-4;

/// Largest log-space step.
const MAX_STEP: f64 = 2.0;

/// Backtracking gives up below this step.
const MIN_STEP: f64 = 1e-6;

/// Configuration of the hyperparameter search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HyperparameterSearchConfig {
    /// Number of restarts; the first one starts at the current hyperparameters
    pub num_restarts: usize,
    /// Gradient steps per restart
    pub max_iterations: usize,
    /// First step length in log space
    pub initial_step: f64,
    /// Stop when the projected gradient norm falls below this value
    pub gradient_tolerance: f64,
    /// Bounds on the signal variance
    pub signal_variance_bounds: (f64, f64),
    /// Bounds on the length-scale
    pub length_scale_bounds: (f64, f64),
    /// Bounds on the noise variance
    pub noise_variance_bounds: (f64, f64),
    /// Whether the noise variance is estimated or kept fixed
    pub optimize_noise: bool,
}

impl Default for HyperparameterSearchConfig {
    fn default() -> Self {
        Self {
            num_restarts: 4,
            max_iterations: 60,
            initial_step: 0.5,
            gradient_tolerance: 1e-4,
            signal_variance_bounds: (1e-2, 1e2),
            length_scale_bounds: (1e-2, 1e1),
            noise_variance_bounds: (1e-8, 1e-1),
            optimize_noise: true,
        }
    }
}

impl HyperparameterSearchConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of restarts.
    pub fn with_num_restarts(mut self, num_restarts: usize) -> Self {
        self.num_restarts = num_restarts;
        self
    }

    /// Sets the number of gradient steps per restart.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Sets the signal variance bounds.
    pub fn with_signal_variance_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.signal_variance_bounds = (lower, upper);
        self
    }

    /// Sets the length-scale bounds. The lower bound keeps the search away
    /// from length-scales too short to generalize.
    pub fn with_length_scale_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.length_scale_bounds = (lower, upper);
        self
    }

    /// Sets the noise variance bounds.
    pub fn with_noise_variance_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.noise_variance_bounds = (lower, upper);
        self
    }

    /// Enables or disables noise estimation.
    pub fn with_optimize_noise(mut self, optimize_noise: bool) -> Self {
        self.optimize_noise = optimize_noise;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> ModelResult<()> {
        if self.num_restarts == 0 {
            return Err(ModelError::invalid_hyperparameter(
                "hyperparameter search needs at least one restart",
            ));
        }
        if !(self.initial_step.is_finite() && self.initial_step > 0.0) {
            return Err(ModelError::invalid_hyperparameter(format!(
                "initial step must be positive, got {}",
                self.initial_step
            )));
        }
        for (name, (lo, hi)) in [
            ("signal_variance_bounds", self.signal_variance_bounds),
            ("length_scale_bounds", self.length_scale_bounds),
            ("noise_variance_bounds", self.noise_variance_bounds),
        ] {
            if !(lo.is_finite() && hi.is_finite() && lo > 0.0 && lo <= hi) {
                return Err(ModelError::invalid_hyperparameter(format!(
                    "{name} must satisfy 0 < lower <= upper, got ({lo}, {hi})"
                )));
            }
        }
        Ok(())
    }

    fn log_bounds(&self) -> [(f64, f64); 3] {
        let log = |(lo, hi): (f64, f64)| (lo.ln(), hi.ln());
        [
            log(self.signal_variance_bounds),
            log(self.length_scale_bounds),
            log(self.noise_variance_bounds),
        ]
    }
}

/// Result of a hyperparameter search.
#[derive(Debug, Clone, PartialEq)]
pub struct HyperparameterOutcome {
    /// Hyperparameters in force after the search
    pub hyperparameters: KernelHyperparameters,
    /// Noise variance in force after the search
    pub noise_variance: f64,
    /// Log marginal likelihood at the returned values
    pub log_marginal_likelihood: f64,
    /// Whether new values replaced the previous ones
    pub accepted: bool,
    /// Restarts whose optimum failed the PSD gate
    pub rejected_candidates: usize,
}

/// Searches for hyperparameters maximizing the log marginal likelihood of
/// `centered` (observations minus prior mean) at `points`.
///
/// Returns the current values with `accepted == false` when no valid
/// candidate improves on them.
pub fn search<M: Manifold>(
    kernel: &GeometryKernel<M>,
    points: &[&M::Point],
    centered: &DVector,
    current: KernelHyperparameters,
    current_noise: f64,
    config: &HyperparameterSearchConfig,
    seed: u64,
) -> ModelResult<HyperparameterOutcome> {
    config.validate()?;
    let calibration = kernel.calibration_points();
    let c = calibration.len();
    let n = points.len();
    let all: Vec<&M::Point> = calibration.iter().chain(points.iter().copied()).collect();
    let combined = kernel.distance_matrix(&all)?;
    let training = combined.view((c, c), (n, n)).into_owned();

    let surface = LikelihoodSurface {
        kernel,
        distances: &training,
        centered,
    };
    let current_theta = encode(&current, current_noise);
    let mut bounds = config.log_bounds();
    if !config.optimize_noise {
        bounds[2] = (current_theta[2], current_theta[2]);
    }
    let baseline = surface.evaluate(&current_theta).map(|(value, _)| value).ok();

    let mut start = current_theta;
    for (t, (lo, hi)) in start.iter_mut().zip(bounds) {
        *t = t.clamp(lo, hi);
    }

    let runner = MultiStart::new(config.num_restarts, seed);
    let report = runner.run(|index, rng| {
        let theta = if index == 0 {
            start
        } else {
            bounds.map(|(lo, hi)| if hi > lo { rng.gen_range(lo..=hi) } else { lo })
        };
        let (theta, value) = surface.ascend(theta, &bounds, config)?;
        let (hp, noise) = decode(&theta);
        if !kernel.validate_distances(&hp, &combined) {
            return Err(ModelError::invalid_hyperparameter(format!(
                "signal variance {:.4e}, length-scale {:.4e} give an indefinite Gram matrix",
                hp.signal_variance, hp.length_scale
            )));
        }
        Ok((value, (hp, noise)))
    });

    let mut rejected_candidates = 0;
    for (restart, err) in &report.failures {
        if matches!(err, ModelError::InvalidHyperparameter { .. }) {
            rejected_candidates += 1;
            tracing::warn!(restart, error = %err, "hyperparameter candidate rejected");
        } else {
            tracing::debug!(restart, error = %err, "hyperparameter restart failed");
        }
    }

    match report.best {
        Some(best) if baseline.map_or(true, |b| best.score > b) => {
            let (hyperparameters, noise_variance) = best.value;
            tracing::debug!(
                signal_variance = hyperparameters.signal_variance,
                length_scale = hyperparameters.length_scale,
                noise_variance,
                log_marginal_likelihood = best.score,
                "hyperparameters updated"
            );
            Ok(HyperparameterOutcome {
                hyperparameters,
                noise_variance,
                log_marginal_likelihood: best.score,
                accepted: true,
                rejected_candidates,
            })
        }
        best => {
            if best.is_none() {
                tracing::warn!(
                    restarts = report.trials,
                    "no valid hyperparameter candidate, keeping previous values"
                );
            }
            Ok(HyperparameterOutcome {
                hyperparameters: current,
                noise_variance: current_noise,
                log_marginal_likelihood: baseline.unwrap_or(f64::NEG_INFINITY),
                accepted: false,
                rejected_candidates,
            })
        }
    }
}

fn encode(hp: &KernelHyperparameters, noise: f64) -> [f64; 3] {
    [
        hp.signal_variance.ln(),
        hp.length_scale.ln(),
        noise.max(f64::MIN_POSITIVE).ln(),
    ]
}

fn decode(theta: &[f64; 3]) -> (KernelHyperparameters, f64) {
    (
        KernelHyperparameters {
            signal_variance: theta[0].exp(),
            length_scale: theta[1].exp(),
        },
        theta[2].exp(),
    )
}

/// Log marginal likelihood as a function of log hyperparameters.
struct LikelihoodSurface<'a, M: Manifold> {
    kernel: &'a GeometryKernel<M>,
    distances: &'a DMatrix,
    centered: &'a DVector,
}

impl<M: Manifold> LikelihoodSurface<'_, M> {
    /// Value and gradient at `theta`.
    fn evaluate(&self, theta: &[f64; 3]) -> ModelResult<(f64, [f64; 3])> {
        let (hp, noise) = decode(theta);
        let gram = self.kernel.gram_from_distances(self.distances, &hp);
        let factor = cholesky_with_jitter(&gram, noise)?;
        let alpha = factor.cholesky.solve(self.centered);
        let value = log_marginal_likelihood_from(&factor.cholesky, self.centered, &alpha);
        if !value.is_finite() {
            return Err(ModelError::numerical_instability(
                "log marginal likelihood is not finite",
                factor.attempts,
            ));
        }

        let w = &alpha * alpha.transpose() - factor.cholesky.inverse();
        let d_length = self
            .distances
            .map(|d| self.kernel.log_length_scale_derivative(d, &hp));
        let gradient = [
            0.5 * w.dot(&gram),
            0.5 * w.dot(&d_length),
            0.5 * noise * w.trace(),
        ];
        Ok((value, gradient))
    }

    /// Projected gradient ascent from `theta` inside `bounds`.
    fn ascend(
        &self,
        mut theta: [f64; 3],
        bounds: &[(f64, f64); 3],
        config: &HyperparameterSearchConfig,
    ) -> ModelResult<([f64; 3], f64)> {
        let (mut value, mut gradient) = self.evaluate(&theta)?;
        let mut step = config.initial_step;

        for _ in 0..config.max_iterations {
            let mut direction = gradient;
            for (i, d) in direction.iter_mut().enumerate() {
                let (lo, hi) = bounds[i];
                if (theta[i] <= lo && *d < 0.0) || (theta[i] >= hi && *d > 0.0) {
                    *d = 0.0;
                }
            }
            let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
            if norm < config.gradient_tolerance {
                break;
            }

            let mut improved = false;
            while step >= MIN_STEP {
                let mut candidate = theta;
                for i in 0..3 {
                    candidate[i] = (theta[i] + step * direction[i] / norm).clamp(bounds[i].0, bounds[i].1);
                }
                let expected: f64 = (0..3).map(|i| gradient[i] * (candidate[i] - theta[i])).sum();
                match self.evaluate(&candidate) {
                    Ok((v, g)) if v >= value + ARMIJO * expected => {
                        theta = candidate;
                        value = v;
                        gradient = g;
                        step = (2.0 * step).min(MAX_STEP);
                        improved = true;
                        break;
                    }
                    _ => step *= 0.5,
                }
            }
            if !improved {
                break;
            }
        }
        Ok((theta, value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::KernelFamily;
    use approx::assert_relative_eq;
    use gabo_core::test_manifolds::Flat;

    fn flat_problem() -> (GeometryKernel<Flat>, Vec<DVector>, DVector) {
        let kernel = GeometryKernel::new(Flat::new(1), KernelFamily::Gaussian, 1).unwrap();
        let xs = [-2.0, -1.3, -0.4, 0.2, 0.9, 1.7, 2.5];
        let points: Vec<DVector> = xs.iter().map(|&x| DVector::from_vec(vec![x])).collect();
        let values = DVector::from_iterator(xs.len(), xs.iter().map(|x| (1.3 * x).sin()));
        let centered = values.add_scalar(-values.mean());
        (kernel, points, centered)
    }

    #[test]
    fn test_gradient_matches_finite_differences() {
        let (kernel, points, centered) = flat_problem();
        let refs: Vec<&DVector> = points.iter().collect();
        let distances = kernel.distance_matrix(&refs).unwrap();
        let surface = LikelihoodSurface {
            kernel: &kernel,
            distances: &distances,
            centered: &centered,
        };
        let theta = [0.3f64.ln(), 0.8f64.ln(), 0.05f64.ln()];
        let (_, gradient) = surface.evaluate(&theta).unwrap();
        let h = 1e-6;
        for i in 0..3 {
            let mut plus = theta;
            let mut minus = theta;
            plus[i] += h;
            minus[i] -= h;
            let fd = (surface.evaluate(&plus).unwrap().0 - surface.evaluate(&minus).unwrap().0) / (2.0 * h);
            assert_relative_eq!(gradient[i], fd, epsilon = 1e-5, max_relative = 1e-4);
        }
    }

    #[test]
    fn test_search_improves_likelihood_within_bounds() {
        let (kernel, points, centered) = flat_problem();
        let refs: Vec<&DVector> = points.iter().collect();
        let start = KernelHyperparameters::new(5.0, 0.05).unwrap();
        let config = HyperparameterSearchConfig::new().with_num_restarts(8);
        let outcome = search(&kernel, &refs, &centered, start, 1e-2, &config, 9).unwrap();
        assert!(outcome.accepted);
        let hp = outcome.hyperparameters;
        assert!(hp.length_scale >= config.length_scale_bounds.0 * (1.0 - 1e-12));
        assert!(hp.length_scale <= config.length_scale_bounds.1 * (1.0 + 1e-12));
        assert!(hp.length_scale > 0.1);

        let baseline = {
            let distances = kernel.distance_matrix(&refs).unwrap();
            let surface = LikelihoodSurface {
                kernel: &kernel,
                distances: &distances,
                centered: &centered,
            };
            surface.evaluate(&encode(&start, 1e-2)).unwrap().0
        };
        assert!(outcome.log_marginal_likelihood > baseline);
    }

    #[test]
    fn test_fixed_noise_is_kept() {
        let (kernel, points, centered) = flat_problem();
        let refs: Vec<&DVector> = points.iter().collect();
        let config = HyperparameterSearchConfig::new().with_optimize_noise(false);
        let outcome = search(
            &kernel,
            &refs,
            &centered,
            KernelHyperparameters::new(1.0, 0.1).unwrap(),
            1e-3,
            &config,
            4,
        )
        .unwrap();
        assert_relative_eq!(outcome.noise_variance, 1e-3, max_relative = 1e-12);
    }

    #[test]
    fn test_config_validation() {
        assert!(HyperparameterSearchConfig::new().validate().is_ok());
        assert!(HyperparameterSearchConfig::new().with_num_restarts(0).validate().is_err());
        assert!(HyperparameterSearchConfig::new()
            .with_length_scale_bounds(1.0, 0.5)
            .validate()
            .is_err());
        assert!(HyperparameterSearchConfig::new()
            .with_noise_variance_bounds(0.0, 1.0)
            .validate()
            .is_err());
    }
}
