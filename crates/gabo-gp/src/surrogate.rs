//! Gaussian process surrogate on a manifold.
//!
//! The model is rebuilt from scratch on every [`GaussianProcess::fit`]; the
//! result is an immutable [`FittedModel`] behind an `Arc`, so the acquisition
//! optimizer can read it from several threads while the controller holds on
//! to the previous snapshot until a refit succeeds.

use std::{f64::consts::PI, sync::Arc};

use gabo_core::{
    manifold::Manifold,
    types::{DMatrix, DVector},
};
use nalgebra::{linalg::Cholesky, Dyn};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    dataset::Dataset,
    error::{ModelError, ModelResult},
    hyperparameters::{self, HyperparameterOutcome, HyperparameterSearchConfig},
    kernel::{GeometryKernel, KernelHyperparameters},
};

/// Diagonal jitter of the first retry.
pub const INITIAL_JITTER: f64 = 1e-6;

/// Growth factor of the jitter between retries.
pub const JITTER_GROWTH: f64 = 10.0;

/// Number of jittered retries after the plain factorization.
pub const MAX_JITTER_ATTEMPTS: usize = 5;

/// Prior mean of the process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MeanFunction {
    /// Zero prior mean
    Zero,
    /// Fixed prior mean
    Constant(f64),
    /// Empirical mean of the observed values, recomputed at each fit
    #[default]
    DataMean,
}

impl MeanFunction {
    /// Prior mean for the given observations.
    pub fn value(&self, observations: &DVector) -> f64 {
        match *self {
            Self::Zero => 0.0,
            Self::Constant(c) => c,
            Self::DataMean if observations.is_empty() => 0.0,
            Self::DataMean => observations.mean(),
        }
    }
}

/// Cholesky factor of `K + (σ_n² + jitter) I`.
#[derive(Debug, Clone)]
pub struct JitteredCholesky {
    /// The factorization
    pub cholesky: Cholesky<f64, Dyn>,
    /// Jitter that was added on top of the noise variance
    pub jitter: f64,
    /// Factorizations attempted, the plain one included
    pub attempts: usize,
}

/// Factorizes `gram + noise_variance · I`, adding geometrically growing
/// diagonal jitter when the plain factorization fails.
///
/// The schedule starts at [`INITIAL_JITTER`], grows by [`JITTER_GROWTH`] and
/// stops after [`MAX_JITTER_ATTEMPTS`] retries.
pub fn cholesky_with_jitter(gram: &DMatrix, noise_variance: f64) -> ModelResult<JitteredCholesky> {
    if gram.iter().any(|v| !v.is_finite()) {
        return Err(ModelError::numerical_instability(
            "covariance matrix has non-finite entries",
            0,
        ));
    }
    let mut jitter = 0.0;
    for attempt in 0..=MAX_JITTER_ATTEMPTS {
        let mut k = gram.clone();
        for i in 0..k.nrows() {
            k[(i, i)] += noise_variance + jitter;
        }
        if let Some(cholesky) = Cholesky::new(k) {
            return Ok(JitteredCholesky {
                cholesky,
                jitter,
                attempts: attempt + 1,
            });
        }
        jitter = if attempt == 0 {
            INITIAL_JITTER
        } else {
            jitter * JITTER_GROWTH
        };
    }
    Err(ModelError::numerical_instability(
        format!(
            "covariance matrix is not positive definite with noise {noise_variance:e} and jitter up to {:e}",
            jitter / JITTER_GROWTH
        ),
        MAX_JITTER_ATTEMPTS + 1,
    ))
}

/// `log p(y) = -½ yᵀα - Σ log L_ii - (n/2) log 2π`
pub(crate) fn log_marginal_likelihood_from(
    cholesky: &Cholesky<f64, Dyn>,
    centered: &DVector,
    alpha: &DVector,
) -> f64 {
    let n = centered.len() as f64;
    let log_det_half: f64 = cholesky.l_dirty().diagonal().iter().map(|d| d.ln()).sum();
    -0.5 * centered.dot(alpha) - log_det_half - 0.5 * n * (2.0 * PI).ln()
}

/// Immutable state of a fitted process.
#[derive(Debug, Clone)]
pub struct FittedModel<P> {
    points: Vec<P>,
    prior_mean: f64,
    hyperparameters: KernelHyperparameters,
    noise_variance: f64,
    jitter: f64,
    gram: DMatrix,
    cholesky: Cholesky<f64, Dyn>,
    alpha: DVector,
    log_marginal_likelihood: f64,
}

impl<P> FittedModel<P> {
    /// Training points, in dataset order.
    pub fn points(&self) -> &[P] {
        &self.points
    }

    /// Number of training points.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether the model has no training points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Prior mean used by this fit.
    pub fn prior_mean(&self) -> f64 {
        self.prior_mean
    }

    /// Kernel hyperparameters used by this fit.
    pub fn hyperparameters(&self) -> &KernelHyperparameters {
        &self.hyperparameters
    }

    /// Observation noise variance used by this fit.
    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// Diagonal jitter the factorization needed.
    pub fn jitter(&self) -> f64 {
        self.jitter
    }

    /// Noise-free Gram matrix of the training points.
    pub fn gram(&self) -> &DMatrix {
        &self.gram
    }

    /// Log marginal likelihood of the training values.
    pub fn log_marginal_likelihood(&self) -> f64 {
        self.log_marginal_likelihood
    }
}

/// Gaussian process with a geometry-aware kernel.
#[derive(Debug, Clone)]
pub struct GaussianProcess<M: Manifold> {
    kernel: GeometryKernel<M>,
    hyperparameters: KernelHyperparameters,
    noise_variance: f64,
    mean_function: MeanFunction,
    fitted: Option<Arc<FittedModel<M::Point>>>,
}

impl<M: Manifold> GaussianProcess<M> {
    /// Creates an unfitted process.
    ///
    /// The hyperparameters must pass the kernel's calibration check.
    pub fn new(
        kernel: GeometryKernel<M>,
        hyperparameters: KernelHyperparameters,
        noise_variance: f64,
    ) -> ModelResult<Self> {
        check_noise(noise_variance)?;
        kernel.check(&hyperparameters)?;
        Ok(Self {
            kernel,
            hyperparameters,
            noise_variance,
            mean_function: MeanFunction::default(),
            fitted: None,
        })
    }

    /// Sets the prior mean.
    pub fn with_mean_function(mut self, mean_function: MeanFunction) -> Self {
        self.mean_function = mean_function;
        self
    }

    /// The covariance function.
    pub fn kernel(&self) -> &GeometryKernel<M> {
        &self.kernel
    }

    /// Currently accepted hyperparameters.
    pub fn hyperparameters(&self) -> &KernelHyperparameters {
        &self.hyperparameters
    }

    /// Currently accepted noise variance.
    pub fn noise_variance(&self) -> f64 {
        self.noise_variance
    }

    /// The prior mean.
    pub fn mean_function(&self) -> MeanFunction {
        self.mean_function
    }

    /// Replaces the hyperparameters after checking them. The next [`fit`]
    /// uses them; the current snapshot is left as is.
    ///
    /// [`fit`]: Self::fit
    pub fn set_hyperparameters(
        &mut self,
        hyperparameters: KernelHyperparameters,
        noise_variance: f64,
    ) -> ModelResult<()> {
        check_noise(noise_variance)?;
        self.kernel.check(&hyperparameters)?;
        self.hyperparameters = hyperparameters;
        self.noise_variance = noise_variance;
        Ok(())
    }

    /// The current snapshot, if the process has been fitted.
    pub fn snapshot(&self) -> Option<Arc<FittedModel<M::Point>>> {
        self.fitted.clone()
    }

    /// Whether a snapshot is available.
    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Refits the process to `dataset`.
    ///
    /// On error the previous snapshot is kept.
    pub fn fit(&mut self, dataset: &Dataset<M::Point>) -> ModelResult<()> {
        let snapshot = self.build(dataset, &self.hyperparameters, self.noise_variance)?;
        self.fitted = Some(Arc::new(snapshot));
        Ok(())
    }

    /// Posterior mean and variance of the latent function at `point`.
    pub fn posterior(&self, point: &M::Point) -> ModelResult<(f64, f64)> {
        let fitted = self.fitted.as_deref().ok_or(ModelError::NotFitted)?;
        let hp = &fitted.hyperparameters;
        let k_star = fitted
            .points
            .iter()
            .map(|x| self.kernel.covariance(point, x, hp))
            .collect::<ModelResult<Vec<f64>>>()?;
        let k_star = DVector::from_vec(k_star);

        let mean = fitted.prior_mean + k_star.dot(&fitted.alpha);
        let v = fitted
            .cholesky
            .l_dirty()
            .solve_lower_triangular(&k_star)
            .ok_or_else(|| ModelError::numerical_instability("singular Cholesky factor", 1))?;
        let prior_variance = self.kernel.covariance_from_distance(0.0, hp);
        let variance = (prior_variance - v.norm_squared()).max(0.0);
        Ok((mean, variance))
    }

    /// Log marginal likelihood of the current snapshot.
    pub fn log_marginal_likelihood(&self) -> ModelResult<f64> {
        self.fitted
            .as_deref()
            .map(FittedModel::log_marginal_likelihood)
            .ok_or(ModelError::NotFitted)
    }

    /// Re-estimates the hyperparameters by maximizing the log marginal
    /// likelihood of `dataset`, then refits.
    ///
    /// Candidates that fail the kernel's positive semi-definiteness check are
    /// rejected. When no candidate improves on the current hyperparameters
    /// they are kept and the snapshot is left untouched.
    pub fn optimize_hyperparameters<R: Rng + ?Sized>(
        &mut self,
        dataset: &Dataset<M::Point>,
        config: &HyperparameterSearchConfig,
        rng: &mut R,
    ) -> ModelResult<HyperparameterOutcome> {
        if dataset.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        config.validate()?;
        let points: Vec<&M::Point> = dataset.points().collect();
        let values = DVector::from_iterator(dataset.len(), dataset.values());
        let centered = values.add_scalar(-self.mean_function.value(&values));

        let mut outcome = hyperparameters::search(
            &self.kernel,
            &points,
            &centered,
            self.hyperparameters,
            self.noise_variance,
            config,
            rng.gen(),
        )?;
        if !outcome.accepted {
            return Ok(outcome);
        }

        match self.build(dataset, &outcome.hyperparameters, outcome.noise_variance) {
            Ok(snapshot) => {
                self.hyperparameters = outcome.hyperparameters;
                self.noise_variance = outcome.noise_variance;
                self.fitted = Some(Arc::new(snapshot));
            }
            Err(err) => {
                tracing::warn!(error = %err, "refit with new hyperparameters failed, keeping previous");
                outcome.accepted = false;
                outcome.hyperparameters = self.hyperparameters;
                outcome.noise_variance = self.noise_variance;
            }
        }
        Ok(outcome)
    }

    fn build(
        &self,
        dataset: &Dataset<M::Point>,
        hp: &KernelHyperparameters,
        noise_variance: f64,
    ) -> ModelResult<FittedModel<M::Point>> {
        if dataset.is_empty() {
            return Err(ModelError::EmptyDataset);
        }
        let points: Vec<M::Point> = dataset.points().cloned().collect();
        let refs: Vec<&M::Point> = points.iter().collect();
        let distances = self.kernel.distance_matrix(&refs)?;
        let gram = self.kernel.gram_from_distances(&distances, hp);

        let values = DVector::from_iterator(points.len(), dataset.values());
        let prior_mean = self.mean_function.value(&values);
        let centered = values.add_scalar(-prior_mean);

        let factor = cholesky_with_jitter(&gram, noise_variance)?;
        if factor.attempts > 1 {
            tracing::warn!(
                jitter = factor.jitter,
                attempts = factor.attempts,
                points = points.len(),
                "covariance matrix needed diagonal jitter"
            );
        }
        let alpha = factor.cholesky.solve(&centered);
        let log_marginal_likelihood =
            log_marginal_likelihood_from(&factor.cholesky, &centered, &alpha);

        Ok(FittedModel {
            points,
            prior_mean,
            hyperparameters: *hp,
            noise_variance,
            jitter: factor.jitter,
            gram,
            cholesky: factor.cholesky,
            alpha,
            log_marginal_likelihood,
        })
    }
}

fn check_noise(noise_variance: f64) -> ModelResult<()> {
    if noise_variance.is_finite() && noise_variance >= 0.0 {
        Ok(())
    } else {
        Err(ModelError::invalid_hyperparameter(format!(
            "noise variance must be non-negative, got {noise_variance}"
        )))
    }
}
