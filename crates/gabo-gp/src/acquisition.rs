//! Acquisition functions for minimization.
//!
//! Scores are "higher is better". [`AcquisitionCost`] turns an acquisition
//! into a cost function for the trust-region optimizer by negating it.

use std::fmt::Debug;

use gabo_core::{cost_function::CostFunction, manifold::Manifold, types::constants::MIN_STD_DEV};
use serde::{Deserialize, Serialize};

use crate::{error::ModelResult, surrogate::GaussianProcess};

/// Standard normal density.
pub fn norm_pdf(x: f64) -> f64 {
    const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;
    INV_SQRT_2PI * (-0.5 * x * x).exp()
}

/// Standard normal distribution function (Hart's approximation, absolute
/// error below 1e-7).
pub fn norm_cdf(x: f64) -> f64 {
    if x < -8.0 {
        return 0.0;
    }
    if x > 8.0 {
        return 1.0;
    }

    let abs_x = x.abs();
    let t = 1.0 / (1.0 + 0.231_641_9 * abs_x);
    let t2 = t * t;
    let t3 = t2 * t;
    let t4 = t3 * t;
    let t5 = t4 * t;

    let poly = 0.319_381_530 * t - 0.356_563_782 * t2 + 1.781_477_937 * t3 - 1.821_255_978 * t4
        + 1.330_274_429 * t5;
    let cdf = 1.0 - norm_pdf(abs_x) * poly;

    if x >= 0.0 {
        cdf
    } else {
        1.0 - cdf
    }
}

/// Utility of evaluating the objective at a candidate.
pub trait AcquisitionFunction: Debug + Send + Sync {
    /// Name of the acquisition.
    fn name(&self) -> &'static str;

    /// Score from the posterior mean and variance at a candidate and the
    /// best value observed so far.
    fn score_from_posterior(&self, mean: f64, variance: f64, incumbent: f64) -> f64;

    /// Score of `candidate` under `model`.
    fn score<M: Manifold>(
        &self,
        model: &GaussianProcess<M>,
        candidate: &M::Point,
        incumbent: f64,
    ) -> ModelResult<f64>
    where
        Self: Sized,
    {
        let (mean, variance) = model.posterior(candidate)?;
        Ok(self.score_from_posterior(mean, variance, incumbent))
    }
}

/// Expected improvement below the incumbent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpectedImprovement;

impl AcquisitionFunction for ExpectedImprovement {
    fn name(&self) -> &'static str {
        "expected_improvement"
    }

    fn score_from_posterior(&self, mean: f64, variance: f64, incumbent: f64) -> f64 {
        let std = variance.max(0.0).sqrt();
        if std <= MIN_STD_DEV {
            return 0.0;
        }
        let z = (incumbent - mean) / std;
        ((incumbent - mean) * norm_cdf(z) + std * norm_pdf(z)).max(0.0)
    }
}

/// Probability of improving on the incumbent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbabilityOfImprovement;

impl AcquisitionFunction for ProbabilityOfImprovement {
    fn name(&self) -> &'static str {
        "probability_of_improvement"
    }

    fn score_from_posterior(&self, mean: f64, variance: f64, incumbent: f64) -> f64 {
        let std = variance.max(0.0).sqrt();
        if std <= MIN_STD_DEV {
            return 0.0;
        }
        norm_cdf((incumbent - mean) / std)
    }
}

/// Negated lower confidence bound `-(μ - κσ)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LowerConfidenceBound {
    /// Exploration weight
    pub kappa: f64,
}

impl Default for LowerConfidenceBound {
    fn default() -> Self {
        Self { kappa: 2.0 }
    }
}

impl AcquisitionFunction for LowerConfidenceBound {
    fn name(&self) -> &'static str {
        "lower_confidence_bound"
    }

    fn score_from_posterior(&self, mean: f64, variance: f64, _incumbent: f64) -> f64 {
        -(mean - self.kappa * variance.max(0.0).sqrt())
    }
}

/// Acquisition selected by configuration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AcquisitionKind {
    /// See [`ExpectedImprovement`]
    #[default]
    ExpectedImprovement,
    /// See [`ProbabilityOfImprovement`]
    ProbabilityOfImprovement,
    /// See [`LowerConfidenceBound`]
    LowerConfidenceBound {
        /// Exploration weight
        kappa: f64,
    },
}

impl AcquisitionFunction for AcquisitionKind {
    fn name(&self) -> &'static str {
        match self {
            Self::ExpectedImprovement => ExpectedImprovement.name(),
            Self::ProbabilityOfImprovement => ProbabilityOfImprovement.name(),
            Self::LowerConfidenceBound { kappa } => LowerConfidenceBound { kappa: *kappa }.name(),
        }
    }

    fn score_from_posterior(&self, mean: f64, variance: f64, incumbent: f64) -> f64 {
        match *self {
            Self::ExpectedImprovement => {
                ExpectedImprovement.score_from_posterior(mean, variance, incumbent)
            }
            Self::ProbabilityOfImprovement => {
                ProbabilityOfImprovement.score_from_posterior(mean, variance, incumbent)
            }
            Self::LowerConfidenceBound { kappa } => {
                LowerConfidenceBound { kappa }.score_from_posterior(mean, variance, incumbent)
            }
        }
    }
}

/// Negated acquisition as a cost function on the manifold.
pub struct AcquisitionCost<'a, M: Manifold, A> {
    acquisition: &'a A,
    model: &'a GaussianProcess<M>,
    incumbent: f64,
}

impl<'a, M: Manifold, A: AcquisitionFunction> AcquisitionCost<'a, M, A> {
    /// Wraps `acquisition` under `model` with the given incumbent value.
    pub fn new(acquisition: &'a A, model: &'a GaussianProcess<M>, incumbent: f64) -> Self {
        Self {
            acquisition,
            model,
            incumbent,
        }
    }

    /// The incumbent value used for scoring.
    pub fn incumbent(&self) -> f64 {
        self.incumbent
    }
}

impl<M: Manifold, A: AcquisitionFunction> Debug for AcquisitionCost<'_, M, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcquisitionCost")
            .field("acquisition", &self.acquisition.name())
            .field("incumbent", &self.incumbent)
            .finish_non_exhaustive()
    }
}

impl<M: Manifold, A: AcquisitionFunction> CostFunction<M> for AcquisitionCost<'_, M, A> {
    fn cost(&self, point: &M::Point) -> gabo_core::Result<f64> {
        self.acquisition
            .score(self.model, point, self.incumbent)
            .map(|score| -score)
            .map_err(|err| err.into_manifold_error())
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn improvement_scores_are_bounded(
            mean in -10.0f64..10.0,
            variance in 1e-6f64..25.0,
            incumbent in -10.0f64..10.0,
        ) {
            let ei = ExpectedImprovement.score_from_posterior(mean, variance, incumbent);
            prop_assert!(ei >= 0.0);
            // Jensen: EI is at least the improvement of the mean
            prop_assert!(ei >= (incumbent - mean).max(0.0) - 1e-6 * (1.0 + (incumbent - mean).abs()));

            let pi = ProbabilityOfImprovement.score_from_posterior(mean, variance, incumbent);
            prop_assert!((0.0..=1.0).contains(&pi));
        }
    }
}
