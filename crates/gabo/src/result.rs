//! Outcome of a Bayesian optimization run.

use gabo_gp::{KernelHyperparameters, Observation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::BoError;

/// Diagnostics of one BO iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// Iteration number, starting at 1
    pub iteration: usize,
    /// Objective value at the new point
    pub value: f64,
    /// Best value observed so far, the new one included
    pub best_value: f64,
    /// Length of `log_{x_prev}(x_new)`, the geodesic step from the previous observation
    pub displacement: f64,
    /// Acquisition score of the new point
    pub acquisition_value: f64,
    /// Whether the optimizer's candidate had to be resampled
    pub resampled: bool,
    /// Whether the kernel hyperparameters changed this iteration
    pub hyperparameters_updated: bool,
}

/// Everything a run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoResult<P> {
    /// Evaluated points in evaluation order, initial design first
    pub observations: Vec<Observation<P>>,
    /// Best observation, absent only if nothing was evaluated
    pub best: Option<Observation<P>>,
    /// Number of initial design points among `observations`
    pub num_initial: usize,
    /// Kernel hyperparameters at the end of the run
    pub hyperparameters: KernelHyperparameters,
    /// Noise variance at the end of the run
    pub noise_variance: f64,
    /// One record per completed BO iteration
    pub iterations: Vec<IterationRecord>,
}

impl<P> BoResult<P> {
    /// The best point found.
    pub fn best_point(&self) -> Option<&P> {
        self.best.as_ref().map(|o| &o.point)
    }

    /// The lowest observed value.
    pub fn best_value(&self) -> Option<f64> {
        self.best.as_ref().map(|o| o.value)
    }

    /// Number of objective evaluations.
    pub fn num_evaluations(&self) -> usize {
        self.observations.len()
    }
}

/// A run that stopped on an error, with everything gathered before it.
#[derive(Debug, Error)]
#[error("run stopped after {} evaluations: {}", .partial.observations.len(), .error)]
pub struct RunFailure<P: std::fmt::Debug> {
    /// What stopped the run
    #[source]
    pub error: BoError,
    /// Result accumulated up to the failure
    pub partial: BoResult<P>,
}
