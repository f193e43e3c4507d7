//! Error type of the Bayesian optimization loop.

use gabo_core::{ManifoldError, OptimizerError};
use gabo_gp::ModelError;
use thiserror::Error;

/// Errors surfaced by [`BoController`](crate::controller::BoController).
#[derive(Debug, Error)]
pub enum BoError {
    /// The objective failed or returned a non-finite value.
    #[error("Objective evaluation failed at iteration {iteration}: {reason}")]
    ObjectiveEvaluation {
        /// BO iteration of the failed evaluation, 0 for the initial design
        iteration: usize,
        /// Failure reported by the objective
        reason: String,
    },

    /// The configuration is inconsistent.
    #[error("Invalid configuration: {reason}")]
    InvalidConfiguration {
        /// Description of the configuration error
        reason: String,
    },

    /// Surrogate fitting or prediction failed.
    #[error("Surrogate model failed: {0}")]
    Model(#[from] ModelError),

    /// Acquisition optimization failed.
    #[error("Acquisition optimization failed: {0}")]
    Optimizer(#[from] OptimizerError),

    /// Propagated manifold error.
    #[error("Manifold operation failed: {0}")]
    Manifold(#[from] ManifoldError),

    /// The configuration could not be (de)serialized.
    #[error("Configuration could not be parsed: {0}")]
    Config(#[from] serde_json::Error),
}

impl BoError {
    /// Create an InvalidConfiguration error.
    pub fn invalid_configuration<S: Into<String>>(reason: S) -> Self {
        Self::InvalidConfiguration {
            reason: reason.into(),
        }
    }

    /// Create an ObjectiveEvaluation error.
    pub fn objective_evaluation<S: Into<String>>(iteration: usize, reason: S) -> Self {
        Self::ObjectiveEvaluation {
            iteration,
            reason: reason.into(),
        }
    }
}

/// Result type alias for the optimization loop.
pub type Result<T> = std::result::Result<T, BoError>;
