//! Error types for surrogate modelling.

use gabo_core::ManifoldError;
use thiserror::Error;

/// Errors raised while fitting or querying a surrogate model.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// The covariance matrix could not be factorized even after jitter.
    #[error("Numerical instability after {attempts} factorization attempts: {reason}")]
    NumericalInstability {
        /// Description of the failure
        reason: String,
        /// Number of factorization attempts made
        attempts: usize,
    },

    /// Hyperparameters are out of range or give an invalid covariance.
    #[error("Invalid kernel hyperparameters: {reason}")]
    InvalidHyperparameter {
        /// Description of why the hyperparameters were rejected
        reason: String,
    },

    /// An observation cannot be recorded.
    #[error("Invalid observation: {reason}")]
    InvalidObservation {
        /// Description of the rejected observation
        reason: String,
    },

    /// The model was queried before a successful fit.
    #[error("Surrogate model has not been fitted")]
    NotFitted,

    /// A fit was requested on a dataset without observations.
    #[error("Cannot fit a surrogate model to an empty dataset")]
    EmptyDataset,

    /// Propagated manifold error.
    #[error("Manifold operation failed: {0}")]
    Manifold(#[from] ManifoldError),
}

impl ModelError {
    /// Create a NumericalInstability error.
    pub fn numerical_instability<S: Into<String>>(reason: S, attempts: usize) -> Self {
        Self::NumericalInstability {
            reason: reason.into(),
            attempts,
        }
    }

    /// Create an InvalidHyperparameter error.
    pub fn invalid_hyperparameter<S: Into<String>>(reason: S) -> Self {
        Self::InvalidHyperparameter {
            reason: reason.into(),
        }
    }

    /// Converts the error into a [`ManifoldError`] so it can cross a
    /// [`CostFunction`](gabo_core::cost_function::CostFunction) boundary.
    pub fn into_manifold_error(self) -> ManifoldError {
        match self {
            Self::Manifold(err) => err,
            other => ManifoldError::numerical_error(other.to_string()),
        }
    }
}

/// Result type alias for surrogate operations.
pub type ModelResult<T> = std::result::Result<T, ModelError>;
