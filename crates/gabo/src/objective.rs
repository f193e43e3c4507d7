//! The black-box function being minimized.

use thiserror::Error;

/// Failure reported by an objective.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ObjectiveError {
    reason: String,
}

impl ObjectiveError {
    /// Creates an error with the given reason.
    pub fn new<S: Into<String>>(reason: S) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// The reason given by the objective.
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// An expensive function on a manifold, evaluated once per BO iteration.
///
/// Closures `FnMut(&P) -> Result<f64, ObjectiveError>` implement this trait.
pub trait Objective<P> {
    /// Evaluates the objective at `point`.
    fn evaluate(&mut self, point: &P) -> Result<f64, ObjectiveError>;
}

impl<P, F> Objective<P> for F
where
    F: FnMut(&P) -> Result<f64, ObjectiveError>,
{
    fn evaluate(&mut self, point: &P) -> Result<f64, ObjectiveError> {
        self(point)
    }
}
