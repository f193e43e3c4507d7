//! Domain bounds restricting the search to a region of a manifold.

use serde::{Deserialize, Serialize};

use crate::error::{ManifoldError, Result};

/// A region of the manifold the search is restricted to.
///
/// Box bounds act on the ambient coordinates of vector-valued points (sphere),
/// eigenvalue bounds act on the spectrum of matrix-valued points (SPD).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainBounds {
    /// Per-coordinate lower and upper bounds.
    Box {
        /// Lower bound for each ambient coordinate
        lower: Vec<f64>,
        /// Upper bound for each ambient coordinate
        upper: Vec<f64>,
    },
    /// Bounds on every eigenvalue of a symmetric matrix.
    Eigenvalue {
        /// Smallest admissible eigenvalue (must be positive)
        min: f64,
        /// Largest admissible eigenvalue
        max: f64,
    },
}

impl DomainBounds {
    /// Creates box bounds, checking that `lower <= upper` coordinate-wise.
    pub fn new_box(lower: Vec<f64>, upper: Vec<f64>) -> Result<Self> {
        let bounds = Self::Box { lower, upper };
        bounds.check()?;
        Ok(bounds)
    }

    /// Creates eigenvalue bounds, checking `0 < min <= max`.
    pub fn new_eigenvalue(min: f64, max: f64) -> Result<Self> {
        let bounds = Self::Eigenvalue { min, max };
        bounds.check()?;
        Ok(bounds)
    }

    /// Checks internal consistency of the bounds.
    pub fn check(&self) -> Result<()> {
        match self {
            Self::Box { lower, upper } => {
                if lower.len() != upper.len() {
                    return Err(ManifoldError::dimension_mismatch(lower.len(), upper.len()));
                }
                if lower
                    .iter()
                    .zip(upper)
                    .any(|(lo, hi)| !lo.is_finite() || !hi.is_finite() || lo > hi)
                {
                    return Err(ManifoldError::invalid_parameter(
                        "box bounds require finite lower <= upper",
                    ));
                }
                Ok(())
            }
            Self::Eigenvalue { min, max } => {
                if !(min.is_finite() && max.is_finite() && *min > 0.0 && min <= max) {
                    return Err(ManifoldError::invalid_parameter(format!(
                        "eigenvalue bounds require 0 < min <= max, got [{min}, {max}]"
                    )));
                }
                Ok(())
            }
        }
    }

    /// Short name of the bound kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Box { .. } => "box",
            Self::Eigenvalue { .. } => "eigenvalue",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_box_validation() {
        assert!(DomainBounds::new_box(vec![-1.0, 0.0], vec![1.0, 1.0]).is_ok());
        assert!(DomainBounds::new_box(vec![1.0], vec![0.0]).is_err());
        assert!(DomainBounds::new_box(vec![0.0], vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_eigenvalue_validation() {
        assert!(DomainBounds::new_eigenvalue(0.001, 5.0).is_ok());
        assert!(DomainBounds::new_eigenvalue(0.0, 5.0).is_err());
        assert!(DomainBounds::new_eigenvalue(3.0, 2.0).is_err());
    }

    #[test]
    fn test_serde_tagging() {
        let bounds = DomainBounds::new_eigenvalue(0.1, 5.0).unwrap();
        let json = serde_json::to_string(&bounds).unwrap();
        assert!(json.contains("\"kind\":\"eigenvalue\""));
        let back: DomainBounds = serde_json::from_str(&json).unwrap();
        assert_eq!(back, bounds);
    }
}
