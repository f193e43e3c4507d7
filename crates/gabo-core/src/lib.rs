//! Core traits and types for geometry-aware Bayesian optimization.
//!
//! This crate provides the foundational traits and types shared by the rest
//! of the workspace. It defines the mathematical abstractions needed to work
//! with smooth manifolds and tangent spaces, the cost function interface used
//! by the acquisition optimizer, and the parallel multi-start runner.
//!
//! # Key Concepts
//!
//! - **Manifolds**: Smooth spaces that locally resemble Euclidean space
//! - **Tangent Spaces**: Linear approximations of manifolds at each point
//! - **Exponential and logarithm maps**: Moving along and measuring geodesics
//! - **Retractions**: Cheap smooth maps from tangent spaces back to the manifold
//!
//! # Modules
//!
//! - [`bounds`]: Domain bounds restricting the search region
//! - [`cost_function`]: Cost function interface and finite-difference pullback models
//! - [`error`]: Error types for manifold operations and optimizers
//! - [`manifold`]: Core manifold trait
//! - [`multistart`]: Parallel multi-start runner
//! - [`types`]: Type aliases and numerical constants

pub mod bounds;
pub mod cost_function;
pub mod error;
pub mod manifold;
pub mod multistart;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_manifolds;

// Re-export commonly used items at the crate root
pub use error::{ManifoldError, OptimizerError, OptimizerResult, Result};

/// Prelude module for convenient imports.
///
/// # Example
/// ```
/// use gabo_core::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bounds::DomainBounds;
    pub use crate::cost_function::{CostFunction, FnCost, PullbackModel};
    pub use crate::error::{ManifoldError, OptimizerError, OptimizerResult, Result};
    pub use crate::manifold::{ConfiguredManifold, Manifold, ManifoldKind};
    pub use crate::multistart::{MultiStart, MultiStartReport, Scored};
    pub use crate::types::{constants, DMatrix, DVector};
}
