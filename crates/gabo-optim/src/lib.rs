//! GaBO Optimization - Acquisition optimization on Riemannian manifolds.
//!
//! This crate provides the second-order optimizer used to maximize acquisition
//! functions over a manifold: a Riemannian trust-region method with a Steihaug
//! truncated-CG subproblem solver, run from several restarts in parallel.
//!
//! # Examples
//!
//! ```rust
//! use gabo_optim::{ManifoldOptimizer, ManifoldOptimizerConfig, TrustRegionConfig};
//!
//! let optimizer = ManifoldOptimizer::new(
//!     ManifoldOptimizerConfig::new()
//!         .with_num_restarts(4)
//!         .with_trust_region(TrustRegionConfig::new().with_max_iterations(30)),
//! );
//! assert_eq!(optimizer.config().num_restarts, 4);
//!
//! // let best = optimizer.minimize(&manifold, &cost_fn, bounds, &anchors, seed)?;
//! ```

pub mod manifold_optimizer;
pub mod trust_region;

// Re-export main optimizers for convenience
pub use manifold_optimizer::{ManifoldOptimizer, ManifoldOptimizerConfig, OptimizedPoint};
pub use trust_region::{
    RestartContext, RestartStatus, TerminationReason, TrustRegion, TrustRegionConfig,
};
