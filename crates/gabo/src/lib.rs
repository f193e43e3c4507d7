//! Geometry-aware Bayesian optimization.
//!
//! `gabo` minimizes expensive black-box functions whose inputs live on a
//! Riemannian manifold: unit vectors on the sphere or symmetric positive
//! definite matrices. The surrogate is a Gaussian process whose kernel is a
//! function of the geodesic distance, and the acquisition function is
//! maximized with a Riemannian trust-region method, so every candidate stays
//! on the manifold.
//!
//! The pieces live in the member crates and are re-exported here:
//!
//! - [`gabo_core`]: the manifold abstraction, domain bounds and multi-start
//! - [`gabo_manifolds`]: the sphere and SPD geometries
//! - [`gabo_optim`]: the trust-region acquisition optimizer
//! - [`gabo_gp`]: kernels, the Gaussian process and acquisition functions
//!
//! This crate adds the [`BoController`] driving the loop.
//!
//! # Example
//!
//! ```rust,no_run
//! use gabo::prelude::*;
//!
//! let config = BoConfig::new(ManifoldKind::Sphere, 3)
//!     .with_initial_design(4)
//!     .with_iteration_budget(10)
//!     .with_seed(7);
//!
//! let target = DVector::from_vec(vec![0.0, 0.0, 1.0]);
//! let objective = |x: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(1.0 - x.dot(&target)) };
//!
//! let mut controller = BoController::<Sphere, _>::new(config, objective)?;
//! let result = controller.run()?;
//! println!("best value {:?} at {:?}", result.best_value(), result.best_point());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod controller;
pub mod error;
pub mod objective;
pub mod result;

pub use gabo_core;
pub use gabo_gp;
pub use gabo_manifolds;
pub use gabo_optim;
pub use nalgebra;

pub use config::BoConfig;
pub use controller::BoController;
pub use error::{BoError, Result};
pub use objective::{Objective, ObjectiveError};
pub use result::{BoResult, IterationRecord, RunFailure};

/// Common imports for running an optimization.
pub mod prelude {
    pub use crate::config::BoConfig;
    pub use crate::controller::BoController;
    pub use crate::error::BoError;
    pub use crate::objective::{Objective, ObjectiveError};
    pub use crate::result::{BoResult, IterationRecord, RunFailure};

    pub use gabo_core::bounds::DomainBounds;
    pub use gabo_core::manifold::{Manifold, ManifoldKind};
    pub use gabo_core::types::{DMatrix, DVector};
    pub use gabo_gp::{AcquisitionKind, KernelFamily, KernelHyperparameters, MeanFunction};
    pub use gabo_manifolds::{Spd, Sphere};
    pub use gabo_optim::TrustRegionConfig;
}
