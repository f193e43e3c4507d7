//! Geometry-aware Gaussian process surrogates.
//!
//! This crate provides the statistical half of geometry-aware Bayesian
//! optimization:
//!
//! - [`kernel`]: covariance functions of the geodesic distance, with a
//!   positive semi-definiteness gate on calibration points
//! - [`dataset`]: the append-only record of evaluated points
//! - [`surrogate`]: the Gaussian process, refit from scratch on every change
//! - [`hyperparameters`]: maximum-likelihood estimation of the kernel
//!   hyperparameters
//! - [`acquisition`]: expected improvement and friends, plus their adaptor to
//!   the optimizer's cost function interface
//!
//! # Example
//!
//! ```rust,no_run
//! use gabo_gp::prelude::*;
//! use gabo_manifolds::Sphere;
//! use nalgebra::DVector;
//!
//! let sphere = Sphere::new(3)?;
//! let kernel = GeometryKernel::new(sphere, KernelFamily::Laplace, 0)?;
//! let mut gp = GaussianProcess::new(kernel, KernelHyperparameters::default(), 1e-6)?;
//!
//! let mut data = Dataset::new();
//! data.push(DVector::from_vec(vec![0.0, 0.0, 1.0]), 1.0)?;
//! data.push(DVector::from_vec(vec![1.0, 0.0, 0.0]), 0.0)?;
//! gp.fit(&data)?;
//!
//! let (mean, variance) = gp.posterior(&DVector::from_vec(vec![0.0, 1.0, 0.0]))?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod acquisition;
pub mod dataset;
pub mod error;
pub mod hyperparameters;
pub mod kernel;
pub mod surrogate;

pub use acquisition::{
    AcquisitionCost, AcquisitionFunction, AcquisitionKind, ExpectedImprovement,
    LowerConfidenceBound, ProbabilityOfImprovement,
};
pub use dataset::{Dataset, Observation};
pub use error::{ModelError, ModelResult};
pub use hyperparameters::{HyperparameterOutcome, HyperparameterSearchConfig};
pub use kernel::{GeometryKernel, KernelFamily, KernelHyperparameters};
pub use surrogate::{FittedModel, GaussianProcess, MeanFunction};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::acquisition::{AcquisitionCost, AcquisitionFunction, AcquisitionKind};
    pub use crate::dataset::{Dataset, Observation};
    pub use crate::error::{ModelError, ModelResult};
    pub use crate::hyperparameters::{HyperparameterOutcome, HyperparameterSearchConfig};
    pub use crate::kernel::{GeometryKernel, KernelFamily, KernelHyperparameters};
    pub use crate::surrogate::{GaussianProcess, MeanFunction};
}
