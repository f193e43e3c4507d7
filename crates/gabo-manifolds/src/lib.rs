//! GaBO Manifolds - Concrete search spaces for geometry-aware Bayesian optimization.
//!
//! This crate provides the unit hypersphere and the cone of symmetric positive
//! definite matrices, both implementing [`gabo_core::manifold::Manifold`].

pub mod sphere;
pub mod spd;
pub mod utils;

// Re-export main manifolds for convenience
pub use sphere::Sphere;
pub use spd::Spd;
