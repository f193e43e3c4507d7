//! Core manifold trait.
//!
//! This module defines the `Manifold` trait that the search spaces of the
//! Bayesian optimization engine implement. A manifold is a topological space
//! that locally resembles Euclidean space and is equipped with a Riemannian
//! metric.
//!
//! # Mathematical Background
//!
//! A Riemannian manifold (M, g) consists of:
//! - A smooth manifold M
//! - A Riemannian metric g that assigns an inner product to each tangent space
//!
//! Key concepts:
//! - **Tangent space**: T_p M is the linear approximation of M at point p
//! - **Exponential map**: exp_p: T_p M → M follows the geodesic with initial velocity v
//! - **Logarithm map**: the local inverse of exp_p, defined within the injectivity radius
//! - **Retraction**: A smooth map R_p: T_p M → M that approximates the exponential map

use std::fmt::Debug;

use rand::Rng;

use crate::{
    bounds::DomainBounds,
    error::{ManifoldError, Result},
    types::DVector,
};

/// Trait for Riemannian manifolds.
///
/// Points and tangent vectors are associated types so that each manifold keeps
/// its natural representation (unit vectors for the sphere, symmetric matrices
/// for SPD). A tangent vector is only meaningful together with its base point,
/// which is why every operation that consumes one also takes that point.
///
/// Tangent spaces are additionally exposed through an orthonormal basis. The
/// trust-region optimizer works in the coordinates of that basis, which turns
/// every tangent space into plain `R^d`.
pub trait Manifold: Debug + Send + Sync {
    /// Representation of a point on the manifold.
    type Point: Clone + Debug + Send + Sync + PartialEq;

    /// Representation of a tangent vector.
    type TangentVector: Clone + Debug + Send + Sync;

    /// Returns a human-readable name for the manifold.
    fn name(&self) -> &str;

    /// Returns the intrinsic dimension of the manifold.
    ///
    /// For example, the sphere S^{n-1} embedded in R^n has dimension n-1.
    fn dimension(&self) -> usize;

    /// Checks if a point lies on the manifold within a given tolerance.
    fn is_point_on_manifold(&self, point: &Self::Point, tol: f64) -> bool;

    /// Checks if a vector is in the tangent space at a given point.
    fn is_vector_in_tangent_space(
        &self,
        point: &Self::Point,
        vector: &Self::TangentVector,
        tol: f64,
    ) -> bool;

    /// Projects an ambient point onto the manifold.
    ///
    /// Used to repair numerical drift after a sequence of operations.
    fn project_point(&self, point: &Self::Point) -> Self::Point;

    /// Projects an ambient vector onto the tangent space at `point`.
    ///
    /// # Errors
    ///
    /// Returns an error if the shapes of `point` and `vector` disagree.
    fn project_tangent(
        &self,
        point: &Self::Point,
        vector: &Self::TangentVector,
    ) -> Result<Self::TangentVector>;

    /// Computes the Riemannian inner product g_point(u, v).
    fn inner_product(
        &self,
        point: &Self::Point,
        u: &Self::TangentVector,
        v: &Self::TangentVector,
    ) -> Result<f64>;

    /// Computes the norm of a tangent vector.
    ///
    /// This is equivalent to sqrt(inner_product(point, v, v)).
    fn norm(&self, point: &Self::Point, vector: &Self::TangentVector) -> Result<f64> {
        self.inner_product(point, vector, vector).map(f64::sqrt)
    }

    /// Follows the geodesic starting at `point` with initial velocity `tangent`.
    fn exp_map(&self, point: &Self::Point, tangent: &Self::TangentVector) -> Result<Self::Point>;

    /// Computes the tangent vector at `point` whose exponential reaches `other`.
    ///
    /// # Errors
    ///
    /// Returns [`ManifoldError::GeometryDomain`] when the logarithm is
    /// undefined, e.g. for antipodal points on the sphere.
    fn log_map(&self, point: &Self::Point, other: &Self::Point) -> Result<Self::TangentVector>;

    /// Performs a retraction from the tangent space to the manifold.
    ///
    /// A retraction at point p is a smooth mapping R_p: T_p M → M such that:
    /// - R_p(0) = p
    /// - dR_p(0) = identity on T_p M
    fn retract(&self, point: &Self::Point, tangent: &Self::TangentVector) -> Result<Self::Point>;

    /// Computes the geodesic distance between two points.
    fn distance(&self, x: &Self::Point, y: &Self::Point) -> Result<f64>;

    /// Generates a random point, restricted to `bounds` when given.
    ///
    /// # Errors
    ///
    /// Returns [`ManifoldError::InvalidParameter`] when the manifold does not
    /// support the kind of bounds it was given.
    fn random_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: Option<&DomainBounds>,
    ) -> Result<Self::Point>;

    /// Returns an orthonormal basis of T_point M in the manifold metric.
    ///
    /// The basis has exactly `self.dimension()` elements.
    fn tangent_basis(&self, point: &Self::Point) -> Result<Vec<Self::TangentVector>>;

    /// Builds the tangent vector with the given coordinates in `tangent_basis(point)`.
    fn tangent_from_coordinates(
        &self,
        point: &Self::Point,
        coordinates: &DVector,
    ) -> Result<Self::TangentVector>;

    /// Returns the coordinates of `vector` in `tangent_basis(point)`.
    fn tangent_coordinates(
        &self,
        point: &Self::Point,
        vector: &Self::TangentVector,
    ) -> Result<DVector>;

    /// Returns true when `point` lies inside `bounds`.
    fn in_domain(&self, point: &Self::Point, bounds: &DomainBounds) -> Result<bool>;

    /// Maps `point` to a nearby point inside `bounds` that stays on the manifold.
    fn project_to_domain(&self, point: &Self::Point, bounds: &DomainBounds)
        -> Result<Self::Point>;

    /// Returns true when `point` is feasible for the optional bounds.
    fn is_feasible(&self, point: &Self::Point, bounds: Option<&DomainBounds>) -> Result<bool> {
        match bounds {
            Some(bounds) => self.in_domain(point, bounds),
            None => Ok(true),
        }
    }

    /// Returns the zero tangent vector at `point`.
    fn zero_tangent(&self, point: &Self::Point) -> Result<Self::TangentVector> {
        self.tangent_from_coordinates(point, &DVector::zeros(self.dimension()))
    }
}

/// Manifolds that can be selected by kind and dimension at configuration time.
pub trait ConfiguredManifold: Manifold + Sized {
    /// The kind this manifold answers to in configuration files.
    const KIND: ManifoldKind;

    /// Builds the manifold from the size parameter stored in a configuration.
    ///
    /// For the sphere this is the ambient dimension n of S^{n-1}, for SPD the
    /// matrix size n.
    fn with_dimension(dimension: usize) -> Result<Self>;
}

/// Manifold kinds understood by the configuration layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ManifoldKind {
    /// Unit hypersphere S^{n-1} in R^n
    Sphere,
    /// Symmetric positive-definite n x n matrices
    Spd,
}

impl std::fmt::Display for ManifoldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sphere => write!(f, "sphere"),
            Self::Spd => write!(f, "spd"),
        }
    }
}

/// Rejects bounds of a kind a manifold does not support.
pub fn unsupported_bounds(manifold: &str, bounds: &DomainBounds) -> ManifoldError {
    ManifoldError::invalid_parameter(format!(
        "{} bounds are not supported on the {manifold} manifold",
        bounds.kind()
    ))
}
