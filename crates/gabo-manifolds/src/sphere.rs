//! Sphere manifold S^{n-1} = {x in R^n : ||x|| = 1}
//!
//! The unit sphere is the search space for direction-valued parameters:
//! - Unit quaternions for orientations (S^3)
//! - Normalized feature or weight vectors
//! - Directions of forces or stiffness axes in robotics

use gabo_core::{
    bounds::DomainBounds,
    error::{ManifoldError, Result},
    manifold::{unsupported_bounds, ConfiguredManifold, Manifold, ManifoldKind},
    types::{constants::MANIFOLD_TOLERANCE, DVector},
};
use rand::Rng;
use rand_distr::StandardNormal;

/// Rejection sampling attempts for box-bounded random points.
const MAX_REJECTION_ATTEMPTS: usize = 1000;

/// Alternating projections used to reach the intersection of a box and the sphere.
const MAX_DOMAIN_PROJECTIONS: usize = 200;

/// The unit sphere S^{n-1} in R^n.
///
/// This manifold represents all unit vectors in n-dimensional Euclidean space.
/// Points on the sphere satisfy ||x|| = 1, and the tangent space at x consists
/// of all vectors orthogonal to x.
///
/// # Mathematical Properties
///
/// - **Dimension**: n-1 (for sphere in R^n)
/// - **Tangent space**: T_x S^{n-1} = {v in R^n : x^T v = 0}
/// - **Riemannian metric**: Inherited from Euclidean space (canonical metric)
/// - **Exponential map**: exp_x(v) = cos(||v||) x + sin(||v||) v/||v||
/// - **Logarithmic map**: log_x(y) = θ (y - cos(θ)x) / sin(θ), θ = arccos(x^T y)
/// - **Retraction**: R_x(v) = (x + v) / ||x + v||
///
/// The logarithm is undefined at the antipode of x, where every great circle
/// through x is a minimizing geodesic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sphere {
    /// Ambient dimension (n)
    ambient_dim: usize,
}

impl Sphere {
    /// Creates a new sphere S^{n-1} embedded in R^n.
    ///
    /// # Errors
    /// Returns an error if `ambient_dim` < 2
    pub fn new(ambient_dim: usize) -> Result<Self> {
        if ambient_dim < 2 {
            return Err(ManifoldError::invalid_parameter(
                "Sphere requires ambient dimension >= 2",
            ));
        }
        Ok(Self { ambient_dim })
    }

    /// Returns the ambient dimension (n)
    pub fn ambient_dimension(&self) -> usize {
        self.ambient_dim
    }

    fn check_len(&self, v: &DVector) -> Result<()> {
        if v.len() == self.ambient_dim {
            Ok(())
        } else {
            Err(ManifoldError::dimension_mismatch(self.ambient_dim, v.len()))
        }
    }

    fn check_box<'a>(&self, bounds: &'a DomainBounds) -> Result<(&'a [f64], &'a [f64])> {
        match bounds {
            DomainBounds::Box { lower, upper } => {
                if lower.len() != self.ambient_dim || upper.len() != self.ambient_dim {
                    return Err(ManifoldError::dimension_mismatch(
                        self.ambient_dim,
                        lower.len().max(upper.len()),
                    ));
                }
                Ok((lower.as_slice(), upper.as_slice()))
            }
            other => Err(unsupported_bounds(self.name(), other)),
        }
    }

    fn gaussian_direction<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector {
        loop {
            let v = DVector::from_fn(self.ambient_dim, |_, _| rng.sample::<f64, _>(StandardNormal));
            if v.norm() > f64::EPSILON {
                return v;
            }
        }
    }
}

impl Manifold for Sphere {
    type Point = DVector;
    type TangentVector = DVector;

    fn name(&self) -> &str {
        "Sphere"
    }

    fn dimension(&self) -> usize {
        self.ambient_dim - 1
    }

    fn is_point_on_manifold(&self, point: &DVector, tolerance: f64) -> bool {
        if point.len() != self.ambient_dim {
            return false;
        }
        (point.norm_squared() - 1.0).abs() < tolerance
    }

    fn is_vector_in_tangent_space(&self, point: &DVector, vector: &DVector, tolerance: f64) -> bool {
        if point.len() != self.ambient_dim || vector.len() != self.ambient_dim {
            return false;
        }
        // Check if v ⊥ x: <v, x> = 0
        point.dot(vector).abs() < tolerance
    }

    fn project_point(&self, point: &DVector) -> DVector {
        let norm = point.norm();
        if point.len() != self.ambient_dim || !(norm > f64::EPSILON) || !norm.is_finite() {
            // Degenerate input: fall back to the first standard basis vector
            let mut result = DVector::zeros(self.ambient_dim);
            result[0] = 1.0;
            result
        } else {
            point / norm
        }
    }

    fn project_tangent(&self, point: &DVector, vector: &DVector) -> Result<DVector> {
        self.check_len(point)?;
        self.check_len(vector)?;
        // v - <v,x>x
        Ok(vector - point * point.dot(vector))
    }

    fn inner_product(&self, _point: &DVector, u: &DVector, v: &DVector) -> Result<f64> {
        self.check_len(u)?;
        self.check_len(v)?;
        Ok(u.dot(v))
    }

    fn exp_map(&self, point: &DVector, tangent: &DVector) -> Result<DVector> {
        self.check_len(point)?;
        self.check_len(tangent)?;
        let tangent_norm = tangent.norm();
        if tangent_norm < f64::EPSILON {
            return Ok(point.clone());
        }
        let moved = point * tangent_norm.cos() + tangent * (tangent_norm.sin() / tangent_norm);
        // Renormalize to absorb rounding
        Ok(self.project_point(&moved))
    }

    fn log_map(&self, point: &DVector, other: &DVector) -> Result<DVector> {
        self.check_len(point)?;
        self.check_len(other)?;
        let inner = point.dot(other);
        if inner <= -1.0 + MANIFOLD_TOLERANCE {
            return Err(ManifoldError::geometry_domain(format!(
                "logarithm undefined for antipodal points (<x, y> = {inner})"
            )));
        }

        // θ from atan2 stays accurate for nearby points where acos does not
        let normal_free = other - point * inner;
        let sin_part = normal_free.norm();
        if sin_part < f64::EPSILON {
            return Ok(DVector::zeros(self.ambient_dim));
        }
        let theta = sin_part.atan2(inner);
        let log_vector = normal_free * (theta / sin_part);
        // Remove the normal component left by rounding
        Ok(&log_vector - point * point.dot(&log_vector))
    }

    fn retract(&self, point: &DVector, tangent: &DVector) -> Result<DVector> {
        self.check_len(point)?;
        self.check_len(tangent)?;
        let moved = point + tangent;
        let norm = moved.norm();
        if !(norm > f64::EPSILON) || !norm.is_finite() {
            return Err(ManifoldError::numerical_error(
                "retraction collapsed to the origin",
            ));
        }
        Ok(moved / norm)
    }

    fn distance(&self, x: &DVector, y: &DVector) -> Result<f64> {
        self.check_len(x)?;
        self.check_len(y)?;
        if x == y {
            return Ok(0.0);
        }
        // Same atan2 form as log_map, accurate for nearby points
        let inner = x.dot(y);
        Ok((y - x * inner).norm().atan2(inner))
    }

    fn random_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: Option<&DomainBounds>,
    ) -> Result<DVector> {
        let Some(bounds) = bounds else {
            return Ok(self.project_point(&self.gaussian_direction(rng)));
        };
        self.check_box(bounds)?;

        let mut candidate = self.project_point(&self.gaussian_direction(rng));
        for _ in 0..MAX_REJECTION_ATTEMPTS {
            if self.in_domain(&candidate, bounds)? {
                return Ok(candidate);
            }
            candidate = self.project_point(&self.gaussian_direction(rng));
        }
        tracing::debug!(
            attempts = MAX_REJECTION_ATTEMPTS,
            "rejection sampling failed, projecting into the box"
        );
        self.project_to_domain(&candidate, bounds)
    }

    fn tangent_basis(&self, point: &DVector) -> Result<Vec<DVector>> {
        self.check_len(point)?;
        let mut basis: Vec<DVector> = Vec::with_capacity(self.dimension());
        for k in 0..self.ambient_dim {
            if basis.len() == self.dimension() {
                break;
            }
            // Gram-Schmidt on e_k projected onto the tangent space
            let mut v = -point * point[k];
            v[k] += 1.0;
            for b in &basis {
                v -= b * b.dot(&v);
            }
            let norm = v.norm();
            if norm > 1e-6 {
                basis.push(v / norm);
            }
        }
        if basis.len() != self.dimension() {
            return Err(ManifoldError::numerical_error(
                "could not complete an orthonormal tangent basis",
            ));
        }
        Ok(basis)
    }

    fn tangent_from_coordinates(&self, point: &DVector, coordinates: &DVector) -> Result<DVector> {
        if coordinates.len() != self.dimension() {
            return Err(ManifoldError::dimension_mismatch(
                self.dimension(),
                coordinates.len(),
            ));
        }
        let basis = self.tangent_basis(point)?;
        Ok(basis
            .iter()
            .zip(coordinates.iter())
            .fold(DVector::zeros(self.ambient_dim), |acc, (b, &c)| acc + b * c))
    }

    fn tangent_coordinates(&self, point: &DVector, vector: &DVector) -> Result<DVector> {
        self.check_len(vector)?;
        let basis = self.tangent_basis(point)?;
        Ok(DVector::from_iterator(
            basis.len(),
            basis.iter().map(|b| b.dot(vector)),
        ))
    }

    fn in_domain(&self, point: &DVector, bounds: &DomainBounds) -> Result<bool> {
        let (lower, upper) = self.check_box(bounds)?;
        self.check_len(point)?;
        Ok(point
            .iter()
            .zip(lower.iter().zip(upper))
            .all(|(&x, (&lo, &hi))| x >= lo - MANIFOLD_TOLERANCE && x <= hi + MANIFOLD_TOLERANCE))
    }

    fn project_to_domain(&self, point: &DVector, bounds: &DomainBounds) -> Result<DVector> {
        let (lower, upper) = self.check_box(bounds)?;
        self.check_len(point)?;

        // The box meets the sphere iff its closest point to the origin is
        // inside the ball and its farthest point is outside.
        let nearest = lower
            .iter()
            .zip(upper)
            .map(|(&lo, &hi)| 0.0_f64.clamp(lo, hi).powi(2))
            .sum::<f64>();
        let farthest = lower
            .iter()
            .zip(upper)
            .map(|(&lo, &hi)| lo.abs().max(hi.abs()).powi(2))
            .sum::<f64>();
        if nearest > 1.0 || farthest < 1.0 {
            return Err(ManifoldError::invalid_parameter(
                "box bounds do not intersect the unit sphere",
            ));
        }

        let mut current = self.project_point(point);
        for _ in 0..MAX_DOMAIN_PROJECTIONS {
            if self.in_domain(&current, bounds)? {
                return Ok(current);
            }
            let clamped = DVector::from_fn(self.ambient_dim, |i, _| current[i].clamp(lower[i], upper[i]));
            let norm = clamped.norm();
            if !(norm > f64::EPSILON) {
                break;
            }
            current = clamped / norm;
        }
        if self.in_domain(&current, bounds)? {
            Ok(current)
        } else {
            Err(ManifoldError::numerical_error(
                "projection into the box did not converge",
            ))
        }
    }
}

impl ConfiguredManifold for Sphere {
    const KIND: ManifoldKind = ManifoldKind::Sphere;

    fn with_dimension(dimension: usize) -> Result<Self> {
        Self::new(dimension)
    }
}
