//! Simple manifolds for use in unit tests.

#![cfg(any(test, feature = "test-utils"))]

use rand::Rng;
use rand_distr::StandardNormal;

use crate::{
    bounds::DomainBounds,
    error::{ManifoldError, Result},
    manifold::{unsupported_bounds, Manifold},
    types::DVector,
};

/// Flat Euclidean space R^n.
///
/// All operations are trivial (projections are identity, exp is addition),
/// which makes expected results easy to compute by hand.
#[derive(Debug, Clone)]
pub struct Flat {
    dim: usize,
}

impl Flat {
    /// Creates R^dim.
    pub fn new(dim: usize) -> Self {
        Self { dim }
    }

    fn check(&self, v: &DVector) -> Result<()> {
        if v.len() == self.dim {
            Ok(())
        } else {
            Err(ManifoldError::dimension_mismatch(self.dim, v.len()))
        }
    }
}

impl Manifold for Flat {
    type Point = DVector;
    type TangentVector = DVector;

    fn name(&self) -> &str {
        "Flat"
    }

    fn dimension(&self) -> usize {
        self.dim
    }

    fn is_point_on_manifold(&self, point: &DVector, _tol: f64) -> bool {
        point.len() == self.dim
    }

    fn is_vector_in_tangent_space(&self, _point: &DVector, vector: &DVector, _tol: f64) -> bool {
        vector.len() == self.dim
    }

    fn project_point(&self, point: &DVector) -> DVector {
        point.clone()
    }

    fn project_tangent(&self, _point: &DVector, vector: &DVector) -> Result<DVector> {
        self.check(vector)?;
        Ok(vector.clone())
    }

    fn inner_product(&self, _point: &DVector, u: &DVector, v: &DVector) -> Result<f64> {
        Ok(u.dot(v))
    }

    fn exp_map(&self, point: &DVector, tangent: &DVector) -> Result<DVector> {
        self.check(tangent)?;
        Ok(point + tangent)
    }

    fn log_map(&self, point: &DVector, other: &DVector) -> Result<DVector> {
        self.check(other)?;
        Ok(other - point)
    }

    fn retract(&self, point: &DVector, tangent: &DVector) -> Result<DVector> {
        self.exp_map(point, tangent)
    }

    fn distance(&self, x: &DVector, y: &DVector) -> Result<f64> {
        Ok((y - x).norm())
    }

    fn random_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: Option<&DomainBounds>,
    ) -> Result<DVector> {
        match bounds {
            None => Ok(DVector::from_fn(self.dim, |_, _| rng.sample(StandardNormal))),
            Some(DomainBounds::Box { lower, upper }) => Ok(DVector::from_fn(self.dim, |i, _| {
                rng.gen_range(lower[i]..=upper[i])
            })),
            Some(other) => Err(unsupported_bounds(self.name(), other)),
        }
    }

    fn tangent_basis(&self, _point: &DVector) -> Result<Vec<DVector>> {
        Ok((0..self.dim)
            .map(|i| DVector::from_fn(self.dim, |j, _| if i == j { 1.0 } else { 0.0 }))
            .collect())
    }

    fn tangent_from_coordinates(&self, _point: &DVector, coordinates: &DVector) -> Result<DVector> {
        self.check(coordinates)?;
        Ok(coordinates.clone())
    }

    fn tangent_coordinates(&self, _point: &DVector, vector: &DVector) -> Result<DVector> {
        self.check(vector)?;
        Ok(vector.clone())
    }

    fn in_domain(&self, point: &DVector, bounds: &DomainBounds) -> Result<bool> {
        match bounds {
            DomainBounds::Box { lower, upper } => Ok(point
                .iter()
                .zip(lower.iter().zip(upper))
                .all(|(x, (lo, hi))| x >= lo && x <= hi)),
            other => Err(unsupported_bounds(self.name(), other)),
        }
    }

    fn project_to_domain(&self, point: &DVector, bounds: &DomainBounds) -> Result<DVector> {
        match bounds {
            DomainBounds::Box { lower, upper } => {
                Ok(DVector::from_fn(self.dim, |i, _| point[i].clamp(lower[i], upper[i])))
            }
            other => Err(unsupported_bounds(self.name(), other)),
        }
    }
}
