//! # Symmetric Positive Definite Manifold S⁺⁺(n)
//!
//! The manifold S⁺⁺(n) of n×n symmetric positive definite (SPD) matrices is the
//! natural search space for stiffness, covariance and inertia parameters.
//!
//! ## Mathematical Definition
//!
//! ```text
//! S⁺⁺(n) = {P ∈ ℝⁿˣⁿ : P = P^T, x^T P x > 0 ∀x ≠ 0}
//! ```
//!
//! ## Geometric Structure
//!
//! ### Tangent Space
//! The tangent space at P ∈ S⁺⁺(n) consists of all symmetric matrices:
//! ```text
//! T_P S⁺⁺(n) = {V ∈ ℝⁿˣⁿ : V = V^T} ≅ ℝ^{n(n+1)/2}
//! ```
//!
//! ### Affine-Invariant Metric
//! ```text
//! g_P(U, V) = tr(P⁻¹ U P⁻¹ V)
//! ```
//!
//! ### Exponential and Logarithmic Maps
//! ```text
//! exp_P(V) = P^{1/2} exp(P^{-1/2} V P^{-1/2}) P^{1/2}
//! log_P(Q) = P^{1/2} log(P^{-1/2} Q P^{-1/2}) P^{1/2}
//! ```
//!
//! ### Distance
//! ```text
//! d(P, Q) = ‖log(P^{-1/2} Q P^{-1/2})‖_F = [∑ᵢ log²(λᵢ)]^{1/2}
//! ```
//! where λᵢ are eigenvalues of P⁻¹Q.
//!
//! ## Geometric Properties
//!
//! - **Dimension**: dim(S⁺⁺(n)) = n(n+1)/2
//! - **Sectional curvature**: nonpositive, so exp and log are global
//! - **Geodesically complete**: Yes
//!
//! ## Tangent Basis
//!
//! With E_ii = e_i e_iᵀ and E_ij = (e_i e_jᵀ + e_j e_iᵀ)/√2 for i < j, the
//! matrices P^{1/2} E_ij P^{1/2} form an orthonormal basis of T_P S⁺⁺(n) for the
//! affine-invariant metric. They are enumerated row by row over the upper
//! triangle.

use std::fmt::{self, Debug};

use gabo_core::{
    bounds::DomainBounds,
    error::{ManifoldError, Result},
    manifold::{unsupported_bounds, ConfiguredManifold, Manifold, ManifoldKind},
    types::{
        constants::{MANIFOLD_TOLERANCE, MIN_EIGENVALUE},
        DMatrix, DVector,
    },
};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::utils::{
    clip_eigenvalues, eigenvalue_range, matrix_exp, matrix_log, matrix_sqrt, matrix_sqrt_inv,
    symmetrize,
};

/// The manifold S⁺⁺(n) of symmetric positive definite matrices.
///
/// Equipped with the affine-invariant Riemannian metric.
///
/// # Invariants
///
/// - `n ≥ 1`: Matrix dimension must be positive
/// - All points P satisfy P = P^T and have positive eigenvalues
/// - All tangent vectors are symmetric matrices
#[derive(Clone, PartialEq, Eq)]
pub struct Spd {
    /// Matrix dimension n
    n: usize,
}

impl Debug for Spd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SPD S⁺⁺({}) with affine-invariant metric", self.n)
    }
}

impl Spd {
    /// Creates a new SPD manifold S⁺⁺(n).
    ///
    /// # Errors
    ///
    /// Returns `ManifoldError::InvalidParameter` if n = 0.
    pub fn new(n: usize) -> Result<Self> {
        if n == 0 {
            return Err(ManifoldError::invalid_parameter(
                "SPD manifold requires n ≥ 1",
            ));
        }
        Ok(Self { n })
    }

    /// Returns the matrix dimension n.
    #[inline]
    pub fn matrix_dim(&self) -> usize {
        self.n
    }

    /// Validates that a matrix is symmetric positive definite.
    ///
    /// # Errors
    ///
    /// - `DimensionMismatch`: If matrix is not n×n
    /// - `InvalidPoint`: If matrix is not symmetric or not positive definite
    pub fn check_point(&self, p: &DMatrix) -> Result<()> {
        self.check_shape(p)?;

        if p.iter().any(|x| !x.is_finite()) {
            return Err(ManifoldError::invalid_point(
                "Matrix contains non-finite values",
            ));
        }

        let symmetry_error = (p - p.transpose()).norm();
        if symmetry_error > MANIFOLD_TOLERANCE * p.norm().max(1.0) {
            return Err(ManifoldError::invalid_point(format!(
                "Matrix not symmetric: ‖P - P^T‖ = {symmetry_error}"
            )));
        }

        let (min_eval, _) = eigenvalue_range(p);
        if min_eval <= 0.0 {
            return Err(ManifoldError::invalid_point(format!(
                "Matrix not positive definite: min eigenvalue = {min_eval}"
            )));
        }

        Ok(())
    }

    fn check_shape(&self, m: &DMatrix) -> Result<()> {
        if m.nrows() != self.n || m.ncols() != self.n {
            return Err(ManifoldError::dimension_mismatch(
                format!("({}, {})", self.n, self.n),
                format!("({}, {})", m.nrows(), m.ncols()),
            ));
        }
        Ok(())
    }

    fn eigenvalue_bounds(&self, bounds: &DomainBounds) -> Result<(f64, f64)> {
        match bounds {
            DomainBounds::Eigenvalue { min, max } => Ok((*min, *max)),
            other => Err(unsupported_bounds(self.name(), other)),
        }
    }

    /// Symmetric basis element E_k in the row-major upper-triangle order.
    fn basis_element(&self, i: usize, j: usize) -> DMatrix {
        let mut e = DMatrix::zeros(self.n, self.n);
        if i == j {
            e[(i, i)] = 1.0;
        } else {
            let w = std::f64::consts::FRAC_1_SQRT_2;
            e[(i, j)] = w;
            e[(j, i)] = w;
        }
        e
    }

    fn upper_triangle(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..self.n).flat_map(move |i| (i..self.n).map(move |j| (i, j)))
    }
}

impl Manifold for Spd {
    type Point = DMatrix;
    type TangentVector = DMatrix;

    fn name(&self) -> &str {
        "SPD"
    }

    fn dimension(&self) -> usize {
        self.n * (self.n + 1) / 2
    }

    fn is_point_on_manifold(&self, point: &DMatrix, tol: f64) -> bool {
        if point.nrows() != self.n || point.ncols() != self.n {
            return false;
        }
        if point.iter().any(|x| !x.is_finite()) {
            return false;
        }
        if (point - point.transpose()).norm() > tol * point.norm().max(1.0) {
            return false;
        }
        eigenvalue_range(point).0 > 0.0
    }

    fn is_vector_in_tangent_space(&self, point: &DMatrix, vector: &DMatrix, tol: f64) -> bool {
        if point.shape() != (self.n, self.n) || vector.shape() != (self.n, self.n) {
            return false;
        }
        // Tangent space consists of symmetric matrices
        (vector - vector.transpose()).norm() < tol
    }

    fn project_point(&self, point: &DMatrix) -> DMatrix {
        if point.shape() != (self.n, self.n) || point.iter().any(|x| !x.is_finite()) {
            return DMatrix::identity(self.n, self.n);
        }
        // Clip the spectrum of the symmetric part to the floor
        clip_eigenvalues(point, MIN_EIGENVALUE, f64::INFINITY)
    }

    fn project_tangent(&self, point: &DMatrix, vector: &DMatrix) -> Result<DMatrix> {
        self.check_shape(point)?;
        self.check_shape(vector)?;
        // (V + V^T)/2
        Ok(symmetrize(vector))
    }

    fn inner_product(&self, point: &DMatrix, u: &DMatrix, v: &DMatrix) -> Result<f64> {
        self.check_shape(u)?;
        self.check_shape(v)?;
        // <U,V>_P = tr(P^{-1} U P^{-1} V)
        let p_inv = point
            .clone()
            .try_inverse()
            .ok_or_else(|| ManifoldError::numerical_error("Point matrix not invertible"))?;
        Ok((&p_inv * u * &p_inv * v).trace())
    }

    fn exp_map(&self, point: &DMatrix, tangent: &DMatrix) -> Result<DMatrix> {
        self.check_shape(tangent)?;
        self.check_point(point)?;
        let p_sqrt = matrix_sqrt(point)?;
        let p_sqrt_inv = matrix_sqrt_inv(point)?;

        let middle = &p_sqrt_inv * tangent * &p_sqrt_inv;
        let exp_middle = matrix_exp(&middle);
        Ok(symmetrize(&(&p_sqrt * exp_middle * &p_sqrt)))
    }

    fn log_map(&self, point: &DMatrix, other: &DMatrix) -> Result<DMatrix> {
        self.check_point(point)?;
        self.check_point(other)?;
        let p_sqrt = matrix_sqrt(point)?;
        let p_sqrt_inv = matrix_sqrt_inv(point)?;

        let middle = &p_sqrt_inv * other * &p_sqrt_inv;
        let log_middle = matrix_log(&middle)?;
        Ok(symmetrize(&(&p_sqrt * log_middle * &p_sqrt)))
    }

    fn retract(&self, point: &DMatrix, tangent: &DMatrix) -> Result<DMatrix> {
        self.check_shape(tangent)?;
        self.check_point(point)?;
        // R_P(V) = P + V + ½ V P⁻¹ V, positive definite for every symmetric V
        let v = symmetrize(tangent);
        let p_inv_v = point
            .clone()
            .cholesky()
            .ok_or_else(|| ManifoldError::numerical_error("Point matrix not positive definite"))?
            .solve(&v);
        let moved = symmetrize(&(point + &v + (&v * p_inv_v) * 0.5));
        if eigenvalue_range(&moved).0 <= 0.0 {
            // Only reachable through rounding on extreme steps
            return Ok(self.project_point(&moved));
        }
        Ok(moved)
    }

    fn distance(&self, x: &DMatrix, y: &DMatrix) -> Result<f64> {
        self.check_point(x)?;
        self.check_point(y)?;
        if x == y {
            return Ok(0.0);
        }
        // d(P,Q) = ‖log(P^{-1/2} Q P^{-1/2})‖_F
        let p_sqrt_inv = matrix_sqrt_inv(x)?;
        let middle = &p_sqrt_inv * y * &p_sqrt_inv;
        Ok(matrix_log(&middle)?.norm())
    }

    fn random_point<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        bounds: Option<&DomainBounds>,
    ) -> Result<DMatrix> {
        match bounds {
            None => {
                // Log-normal spectrum: exp of a symmetric Gaussian matrix
                let a = DMatrix::from_fn(self.n, self.n, |_, _| rng.sample::<f64, _>(StandardNormal));
                Ok(matrix_exp(&symmetrize(&a)))
            }
            Some(bounds) => {
                let (min, max) = self.eigenvalue_bounds(bounds)?;
                // Random orthogonal eigenbasis from the QR decomposition of a Gaussian matrix
                let a = DMatrix::from_fn(self.n, self.n, |_, _| rng.sample::<f64, _>(StandardNormal));
                let q = a.qr().q();
                let eigenvalues =
                    DVector::from_fn(self.n, |_, _| if min < max { rng.gen_range(min..=max) } else { min });
                Ok(symmetrize(&(&q * DMatrix::from_diagonal(&eigenvalues) * q.transpose())))
            }
        }
    }

    fn tangent_basis(&self, point: &DMatrix) -> Result<Vec<DMatrix>> {
        self.check_point(point)?;
        let p_sqrt = matrix_sqrt(point)?;
        Ok(self
            .upper_triangle()
            .map(|(i, j)| symmetrize(&(&p_sqrt * self.basis_element(i, j) * &p_sqrt)))
            .collect())
    }

    fn tangent_from_coordinates(&self, point: &DMatrix, coordinates: &DVector) -> Result<DMatrix> {
        if coordinates.len() != self.dimension() {
            return Err(ManifoldError::dimension_mismatch(
                self.dimension(),
                coordinates.len(),
            ));
        }
        self.check_point(point)?;
        let w = std::f64::consts::FRAC_1_SQRT_2;
        let mut s = DMatrix::zeros(self.n, self.n);
        for (k, (i, j)) in self.upper_triangle().enumerate() {
            if i == j {
                s[(i, i)] = coordinates[k];
            } else {
                s[(i, j)] = coordinates[k] * w;
                s[(j, i)] = coordinates[k] * w;
            }
        }
        let p_sqrt = matrix_sqrt(point)?;
        Ok(symmetrize(&(&p_sqrt * s * &p_sqrt)))
    }

    fn tangent_coordinates(&self, point: &DMatrix, vector: &DMatrix) -> Result<DVector> {
        self.check_shape(vector)?;
        self.check_point(point)?;
        let p_sqrt_inv = matrix_sqrt_inv(point)?;
        let s = symmetrize(&(&p_sqrt_inv * vector * &p_sqrt_inv));
        let sqrt2 = std::f64::consts::SQRT_2;
        Ok(DVector::from_iterator(
            self.dimension(),
            self.upper_triangle()
                .map(|(i, j)| if i == j { s[(i, i)] } else { s[(i, j)] * sqrt2 }),
        ))
    }

    fn in_domain(&self, point: &DMatrix, bounds: &DomainBounds) -> Result<bool> {
        let (min, max) = self.eigenvalue_bounds(bounds)?;
        self.check_shape(point)?;
        let (lo, hi) = eigenvalue_range(point);
        let slack = MANIFOLD_TOLERANCE * max.max(1.0);
        Ok(lo >= min - slack && hi <= max + slack)
    }

    fn project_to_domain(&self, point: &DMatrix, bounds: &DomainBounds) -> Result<DMatrix> {
        let (min, max) = self.eigenvalue_bounds(bounds)?;
        self.check_shape(point)?;
        Ok(clip_eigenvalues(point, min, max))
    }
}

impl ConfiguredManifold for Spd {
    const KIND: ManifoldKind = ManifoldKind::Spd;

    fn with_dimension(dimension: usize) -> Result<Self> {
        Self::new(dimension)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::{rngs::StdRng, SeedableRng};

    fn sample_point() -> DMatrix {
        DMatrix::from_row_slice(3, 3, &[2.0, 0.5, 0.1, 0.5, 1.5, 0.3, 0.1, 0.3, 1.0])
    }

    #[test]
    fn test_spd_creation() {
        let spd = Spd::new(3).unwrap();
        assert_eq!(spd.dimension(), 6);
        assert_eq!(spd.matrix_dim(), 3);
        assert!(Spd::new(0).is_err());
    }

    #[test]
    fn test_point_validation() {
        let spd = Spd::new(2).unwrap();
        assert!(spd.is_point_on_manifold(&DMatrix::identity(2, 2), 1e-10));

        let not_symmetric = DMatrix::from_row_slice(2, 2, &[1.0, 0.5, 0.0, 1.0]);
        assert!(!spd.is_point_on_manifold(&not_symmetric, 1e-10));

        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(!spd.is_point_on_manifold(&indefinite, 1e-10));
        assert!(spd.check_point(&indefinite).is_err());

        let repaired = spd.project_point(&indefinite);
        assert!(spd.is_point_on_manifold(&repaired, 1e-10));
    }

    #[test]
    fn test_exponential_logarithm() {
        let spd = Spd::new(3).unwrap();
        let p = sample_point();
        let v = DMatrix::from_row_slice(3, 3, &[0.2, -0.1, 0.0, -0.1, 0.3, 0.05, 0.0, 0.05, -0.2]);

        let q = spd.exp_map(&p, &v).unwrap();
        assert!(spd.is_point_on_manifold(&q, 1e-10));
        let back = spd.log_map(&p, &q).unwrap();
        assert_relative_eq!(back, v, epsilon = 1e-9);

        let norm = spd.norm(&p, &v).unwrap();
        assert_relative_eq!(spd.distance(&p, &q).unwrap(), norm, epsilon = 1e-9);
    }

    #[test]
    fn test_identity_distance() {
        let spd = Spd::new(2).unwrap();
        let i = DMatrix::identity(2, 2);
        let p = DMatrix::from_diagonal(&DVector::from_vec(vec![std::f64::consts::E, 1.0]));
        assert_relative_eq!(spd.distance(&i, &p).unwrap(), 1.0, epsilon = 1e-12);
        assert_eq!(spd.distance(&p, &p).unwrap(), 0.0);
    }

    #[test]
    fn test_retraction_stays_positive_definite() {
        let spd = Spd::new(2).unwrap();
        let p = DMatrix::identity(2, 2);
        // A large negative step would leave the cone under P + V alone
        let v = DMatrix::from_row_slice(2, 2, &[-3.0, 0.0, 0.0, 0.5]);
        let r = spd.retract(&p, &v).unwrap();
        assert!(spd.is_point_on_manifold(&r, 1e-10));
        // P + V + ½V² on the diagonal
        assert_relative_eq!(r[(0, 0)], 1.0 - 3.0 + 4.5, epsilon = 1e-12);

        let same = spd.retract(&p, &DMatrix::zeros(2, 2)).unwrap();
        assert_relative_eq!(same, p, epsilon = 1e-12);
    }

    #[test]
    fn test_tangent_basis_is_orthonormal() {
        let spd = Spd::new(3).unwrap();
        let p = sample_point();
        let basis = spd.tangent_basis(&p).unwrap();
        assert_eq!(basis.len(), 6);
        for (i, a) in basis.iter().enumerate() {
            for (j, b) in basis.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_relative_eq!(spd.inner_product(&p, a, b).unwrap(), expected, epsilon = 1e-9);
            }
        }

        let coords = DVector::from_vec(vec![0.1, -0.2, 0.3, 0.4, -0.5, 0.6]);
        let v = spd.tangent_from_coordinates(&p, &coords).unwrap();
        assert_relative_eq!(spd.tangent_coordinates(&p, &v).unwrap(), coords, epsilon = 1e-9);
    }

    #[test]
    fn test_bounded_random_point() {
        let spd = Spd::new(3).unwrap();
        let bounds = DomainBounds::new_eigenvalue(0.001, 5.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10 {
            let p = spd.random_point(&mut rng, Some(&bounds)).unwrap();
            assert!(spd.is_point_on_manifold(&p, 1e-10));
            assert!(spd.in_domain(&p, &bounds).unwrap());
        }

        let outside = DMatrix::from_diagonal(&DVector::from_vec(vec![10.0, 0.0001, 1.0]));
        let projected = spd.project_to_domain(&outside, &bounds).unwrap();
        assert!(spd.in_domain(&projected, &bounds).unwrap());

        let boxed = DomainBounds::new_box(vec![0.0], vec![1.0]).unwrap();
        assert!(spd.random_point(&mut rng, Some(&boxed)).is_err());
    }
}
