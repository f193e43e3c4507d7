//! Spectral functions of symmetric matrices.
//!
//! Every function here works on the symmetric part of its input through a
//! symmetric eigendecomposition `M = V Λ Vᵀ`, so the results are symmetric up
//! to rounding. Callers that need exact symmetry use [`symmetrize`].

use gabo_core::{
    error::{ManifoldError, Result},
    types::{DMatrix, DVector},
};

/// Returns `(M + Mᵀ) / 2`.
pub fn symmetrize(m: &DMatrix) -> DMatrix {
    (m + m.transpose()) * 0.5
}

/// Computes `V f(Λ) Vᵀ` for the symmetric part of `m`.
pub fn spectral_map<F: Fn(f64) -> f64>(m: &DMatrix, f: F) -> DMatrix {
    let eigen = symmetrize(m).symmetric_eigen();
    let mapped = eigen.eigenvalues.map(f);
    let result = &eigen.eigenvectors * DMatrix::from_diagonal(&mapped) * eigen.eigenvectors.transpose();
    symmetrize(&result)
}

/// Eigenvalues of the symmetric part of `m`, in no particular order.
pub fn symmetric_eigenvalues(m: &DMatrix) -> DVector {
    symmetrize(m).symmetric_eigenvalues()
}

/// Smallest and largest eigenvalue of the symmetric part of `m`.
pub fn eigenvalue_range(m: &DMatrix) -> (f64, f64) {
    symmetric_eigenvalues(m)
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
            (lo.min(x), hi.max(x))
        })
}

fn checked_spectral_map<F: Fn(f64) -> f64>(m: &DMatrix, what: &str, f: F) -> Result<DMatrix> {
    let eigen = symmetrize(m).symmetric_eigen();
    if let Some(bad) = eigen.eigenvalues.iter().find(|&&x| !(x > 0.0 && x.is_finite())) {
        return Err(ManifoldError::numerical_error(format!(
            "cannot compute the {what} of a matrix with eigenvalue {bad}"
        )));
    }
    let mapped = eigen.eigenvalues.map(f);
    let result = &eigen.eigenvectors * DMatrix::from_diagonal(&mapped) * eigen.eigenvectors.transpose();
    Ok(symmetrize(&result))
}

/// Computes the matrix square root P^{1/2} of an SPD matrix.
///
/// For P = V Λ V^T, returns P^{1/2} = V Λ^{1/2} V^T.
pub fn matrix_sqrt(p: &DMatrix) -> Result<DMatrix> {
    checked_spectral_map(p, "square root", f64::sqrt)
}

/// Computes the inverse square root P^{-1/2} of an SPD matrix.
pub fn matrix_sqrt_inv(p: &DMatrix) -> Result<DMatrix> {
    checked_spectral_map(p, "inverse square root", |x| 1.0 / x.sqrt())
}

/// Computes the matrix logarithm log(P) of an SPD matrix.
pub fn matrix_log(p: &DMatrix) -> Result<DMatrix> {
    checked_spectral_map(p, "logarithm", f64::ln)
}

/// Computes the matrix exponential exp(X) of a symmetric matrix.
pub fn matrix_exp(x: &DMatrix) -> DMatrix {
    spectral_map(x, f64::exp)
}

/// Clamps every eigenvalue of the symmetric part of `m` into `[lo, hi]`.
pub fn clip_eigenvalues(m: &DMatrix, lo: f64, hi: f64) -> DMatrix {
    spectral_map(m, |x| x.clamp(lo, hi))
}
