//! Type aliases and numerical constants.
//!
//! All computations run in `f64`. The constants below fix the tolerances
//! used for manifold membership, PSD validation and degenerate posteriors
//! throughout the workspace.

use nalgebra::{Dyn, OMatrix, OVector};

/// Type alias for a dynamically-sized matrix.
pub type DMatrix<T = f64> = OMatrix<T, Dyn, Dyn>;

/// Type alias for a dynamically-sized vector.
pub type DVector<T = f64> = OVector<T, Dyn>;

/// Numerical constants.
pub mod constants {
    /// Absolute tolerance for membership checks and distance computations.
    pub const MANIFOLD_TOLERANCE: f64 = 1e-10;

    /// Eigenvalue floor used when repairing drifted SPD points.
    pub const MIN_EIGENVALUE: f64 = 1e-10;

    /// Relative tolerance on negative Gram eigenvalues.
    pub const PSD_TOLERANCE: f64 = 1e-8;

    /// Standard deviations below this are treated as zero.
    pub const MIN_STD_DEV: f64 = 1e-12;

    /// Default tolerance for gradient norm convergence.
    pub const DEFAULT_GRADIENT_TOLERANCE: f64 = 1e-6;

    /// Step used for central finite differences in tangent coordinates.
    pub const FINITE_DIFFERENCE_STEP: f64 = 1e-5;
}
