//! Cost function interface for optimization algorithms.
//!
//! Cost functions here are black boxes: only values are available. Second-order
//! information is recovered from the pullback `s ↦ f(R_p(Σ s_i e_i))` through
//! the retraction `R_p` and an orthonormal tangent basis `e_i`, which turns the
//! tangent space at `p` into plain `R^d` where finite differences are valid.

use std::fmt::Debug;

use crate::{
    error::{ManifoldError, Result},
    manifold::Manifold,
    types::{constants, DMatrix, DVector},
};

/// Step for the second-order differences of the pullback.
const HESSIAN_STEP: f64 = 1e-4;

/// Trait for cost functions on Riemannian manifolds.
///
/// Optimizers minimize the cost. Implementations must be `Sync` since restarts
/// evaluate the same cost function from several threads.
pub trait CostFunction<M: Manifold>: Debug + Sync {
    /// Evaluates the cost function at a point.
    fn cost(&self, point: &M::Point) -> Result<f64>;
}

/// Wraps a closure as a [`CostFunction`].
pub struct FnCost<F> {
    f: F,
}

impl<F> FnCost<F> {
    /// Creates a cost function from a closure.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> Debug for FnCost<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnCost").finish_non_exhaustive()
    }
}

impl<M, F> CostFunction<M> for FnCost<F>
where
    M: Manifold,
    F: Fn(&M::Point) -> Result<f64> + Sync,
{
    fn cost(&self, point: &M::Point) -> Result<f64> {
        (self.f)(point)
    }
}

/// Local quadratic model of a cost function in tangent coordinates at a point.
#[derive(Debug, Clone)]
pub struct PullbackModel {
    /// Cost at the base point
    pub value: f64,
    /// Gradient of the pullback in basis coordinates
    pub gradient: DVector,
    /// Symmetric Hessian of the pullback in basis coordinates
    pub hessian: DMatrix,
}

impl PullbackModel {
    /// Value of the model `m(s) = f + gᵀs + ½ sᵀHs` minus `f`.
    pub fn predicted_change(&self, step: &DVector) -> f64 {
        self.gradient.dot(step) + 0.5 * step.dot(&(&self.hessian * step))
    }
}

/// Evaluates the pullback of `cost` through the retraction at `point`.
pub fn pullback_cost<M, C>(
    manifold: &M,
    cost: &C,
    point: &M::Point,
    coordinates: &DVector,
) -> Result<f64>
where
    M: Manifold,
    C: CostFunction<M> + ?Sized,
{
    let tangent = manifold.tangent_from_coordinates(point, coordinates)?;
    let moved = manifold.retract(point, &tangent)?;
    let value = cost.cost(&moved)?;
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ManifoldError::numerical_error(format!(
            "cost is not finite on the {} manifold",
            manifold.name()
        )))
    }
}

/// Gradient of the pullback by central differences.
pub fn pullback_gradient<M, C>(manifold: &M, cost: &C, point: &M::Point) -> Result<DVector>
where
    M: Manifold,
    C: CostFunction<M> + ?Sized,
{
    let d = manifold.dimension();
    let h = constants::FINITE_DIFFERENCE_STEP;
    let mut gradient = DVector::zeros(d);
    let mut offset = DVector::zeros(d);
    for i in 0..d {
        offset[i] = h;
        let f_plus = pullback_cost(manifold, cost, point, &offset)?;
        offset[i] = -h;
        let f_minus = pullback_cost(manifold, cost, point, &offset)?;
        offset[i] = 0.0;
        gradient[i] = (f_plus - f_minus) / (2.0 * h);
    }
    Ok(gradient)
}

/// Builds the full quadratic model of the pullback at `point`.
///
/// Uses `1 + 2d + 2d(d-1)` cost evaluations for a manifold of dimension `d`.
pub fn pullback_model<M, C>(manifold: &M, cost: &C, point: &M::Point) -> Result<PullbackModel>
where
    M: Manifold,
    C: CostFunction<M> + ?Sized,
{
    let d = manifold.dimension();
    let h = HESSIAN_STEP;
    let value = pullback_cost(manifold, cost, point, &DVector::zeros(d))?;
    let gradient = pullback_gradient(manifold, cost, point)?;

    let mut plus = vec![0.0; d];
    let mut minus = vec![0.0; d];
    let mut offset = DVector::zeros(d);
    for i in 0..d {
        offset[i] = h;
        plus[i] = pullback_cost(manifold, cost, point, &offset)?;
        offset[i] = -h;
        minus[i] = pullback_cost(manifold, cost, point, &offset)?;
        offset[i] = 0.0;
    }

    let mut hessian = DMatrix::zeros(d, d);
    for i in 0..d {
        hessian[(i, i)] = (plus[i] - 2.0 * value + minus[i]) / (h * h);
        for j in (i + 1)..d {
            let mut corner = |si: f64, sj: f64| {
                offset[i] = si * h;
                offset[j] = sj * h;
                let v = pullback_cost(manifold, cost, point, &offset);
                offset[i] = 0.0;
                offset[j] = 0.0;
                v
            };
            let pp = corner(1.0, 1.0)?;
            let pm = corner(1.0, -1.0)?;
            let mp = corner(-1.0, 1.0)?;
            let mm = corner(-1.0, -1.0)?;
            let mixed = (pp - pm - mp + mm) / (4.0 * h * h);
            hessian[(i, j)] = mixed;
            hessian[(j, i)] = mixed;
        }
    }

    Ok(PullbackModel {
        value,
        gradient,
        hessian,
    })
}
