//! Riemannian Trust Region optimizer.
//!
//! Trust region methods are robust second-order optimization algorithms that use a
//! local quadratic model of the objective function within a "trust region" where
//! the model is assumed to be accurate. The cost functions minimized here are
//! black boxes, so the model is built from finite differences of the pullback
//! `s ↦ f(R_p(s))` in the coordinates of an orthonormal tangent basis at the
//! current point. In those coordinates the tangent space is plain `R^d` and the
//! subproblem is the classical Euclidean one.
//!
//! # Algorithm Overview
//!
//! At each iteration, the trust region method:
//! 1. Builds a quadratic model of the pullback in tangent coordinates
//! 2. Solves the subproblem with Steihaug truncated CG
//! 3. Retracts the step, projecting into the domain when bounded
//! 4. Evaluates the actual vs predicted reduction
//! 5. Accepts or rejects the step and updates the radius
//!
//! # References
//!
//! - Absil et al., "Trust-Region Methods on Riemannian Manifolds" (2007)
//! - Nocedal & Wright, "Numerical Optimization" (2006)

use gabo_core::{
    bounds::DomainBounds,
    cost_function::{pullback_model, CostFunction},
    error::{ManifoldError, OptimizerError, OptimizerResult, Result},
    manifold::Manifold,
    types::{constants, DMatrix, DVector},
};
use serde::{Deserialize, Serialize};

/// Configuration for the Trust Region optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustRegionConfig {
    /// Initial trust region radius
    pub initial_radius: f64,
    /// Maximum trust region radius
    pub max_radius: f64,
    /// Minimum trust region radius (below this, the restart terminates)
    pub min_radius: f64,
    /// Ratio threshold for accepting a step (eta in literature)
    pub acceptance_ratio: f64,
    /// Ratio threshold for increasing the trust region (typically 0.75)
    pub increase_threshold: f64,
    /// Ratio threshold for decreasing the trust region (typically 0.25)
    pub decrease_threshold: f64,
    /// Factor for increasing the trust region radius (typically 2.0)
    pub increase_factor: f64,
    /// Factor for decreasing the trust region radius (typically 0.25)
    pub decrease_factor: f64,
    /// Maximum iterations for the CG subproblem solver
    pub max_cg_iterations: Option<usize>,
    /// Tolerance for the CG subproblem solver
    pub cg_tolerance: f64,
    /// Gradient norm below which a restart has converged
    pub gradient_tolerance: f64,
    /// Maximum number of trust-region steps per restart
    pub max_iterations: usize,
}

impl Default for TrustRegionConfig {
    fn default() -> Self {
        Self {
            initial_radius: 0.5,
            max_radius: 2.0,
            min_radius: 1e-6,
            acceptance_ratio: 0.1,
            increase_threshold: 0.75,
            decrease_threshold: 0.25,
            increase_factor: 2.0,
            decrease_factor: 0.25,
            max_cg_iterations: None,
            cg_tolerance: 1e-8,
            gradient_tolerance: constants::DEFAULT_GRADIENT_TOLERANCE,
            max_iterations: 50,
        }
    }
}

impl TrustRegionConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial trust region radius.
    pub fn with_initial_radius(mut self, radius: f64) -> Self {
        self.initial_radius = radius;
        self
    }

    /// Sets the maximum trust region radius.
    pub fn with_max_radius(mut self, radius: f64) -> Self {
        self.max_radius = radius;
        self
    }

    /// Sets the minimum trust region radius.
    pub fn with_min_radius(mut self, radius: f64) -> Self {
        self.min_radius = radius;
        self
    }

    /// Sets the acceptance ratio threshold.
    pub fn with_acceptance_ratio(mut self, ratio: f64) -> Self {
        self.acceptance_ratio = ratio;
        self
    }

    /// Sets the maximum CG iterations.
    pub fn with_max_cg_iterations(mut self, max_iter: usize) -> Self {
        self.max_cg_iterations = Some(max_iter);
        self
    }

    /// Sets the CG tolerance.
    pub fn with_cg_tolerance(mut self, tol: f64) -> Self {
        self.cg_tolerance = tol;
        self
    }

    /// Sets the gradient norm tolerance.
    pub fn with_gradient_tolerance(mut self, tol: f64) -> Self {
        self.gradient_tolerance = tol;
        self
    }

    /// Sets the step budget of a restart.
    pub fn with_max_iterations(mut self, max_iter: usize) -> Self {
        self.max_iterations = max_iter;
        self
    }

    /// Checks that the parameters describe a working trust-region method.
    pub fn validate(&self) -> OptimizerResult<()> {
        let positive = [
            ("initial_radius", self.initial_radius),
            ("max_radius", self.max_radius),
            ("min_radius", self.min_radius),
            ("cg_tolerance", self.cg_tolerance),
            ("gradient_tolerance", self.gradient_tolerance),
        ];
        for (name, value) in positive {
            if !(value > 0.0 && value.is_finite()) {
                return Err(OptimizerError::invalid_configuration(
                    "must be positive and finite",
                    name,
                    value.to_string(),
                ));
            }
        }
        if self.min_radius > self.initial_radius || self.initial_radius > self.max_radius {
            return Err(OptimizerError::invalid_configuration(
                "radii must satisfy min_radius <= initial_radius <= max_radius",
                "initial_radius",
                self.initial_radius.to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.acceptance_ratio)
            || self.decrease_threshold >= self.increase_threshold
        {
            return Err(OptimizerError::invalid_configuration(
                "thresholds must satisfy 0 <= acceptance_ratio < 1 and decrease < increase",
                "acceptance_ratio",
                self.acceptance_ratio.to_string(),
            ));
        }
        if !(self.decrease_factor > 0.0 && self.decrease_factor < 1.0 && self.increase_factor > 1.0) {
            return Err(OptimizerError::invalid_configuration(
                "factors must satisfy 0 < decrease_factor < 1 < increase_factor",
                "decrease_factor",
                self.decrease_factor.to_string(),
            ));
        }
        if self.max_iterations == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one step is required",
                "max_iterations",
                "0",
            ));
        }
        Ok(())
    }
}

/// Why a restart stopped iterating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Gradient norm fell below the tolerance
    GradientTolerance,
    /// Trust region radius fell below the minimum
    RadiusCollapsed,
    /// Step budget exhausted
    StepBudget,
    /// The local model could not be built at the current point
    ModelFailure,
}

/// Lifecycle of a single restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartStatus {
    /// Still iterating
    Iterating,
    /// Stopped for the given reason
    Terminated(TerminationReason),
}

/// Mutable state of one trust-region restart.
#[derive(Debug, Clone)]
pub struct RestartContext<P> {
    /// Current (best accepted) point
    pub point: P,
    /// Cost at `point`
    pub value: f64,
    /// Current trust region radius
    pub radius: f64,
    /// Number of steps taken, accepted or not
    pub steps: usize,
    /// Number of accepted steps
    pub accepted_steps: usize,
    /// Gradient norm at the last model
    pub gradient_norm: Option<f64>,
    /// Lifecycle state
    pub status: RestartStatus,
    /// Number of rejected steps in a row
    pub consecutive_rejections: usize,
}

impl<P> RestartContext<P> {
    /// Returns true once the restart has stopped.
    pub fn is_terminated(&self) -> bool {
        matches!(self.status, RestartStatus::Terminated(_))
    }

    /// Termination reason, if terminated.
    pub fn termination(&self) -> Option<TerminationReason> {
        match self.status {
            RestartStatus::Terminated(reason) => Some(reason),
            RestartStatus::Iterating => None,
        }
    }

    fn terminate(&mut self, reason: TerminationReason) {
        self.status = RestartStatus::Terminated(reason);
    }

    /// Updates the trust region radius based on the reduction ratio.
    fn update_radius(&mut self, ratio: f64, config: &TrustRegionConfig) {
        if ratio < config.decrease_threshold {
            // Poor agreement: shrink trust region
            self.radius *= config.decrease_factor;
            self.consecutive_rejections += 1;
        } else if ratio > config.increase_threshold {
            // Good agreement: expand trust region
            self.radius = (self.radius * config.increase_factor).min(config.max_radius);
            self.consecutive_rejections = 0;
        } else {
            self.consecutive_rejections = 0;
        }
    }
}

/// Result of the Steihaug-CG subproblem solver.
#[derive(Debug, Clone)]
pub struct SubproblemSolution {
    /// Step in tangent coordinates
    pub step: DVector,
    /// Whether the step was truncated at the trust region boundary
    pub boundary_hit: bool,
    /// Number of CG iterations
    pub iterations: usize,
}

/// Steihaug-CG solver for the trust region subproblem.
///
/// Solves
/// min_s  m(s) = <g, s> + 0.5 <s, H s>
/// s.t.   ||s|| <= Delta
pub fn steihaug_cg(
    gradient: &DVector,
    hessian: &DMatrix,
    radius: f64,
    max_iter: usize,
    tolerance: f64,
) -> Result<SubproblemSolution> {
    let mut s = DVector::zeros(gradient.len());
    let mut r = -gradient;
    let mut d = r.clone();
    let mut r_norm_sq = r.norm_squared();

    if r_norm_sq.sqrt() < tolerance {
        return Ok(SubproblemSolution {
            step: s,
            boundary_hit: false,
            iterations: 0,
        });
    }

    for iteration in 0..max_iter {
        let hd = hessian * &d;
        let dhd = d.dot(&hd);

        // Negative curvature: follow d to the boundary
        if dhd <= 0.0 {
            let tau = boundary_intersection(&s, &d, radius)?;
            s += &d * tau;
            return Ok(SubproblemSolution {
                step: s,
                boundary_hit: true,
                iterations: iteration + 1,
            });
        }

        let alpha = r_norm_sq / dhd;
        let s_new = &s + &d * alpha;
        if s_new.norm() >= radius {
            let tau = boundary_intersection(&s, &d, radius)?;
            s += &d * tau;
            return Ok(SubproblemSolution {
                step: s,
                boundary_hit: true,
                iterations: iteration + 1,
            });
        }
        s = s_new;

        r -= &hd * alpha;
        let r_norm_sq_new = r.norm_squared();
        if r_norm_sq_new.sqrt() < tolerance {
            return Ok(SubproblemSolution {
                step: s,
                boundary_hit: false,
                iterations: iteration + 1,
            });
        }

        let beta = r_norm_sq_new / r_norm_sq;
        d = &r + &d * beta;
        r_norm_sq = r_norm_sq_new;
    }

    Ok(SubproblemSolution {
        step: s,
        boundary_hit: false,
        iterations: max_iter,
    })
}

/// Finds the positive tau with ||s + tau*d|| = radius.
fn boundary_intersection(s: &DVector, d: &DVector, radius: f64) -> Result<f64> {
    let ss = s.norm_squared();
    let sd = s.dot(d);
    let dd = d.norm_squared();

    let discriminant = sd * sd - dd * (ss - radius * radius);
    if discriminant < 0.0 || dd <= 0.0 {
        return Err(ManifoldError::numerical_error(
            "No intersection with trust region boundary",
        ));
    }

    let sqrt_disc = discriminant.sqrt();
    let tau1 = (-sd + sqrt_disc) / dd;
    let tau2 = (-sd - sqrt_disc) / dd;
    Ok(if tau1 > 0.0 { tau1 } else { tau2 })
}

/// Trust Region optimizer for Riemannian manifolds.
#[derive(Debug, Clone, Default)]
pub struct TrustRegion {
    config: TrustRegionConfig,
}

impl TrustRegion {
    /// Creates a new Trust Region optimizer with the given configuration.
    pub fn new(config: TrustRegionConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &TrustRegionConfig {
        &self.config
    }

    /// Returns the optimizer name.
    pub fn name(&self) -> &str {
        "Riemannian Trust Region"
    }

    /// Creates the context of a restart starting at `initial_point`.
    pub fn start<M, C>(
        &self,
        manifold: &M,
        cost_fn: &C,
        initial_point: M::Point,
    ) -> Result<RestartContext<M::Point>>
    where
        M: Manifold,
        C: CostFunction<M> + ?Sized,
    {
        if !manifold.is_point_on_manifold(&initial_point, constants::MANIFOLD_TOLERANCE.sqrt()) {
            return Err(ManifoldError::invalid_point(format!(
                "initial point is not on the {} manifold",
                manifold.name()
            )));
        }
        let value = cost_fn.cost(&initial_point)?;
        if !value.is_finite() {
            return Err(ManifoldError::numerical_error(format!(
                "cost at the initial point is not finite ({value})"
            )));
        }
        Ok(RestartContext {
            point: initial_point,
            value,
            radius: self.config.initial_radius,
            steps: 0,
            accepted_steps: 0,
            gradient_norm: None,
            status: RestartStatus::Iterating,
            consecutive_rejections: 0,
        })
    }

    /// Performs a single trust-region step on `context`.
    pub fn step<M, C>(
        &self,
        manifold: &M,
        cost_fn: &C,
        bounds: Option<&DomainBounds>,
        context: &mut RestartContext<M::Point>,
    ) -> Result<()>
    where
        M: Manifold,
        C: CostFunction<M> + ?Sized,
    {
        if context.is_terminated() {
            return Ok(());
        }
        if context.steps >= self.config.max_iterations {
            context.terminate(TerminationReason::StepBudget);
            return Ok(());
        }

        let model = pullback_model(manifold, cost_fn, &context.point)?;
        let grad_norm = model.gradient.norm();
        context.gradient_norm = Some(grad_norm);
        if grad_norm < self.config.gradient_tolerance {
            context.terminate(TerminationReason::GradientTolerance);
            return Ok(());
        }

        let max_cg = self.config.max_cg_iterations.unwrap_or(manifold.dimension());
        let solution = steihaug_cg(
            &model.gradient,
            &model.hessian,
            context.radius,
            max_cg.max(1),
            self.config.cg_tolerance,
        )?;
        let predicted_reduction = -model.predicted_change(&solution.step);

        // Compute trial point
        let tangent = manifold.tangent_from_coordinates(&context.point, &solution.step)?;
        let mut trial_point = Some(manifold.retract(&context.point, &tangent)?);
        if let (Some(bounds), Some(candidate)) = (bounds, trial_point.as_ref()) {
            if !manifold.in_domain(candidate, bounds)? {
                trial_point = match manifold.project_to_domain(candidate, bounds) {
                    Ok(projected) => Some(projected),
                    Err(err) => {
                        tracing::debug!(error = %err, "trial point could not be projected into the domain");
                        None
                    }
                };
            }
        }
        let trial_value = match &trial_point {
            Some(p) => cost_fn.cost(p)?,
            None => f64::INFINITY,
        };

        let actual_reduction = context.value - trial_value;
        let ratio = if predicted_reduction > f64::EPSILON && trial_value.is_finite() {
            actual_reduction / predicted_reduction
        } else {
            0.0
        };

        if ratio >= self.config.acceptance_ratio && actual_reduction > 0.0 {
            if let Some(p) = trial_point {
                context.point = p;
                context.value = trial_value;
                context.accepted_steps += 1;
            }
        }

        context.update_radius(ratio, &self.config);
        context.steps += 1;

        if context.radius < self.config.min_radius {
            context.terminate(TerminationReason::RadiusCollapsed);
        }
        Ok(())
    }

    /// Runs one restart from `initial_point` until it terminates.
    ///
    /// Errors while building the local model end the restart with
    /// [`TerminationReason::ModelFailure`] and keep the best point found so far.
    pub fn optimize<M, C>(
        &self,
        manifold: &M,
        cost_fn: &C,
        initial_point: M::Point,
        bounds: Option<&DomainBounds>,
    ) -> Result<RestartContext<M::Point>>
    where
        M: Manifold,
        C: CostFunction<M> + ?Sized,
    {
        let mut context = self.start(manifold, cost_fn, initial_point)?;
        while !context.is_terminated() {
            if let Err(err) = self.step(manifold, cost_fn, bounds, &mut context) {
                tracing::debug!(error = %err, steps = context.steps, "trust-region restart stopped early");
                context.terminate(TerminationReason::ModelFailure);
            }
        }
        tracing::debug!(
            value = context.value,
            steps = context.steps,
            accepted = context.accepted_steps,
            reason = ?context.termination(),
            "trust-region restart terminated"
        );
        Ok(context)
    }
}
