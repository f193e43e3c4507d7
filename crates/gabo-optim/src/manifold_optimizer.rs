//! Multi-start trust-region minimization on a manifold.
//!
//! Each restart runs [`TrustRegion`] from its own initial point. Caller-supplied
//! anchor points seed the first restarts, the remaining ones start from random
//! feasible points drawn with the restart's own RNG. Restarts run in parallel
//! through [`MultiStart`] and the lowest terminal cost wins, ties going to the
//! earliest restart.

use gabo_core::{
    bounds::DomainBounds,
    cost_function::CostFunction,
    error::{ManifoldError, OptimizerError, OptimizerResult},
    manifold::Manifold,
    multistart::MultiStart,
};
use serde::{Deserialize, Serialize};

use crate::trust_region::{TerminationReason, TrustRegion, TrustRegionConfig};

/// Configuration of the multi-start optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManifoldOptimizerConfig {
    /// Number of independent restarts
    pub num_restarts: usize,
    /// Settings of each trust-region restart
    pub trust_region: TrustRegionConfig,
}

impl Default for ManifoldOptimizerConfig {
    fn default() -> Self {
        Self {
            num_restarts: 8,
            trust_region: TrustRegionConfig::default(),
        }
    }
}

impl ManifoldOptimizerConfig {
    /// Creates a new configuration with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of restarts.
    pub fn with_num_restarts(mut self, num_restarts: usize) -> Self {
        self.num_restarts = num_restarts;
        self
    }

    /// Sets the trust-region settings.
    pub fn with_trust_region(mut self, trust_region: TrustRegionConfig) -> Self {
        self.trust_region = trust_region;
        self
    }

    /// Checks the configuration.
    pub fn validate(&self) -> OptimizerResult<()> {
        if self.num_restarts == 0 {
            return Err(OptimizerError::invalid_configuration(
                "at least one restart is required",
                "num_restarts",
                "0",
            ));
        }
        self.trust_region.validate()
    }
}

/// Best point found by [`ManifoldOptimizer::minimize`].
#[derive(Debug, Clone)]
pub struct OptimizedPoint<P> {
    /// The minimizer
    pub point: P,
    /// Cost at `point`
    pub value: f64,
    /// Index of the restart that produced it
    pub restart: usize,
    /// Trust-region steps taken by that restart
    pub steps: usize,
    /// Why that restart stopped
    pub termination: Option<TerminationReason>,
    /// Number of restarts that produced a feasible point
    pub successful_restarts: usize,
}

/// Parallel multi-start trust-region optimizer.
#[derive(Debug, Clone, Default)]
pub struct ManifoldOptimizer {
    config: ManifoldOptimizerConfig,
}

impl ManifoldOptimizer {
    /// Creates a new optimizer with the given configuration.
    pub fn new(config: ManifoldOptimizerConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManifoldOptimizerConfig {
        &self.config
    }

    /// Minimizes `cost_fn` over the (optionally bounded) manifold.
    ///
    /// `anchors` are used as initial points of the first restarts. `seed`
    /// fixes the initial points of the others.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizerError::OptimizationExhausted`] when no restart
    /// produced a feasible point.
    pub fn minimize<M, C>(
        &self,
        manifold: &M,
        cost_fn: &C,
        bounds: Option<&DomainBounds>,
        anchors: &[M::Point],
        seed: u64,
    ) -> OptimizerResult<OptimizedPoint<M::Point>>
    where
        M: Manifold,
        C: CostFunction<M> + ?Sized,
    {
        self.config.validate()?;
        let trust_region = TrustRegion::new(self.config.trust_region.clone());
        let runner = MultiStart::new(self.config.num_restarts, seed);

        let report = runner.run(|index, rng| {
            let initial = match anchors.get(index) {
                Some(anchor) => match bounds {
                    Some(b) if !manifold.in_domain(anchor, b)? => manifold.project_to_domain(anchor, b)?,
                    _ => anchor.clone(),
                },
                None => manifold.random_point(rng, bounds)?,
            };
            let context = trust_region.optimize(manifold, cost_fn, initial, bounds)?;
            if !manifold.is_feasible(&context.point, bounds)? {
                return Err(ManifoldError::invalid_point("restart ended outside the domain"));
            }
            Ok::<_, ManifoldError>((-context.value, context))
        });

        for (index, err) in &report.failures {
            tracing::debug!(restart = index, error = %err, "restart failed");
        }
        let successes = report.successes();
        match report.best {
            Some(best) => {
                tracing::debug!(
                    restart = best.index,
                    value = best.value.value,
                    successes,
                    "multi-start optimization finished"
                );
                Ok(OptimizedPoint {
                    termination: best.value.termination(),
                    steps: best.value.steps,
                    value: best.value.value,
                    point: best.value.point,
                    restart: best.index,
                    successful_restarts: successes,
                })
            }
            None => {
                let last_failure = report
                    .failures
                    .last()
                    .map_or_else(|| "no restart returned a finite cost".to_string(), |(_, e)| e.to_string());
                Err(OptimizerError::optimization_exhausted(report.trials, last_failure))
            }
        }
    }
}
