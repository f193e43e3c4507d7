//! Configuration of a Bayesian optimization run.
//!
//! `BoConfig` is plain data: it derives `Serialize`/`Deserialize`, every field
//! has a default, and JSON files may therefore list only the fields they
//! change.

use gabo_core::{bounds::DomainBounds, manifold::ManifoldKind};
use gabo_gp::{
    AcquisitionKind, HyperparameterSearchConfig, KernelFamily, KernelHyperparameters,
    MeanFunction,
};
use gabo_optim::{ManifoldOptimizerConfig, TrustRegionConfig};
use serde::{Deserialize, Serialize};

use crate::error::{BoError, Result};

/// Settings of a [`BoController`](crate::controller::BoController).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BoConfig {
    /// Manifold the objective lives on
    pub manifold: ManifoldKind,
    /// Ambient dimension for the sphere, matrix size for SPD
    pub dimension: usize,
    /// Radial profile of the kernel
    pub kernel_family: KernelFamily,
    /// Random points evaluated before the first BO iteration
    pub num_initial_design_points: usize,
    /// Restarts of the acquisition optimizer
    pub num_restarts: usize,
    /// BO iterations after the initial design
    pub iteration_budget: usize,
    /// Optional restriction of the search domain
    pub domain_bounds: Option<DomainBounds>,
    /// Observation noise variance
    pub noise_variance: f64,
    /// Hyperparameters are re-estimated every this many iterations, 0 disables
    pub hyperparameter_reoptimization_cadence: usize,
    /// Master seed of the run
    pub seed: u64,
    /// Acquisition function
    pub acquisition: AcquisitionKind,
    /// Kernel hyperparameters before the first re-estimation
    pub initial_hyperparameters: KernelHyperparameters,
    /// Search interval of the length-scale
    pub length_scale_bounds: (f64, f64),
    /// Restarts of the hyperparameter search
    pub hyperparameter_restarts: usize,
    /// Whether the noise variance is re-estimated with the kernel
    pub optimize_noise: bool,
    /// Points on which candidate hyperparameters are checked for validity
    pub calibration_points: usize,
    /// Prior mean of the surrogate
    pub mean_function: MeanFunction,
    /// Settings of each trust-region restart
    pub trust_region: TrustRegionConfig,
}

impl Default for BoConfig {
    fn default() -> Self {
        Self {
            manifold: ManifoldKind::Sphere,
            dimension: 3,
            kernel_family: KernelFamily::default(),
            num_initial_design_points: 5,
            num_restarts: 8,
            iteration_budget: 20,
            domain_bounds: None,
            noise_variance: 1e-6,
            hyperparameter_reoptimization_cadence: 1,
            seed: 0,
            acquisition: AcquisitionKind::default(),
            initial_hyperparameters: KernelHyperparameters::default(),
            length_scale_bounds: (0.05, 5.0),
            hyperparameter_restarts: 4,
            optimize_noise: true,
            calibration_points: gabo_gp::kernel::DEFAULT_CALIBRATION_POINTS,
            mean_function: MeanFunction::default(),
            trust_region: TrustRegionConfig::default(),
        }
    }
}

impl BoConfig {
    /// Creates a default configuration for the given manifold.
    pub fn new(manifold: ManifoldKind, dimension: usize) -> Self {
        Self {
            manifold,
            dimension,
            ..Self::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Sets the kernel family.
    pub fn with_kernel_family(mut self, family: KernelFamily) -> Self {
        self.kernel_family = family;
        self
    }

    /// Sets the size of the initial design.
    pub fn with_initial_design(mut self, num_points: usize) -> Self {
        self.num_initial_design_points = num_points;
        self
    }

    /// Sets the number of acquisition optimizer restarts.
    pub fn with_num_restarts(mut self, num_restarts: usize) -> Self {
        self.num_restarts = num_restarts;
        self
    }

    /// Sets the number of BO iterations.
    pub fn with_iteration_budget(mut self, budget: usize) -> Self {
        self.iteration_budget = budget;
        self
    }

    /// Restricts the search domain.
    pub fn with_domain_bounds(mut self, bounds: DomainBounds) -> Self {
        self.domain_bounds = Some(bounds);
        self
    }

    /// Sets the observation noise variance.
    pub fn with_noise_variance(mut self, noise_variance: f64) -> Self {
        self.noise_variance = noise_variance;
        self
    }

    /// Sets the hyperparameter re-estimation cadence, 0 disables it.
    pub fn with_reoptimization_cadence(mut self, cadence: usize) -> Self {
        self.hyperparameter_reoptimization_cadence = cadence;
        self
    }

    /// Sets the master seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Sets the acquisition function.
    pub fn with_acquisition(mut self, acquisition: AcquisitionKind) -> Self {
        self.acquisition = acquisition;
        self
    }

    /// Sets the initial kernel hyperparameters.
    pub fn with_initial_hyperparameters(mut self, hyperparameters: KernelHyperparameters) -> Self {
        self.initial_hyperparameters = hyperparameters;
        self
    }

    /// Sets the prior mean.
    pub fn with_mean_function(mut self, mean_function: MeanFunction) -> Self {
        self.mean_function = mean_function;
        self
    }

    /// Sets the trust-region settings.
    pub fn with_trust_region(mut self, trust_region: TrustRegionConfig) -> Self {
        self.trust_region = trust_region;
        self
    }

    /// Settings of the acquisition optimizer.
    pub fn optimizer_config(&self) -> ManifoldOptimizerConfig {
        ManifoldOptimizerConfig::new()
            .with_num_restarts(self.num_restarts)
            .with_trust_region(self.trust_region.clone())
    }

    /// Settings of the hyperparameter search.
    pub fn search_config(&self) -> HyperparameterSearchConfig {
        HyperparameterSearchConfig::new()
            .with_num_restarts(self.hyperparameter_restarts)
            .with_length_scale_bounds(self.length_scale_bounds.0, self.length_scale_bounds.1)
            .with_optimize_noise(self.optimize_noise)
    }

    /// Checks the configuration for inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        let min_dimension = match self.manifold {
            ManifoldKind::Sphere => 2,
            ManifoldKind::Spd => 1,
        };
        if self.dimension < min_dimension {
            return Err(BoError::invalid_configuration(format!(
                "{} needs dimension >= {min_dimension}, got {}",
                self.manifold, self.dimension
            )));
        }
        if self.num_initial_design_points == 0 {
            return Err(BoError::invalid_configuration(
                "the initial design needs at least one point",
            ));
        }
        if !(self.noise_variance.is_finite() && self.noise_variance >= 0.0) {
            return Err(BoError::invalid_configuration(format!(
                "noise variance must be non-negative, got {}",
                self.noise_variance
            )));
        }
        self.kernel_family
            .check()
            .and_then(|()| self.initial_hyperparameters.check_range())
            .map_err(|e| BoError::invalid_configuration(e.to_string()))?;
        if let AcquisitionKind::LowerConfidenceBound { kappa } = self.acquisition {
            if !(kappa.is_finite() && kappa >= 0.0) {
                return Err(BoError::invalid_configuration(format!(
                    "lower confidence bound kappa must be non-negative, got {kappa}"
                )));
            }
        }
        if self.hyperparameter_reoptimization_cadence > 0 {
            self.search_config()
                .validate()
                .map_err(|e| BoError::invalid_configuration(e.to_string()))?;
        }
        self.optimizer_config()
            .validate()
            .map_err(|e| BoError::invalid_configuration(e.to_string()))?;

        if let Some(bounds) = &self.domain_bounds {
            bounds
                .check()
                .map_err(|e| BoError::invalid_configuration(e.to_string()))?;
            match (self.manifold, bounds) {
                (ManifoldKind::Sphere, DomainBounds::Box { lower, .. }) => {
                    if lower.len() != self.dimension {
                        return Err(BoError::invalid_configuration(format!(
                            "box bounds have {} coordinates, the sphere has {}",
                            lower.len(),
                            self.dimension
                        )));
                    }
                }
                (ManifoldKind::Spd, DomainBounds::Eigenvalue { .. }) => {}
                (manifold, bounds) => {
                    return Err(BoError::invalid_configuration(format!(
                        "{} bounds are not supported on {manifold}",
                        bounds.kind()
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_is_valid() {
        assert!(BoConfig::default().validate().is_ok());
        assert!(BoConfig::new(ManifoldKind::Spd, 2).validate().is_ok());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let config = BoConfig::from_json_str(
            r#"{
                "manifold": "spd",
                "dimension": 2,
                "kernel_family": {"family": "laplace"},
                "domain_bounds": {"kind": "eigenvalue", "min": 0.1, "max": 4.0},
                "iteration_budget": 7
            }"#,
        )
        .unwrap();
        assert_eq!(config.manifold, ManifoldKind::Spd);
        assert_eq!(config.kernel_family, KernelFamily::Laplace);
        assert_eq!(config.iteration_budget, 7);
        assert_eq!(config.num_restarts, BoConfig::default().num_restarts);
    }

    #[test]
    fn test_json_round_trip() {
        let config = BoConfig::new(ManifoldKind::Sphere, 4)
            .with_domain_bounds(
                DomainBounds::new_box(vec![-1.0, -1.0, -1.0, 0.0], vec![1.0; 4]).unwrap(),
            )
            .with_acquisition(AcquisitionKind::LowerConfidenceBound { kappa: 1.5 })
            .with_mean_function(MeanFunction::Constant(0.25))
            .with_seed(99);
        let json = config.to_json_string().unwrap();
        assert_eq!(BoConfig::from_json_str(&json).unwrap(), config);
    }

    #[test]
    fn test_inconsistent_settings_are_rejected() {
        let invalid = [
            BoConfig::new(ManifoldKind::Sphere, 1),
            BoConfig::default().with_initial_design(0),
            BoConfig::default().with_noise_variance(-1.0),
            BoConfig::default().with_num_restarts(0),
            BoConfig::default().with_domain_bounds(DomainBounds::new_eigenvalue(0.1, 1.0).unwrap()),
            BoConfig::default().with_domain_bounds(
                DomainBounds::new_box(vec![-1.0; 2], vec![1.0; 2]).unwrap(),
            ),
            BoConfig::default().with_kernel_family(KernelFamily::RationalQuadratic { alpha: 0.0 }),
        ];
        for config in invalid {
            assert!(
                matches!(config.validate(), Err(BoError::InvalidConfiguration { .. })),
                "{config:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_malformed_json_is_a_config_error() {
        assert!(matches!(
            BoConfig::from_json_str("{\"dimension\": \"three\"}"),
            Err(BoError::Config(_))
        ));
    }
}
