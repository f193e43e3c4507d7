//! The Bayesian optimization loop.
//!
//! A run evaluates an initial design, then repeats: fit the surrogate,
//! periodically re-estimate its hyperparameters, maximize the acquisition
//! over the manifold, evaluate the objective at the maximizer and append the
//! result. An iteration touches the dataset only after the objective returned
//! a finite value, so a failed iteration leaves the run exactly as it was.

use std::collections::VecDeque;

use gabo_core::{
    error::ManifoldError,
    manifold::{ConfiguredManifold, Manifold},
    types::{constants::MANIFOLD_TOLERANCE, DVector},
};
use gabo_gp::{
    AcquisitionCost, AcquisitionFunction, Dataset, GaussianProcess, GeometryKernel,
    HyperparameterSearchConfig, ModelError,
};
use gabo_optim::ManifoldOptimizer;
use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::StandardNormal;

use crate::{
    config::BoConfig,
    error::{BoError, Result},
    objective::Objective,
    result::{BoResult, IterationRecord, RunFailure},
};

/// Resampling attempts for a candidate that duplicates an observation or is
/// out of reach of the logarithm map.
const MAX_RESAMPLE_ATTEMPTS: usize = 20;

/// Geodesic radius of the neighbourhood candidates are resampled in.
const RESAMPLE_RADIUS: f64 = 1e-2;

/// Candidate accepted for evaluation.
#[derive(Debug, Clone)]
struct Admission<P> {
    point: P,
    displacement: f64,
    resampled: bool,
}

/// Drives a Bayesian optimization run on a manifold.
#[derive(Debug)]
pub struct BoController<M: Manifold, O> {
    config: BoConfig,
    manifold: M,
    objective: O,
    model: GaussianProcess<M>,
    dataset: Dataset<M::Point>,
    optimizer: ManifoldOptimizer,
    search: HyperparameterSearchConfig,
    rng: StdRng,
    /// Initial design points not evaluated yet, `None` until drawn
    initial_points: Option<Vec<M::Point>>,
    initialized: bool,
    num_initial: usize,
    iteration: usize,
    records: Vec<IterationRecord>,
}

impl<M, O> BoController<M, O>
where
    M: ConfiguredManifold + Clone,
    O: Objective<M::Point>,
{
    /// Creates a controller on the manifold named by the configuration.
    pub fn new(config: BoConfig, objective: O) -> Result<Self> {
        if config.manifold != M::KIND {
            return Err(BoError::invalid_configuration(format!(
                "configuration is for the {} manifold, controller runs on {}",
                config.manifold,
                M::KIND
            )));
        }
        config.validate()?;
        let manifold = M::with_dimension(config.dimension)?;
        Self::with_manifold(config, manifold, objective)
    }
}

impl<M, O> BoController<M, O>
where
    M: Manifold + Clone,
    O: Objective<M::Point>,
{
    /// Creates a controller on an explicitly constructed manifold. The
    /// `manifold` and `dimension` fields of the configuration are ignored.
    pub fn with_manifold(config: BoConfig, manifold: M, objective: O) -> Result<Self> {
        config.validate()?;
        let kernel = GeometryKernel::with_calibration(
            manifold.clone(),
            config.kernel_family,
            config.calibration_points,
            config.seed.wrapping_add(1),
        )?;
        let model = GaussianProcess::new(
            kernel,
            config.initial_hyperparameters,
            config.noise_variance,
        )?
        .with_mean_function(config.mean_function);

        Ok(Self {
            optimizer: ManifoldOptimizer::new(config.optimizer_config()),
            search: config.search_config(),
            rng: StdRng::seed_from_u64(config.seed),
            config,
            manifold,
            objective,
            model,
            dataset: Dataset::new(),
            initial_points: None,
            initialized: false,
            num_initial: 0,
            iteration: 0,
            records: Vec::new(),
        })
    }

    /// Replaces the random initial design by caller-supplied points.
    pub fn with_initial_points(mut self, points: Vec<M::Point>) -> Result<Self> {
        if points.is_empty() {
            return Err(BoError::invalid_configuration(
                "the initial design needs at least one point",
            ));
        }
        for point in &points {
            if !self.manifold.is_point_on_manifold(point, MANIFOLD_TOLERANCE.sqrt()) {
                return Err(ManifoldError::invalid_point(
                    "initial design point is not on the manifold",
                )
                .into());
            }
            if !self.manifold.is_feasible(point, self.config.domain_bounds.as_ref())? {
                return Err(ManifoldError::invalid_point(
                    "initial design point is outside the domain",
                )
                .into());
            }
        }
        self.initial_points = Some(points);
        Ok(self)
    }

    /// The configuration.
    pub fn config(&self) -> &BoConfig {
        &self.config
    }

    /// The search space.
    pub fn manifold(&self) -> &M {
        &self.manifold
    }

    /// Observations so far.
    pub fn dataset(&self) -> &Dataset<M::Point> {
        &self.dataset
    }

    /// The surrogate model.
    pub fn model(&self) -> &GaussianProcess<M> {
        &self.model
    }

    /// Number of completed BO iterations.
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    /// Records of the completed BO iterations.
    pub fn records(&self) -> &[IterationRecord] {
        &self.records
    }

    /// Evaluates the initial design. Does nothing once it succeeded.
    ///
    /// Points are evaluated in order. When the objective fails, the points
    /// evaluated so far stay in the dataset and the next call resumes with
    /// the failed point.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        let mut pending: VecDeque<M::Point> = match self.initial_points.take() {
            Some(points) => points.into(),
            None => {
                let bounds = self.config.domain_bounds.as_ref();
                (0..self.config.num_initial_design_points)
                    .map(|_| self.manifold.random_point(&mut self.rng, bounds))
                    .collect::<gabo_core::Result<_>>()?
            }
        };

        while let Some(point) = pending.pop_front() {
            match self.evaluate(&point, 0) {
                Ok(value) => {
                    self.dataset.push(point, value)?;
                    self.num_initial = self.dataset.len();
                    tracing::debug!(
                        evaluations = self.num_initial,
                        remaining = pending.len(),
                        value,
                        "initial design point evaluated"
                    );
                }
                Err(err) => {
                    pending.push_front(point);
                    self.initial_points = Some(pending.into());
                    return Err(err);
                }
            }
        }
        self.initialized = true;
        tracing::info!(
            points = self.num_initial,
            best = self.dataset.best_value(),
            "initial design evaluated"
        );
        Ok(())
    }

    /// Runs one BO iteration, evaluating the initial design first if needed.
    ///
    /// On error the dataset is unchanged and the error is returned as is;
    /// failed objective evaluations are not retried.
    pub fn step(&mut self) -> Result<IterationRecord> {
        self.initialize()?;
        let iteration = self.iteration + 1;

        self.model.fit(&self.dataset)?;
        let mut hyperparameters_updated = false;
        let cadence = self.config.hyperparameter_reoptimization_cadence;
        if cadence > 0 && (iteration - 1) % cadence == 0 {
            let outcome =
                self.model
                    .optimize_hyperparameters(&self.dataset, &self.search, &mut self.rng)?;
            hyperparameters_updated = outcome.accepted;
        }

        let incumbent = self
            .dataset
            .incumbent()
            .cloned()
            .ok_or(ModelError::EmptyDataset)?;
        let previous = self
            .dataset
            .last()
            .map(|o| o.point.clone())
            .ok_or(ModelError::EmptyDataset)?;

        let seed: u64 = self.rng.gen();
        let (candidate, acquisition_value) = {
            let cost = AcquisitionCost::new(&self.config.acquisition, &self.model, incumbent.value);
            let best = self.optimizer.minimize(
                &self.manifold,
                &cost,
                self.config.domain_bounds.as_ref(),
                std::slice::from_ref(&incumbent.point),
                seed,
            )?;
            tracing::debug!(
                restart = best.restart,
                steps = best.steps,
                successful_restarts = best.successful_restarts,
                "acquisition maximized"
            );
            (best.point, -best.value)
        };

        let admitted = self.admit_candidate(candidate, &previous)?;
        let acquisition_value = if admitted.resampled {
            self.config
                .acquisition
                .score(&self.model, &admitted.point, incumbent.value)?
        } else {
            acquisition_value
        };

        let value = self.evaluate(&admitted.point, iteration)?;
        self.dataset.push(admitted.point, value)?;
        self.iteration = iteration;

        let record = IterationRecord {
            iteration,
            value,
            best_value: self.dataset.best_value().unwrap_or(value),
            displacement: admitted.displacement,
            acquisition_value,
            resampled: admitted.resampled,
            hyperparameters_updated,
        };
        tracing::info!(
            iteration,
            value,
            best = record.best_value,
            displacement = record.displacement,
            "BO iteration finished"
        );
        self.records.push(record.clone());
        Ok(record)
    }

    /// Runs the initial design and the whole iteration budget.
    ///
    /// Stops at the first error and returns it together with the partial
    /// result.
    pub fn run(&mut self) -> std::result::Result<BoResult<M::Point>, RunFailure<M::Point>> {
        if let Err(error) = self.initialize() {
            return Err(self.fail(error));
        }
        while self.iteration < self.config.iteration_budget {
            if let Err(error) = self.step() {
                return Err(self.fail(error));
            }
        }
        tracing::info!(
            evaluations = self.dataset.len(),
            best = self.dataset.best_value(),
            "run finished"
        );
        Ok(self.result())
    }

    /// Snapshot of the run so far.
    pub fn result(&self) -> BoResult<M::Point> {
        BoResult {
            observations: self.dataset.observations().to_vec(),
            best: self.dataset.incumbent().cloned(),
            num_initial: self.num_initial,
            hyperparameters: *self.model.hyperparameters(),
            noise_variance: self.model.noise_variance(),
            iterations: self.records.clone(),
        }
    }

    fn fail(&self, error: BoError) -> RunFailure<M::Point> {
        tracing::warn!(
            error = %error,
            iteration = self.iteration,
            evaluations = self.dataset.len(),
            "run stopped"
        );
        RunFailure {
            error,
            partial: self.result(),
        }
    }

    fn evaluate(&mut self, point: &M::Point, iteration: usize) -> Result<f64> {
        match self.objective.evaluate(point) {
            Ok(value) if value.is_finite() => Ok(value),
            Ok(value) => Err(BoError::objective_evaluation(
                iteration,
                format!("objective returned non-finite value {value}"),
            )),
            Err(err) => Err(BoError::objective_evaluation(iteration, err.to_string())),
        }
    }

    /// Checks a candidate against the observations and the previous point,
    /// resampling it nearby while it duplicates an observation or lies where
    /// the logarithm from the previous point is undefined.
    fn admit_candidate(
        &mut self,
        mut candidate: M::Point,
        previous: &M::Point,
    ) -> Result<Admission<M::Point>> {
        for attempt in 0..=MAX_RESAMPLE_ATTEMPTS {
            if attempt > 0 {
                candidate = self.perturb(&candidate)?;
            }
            match self.inspect(&candidate, previous) {
                Ok(Some(displacement)) => {
                    return Ok(Admission {
                        point: candidate,
                        displacement,
                        resampled: attempt > 0,
                    });
                }
                Ok(None) => {
                    tracing::warn!(attempt, "candidate duplicates an observation, resampling");
                }
                Err(err) if err.is_geometry_domain() => {
                    tracing::warn!(
                        attempt,
                        error = %err,
                        "candidate outside the logarithm domain, resampling"
                    );
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(ManifoldError::geometry_domain(format!(
            "no admissible candidate after {MAX_RESAMPLE_ATTEMPTS} resampling attempts"
        ))
        .into())
    }

    /// Geodesic displacement from `previous`, or `None` for a duplicate.
    fn inspect(
        &self,
        candidate: &M::Point,
        previous: &M::Point,
    ) -> gabo_core::Result<Option<f64>> {
        for point in self.dataset.points() {
            if self.manifold.distance(candidate, point)? <= MANIFOLD_TOLERANCE {
                return Ok(None);
            }
        }
        let step = self.manifold.log_map(previous, candidate)?;
        self.manifold.norm(previous, &step).map(Some)
    }

    /// Random point at geodesic distance [`RESAMPLE_RADIUS`] from `point`.
    fn perturb(&mut self, point: &M::Point) -> gabo_core::Result<M::Point> {
        let rng = &mut self.rng;
        let coordinates = DVector::from_fn(self.manifold.dimension(), |_, _| {
            rng.sample::<f64, _>(StandardNormal)
        });
        let norm = coordinates.norm();
        let scale = if norm > 0.0 { RESAMPLE_RADIUS / norm } else { 0.0 };
        let tangent = self
            .manifold
            .tangent_from_coordinates(point, &(coordinates * scale))?;
        let moved = self.manifold.exp_map(point, &tangent)?;
        match &self.config.domain_bounds {
            Some(bounds) if !self.manifold.in_domain(&moved, bounds)? => {
                self.manifold.project_to_domain(&moved, bounds)
            }
            _ => Ok(moved),
        }
    }
}
