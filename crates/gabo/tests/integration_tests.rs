//! End-to-end tests of the optimization loop.

use approx::assert_relative_eq;
use gabo::prelude::*;
use gabo_gp::{AcquisitionCost, Dataset, ExpectedImprovement, GaussianProcess, GeometryKernel};
use gabo_optim::{ManifoldOptimizer, ManifoldOptimizerConfig};
use pretty_assertions::assert_eq;

fn north() -> DVector<f64> {
    DVector::from_vec(vec![0.0, 0.0, 1.0])
}

fn equator() -> DVector<f64> {
    DVector::from_vec(vec![1.0, 0.0, 0.0])
}

fn quick_config(kind: ManifoldKind, dimension: usize) -> BoConfig {
    BoConfig::new(kind, dimension)
        .with_kernel_family(KernelFamily::Laplace)
        .with_initial_design(3)
        .with_num_restarts(2)
        .with_seed(11)
}

#[test]
fn test_single_restart_leaves_the_observations() {
    let sphere = Sphere::new(3).unwrap();
    let mut data = Dataset::new();
    data.push(north(), 1.0).unwrap();
    data.push(equator(), 0.0).unwrap();

    let kernel = GeometryKernel::new(sphere.clone(), KernelFamily::Laplace, 3).unwrap();
    let mut gp = GaussianProcess::new(kernel, KernelHyperparameters::new(1.0, 0.8).unwrap(), 1e-6)
        .unwrap();
    gp.fit(&data).unwrap();

    let incumbent = data.best_value().unwrap();
    let cost = AcquisitionCost::new(&ExpectedImprovement, &gp, incumbent);
    let optimizer = ManifoldOptimizer::new(ManifoldOptimizerConfig::new().with_num_restarts(1));
    let best = optimizer.minimize(&sphere, &cost, None, &[], 42).unwrap();

    assert_relative_eq!(best.point.norm(), 1.0, epsilon = 1e-10);
    assert!(sphere.distance(&best.point, &north()).unwrap() > 1e-6);
    assert!(sphere.distance(&best.point, &equator()).unwrap() > 1e-6);
    assert_eq!(best.successful_restarts, 1);

    // Same seed, same answer
    let again = optimizer.minimize(&sphere, &cost, None, &[], 42).unwrap();
    assert_eq!(again.point, best.point);
}

#[test]
fn test_step_from_pole_and_equator_adds_a_new_point() {
    let config = BoConfig::new(ManifoldKind::Sphere, 3)
        .with_kernel_family(KernelFamily::Laplace)
        .with_num_restarts(1)
        .with_seed(42);
    let objective =
        |x: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(x[2] + 0.5 * x[0] * x[1]) };
    let mut controller = BoController::<Sphere, _>::new(config, objective)
        .unwrap()
        .with_initial_points(vec![north(), equator()])
        .unwrap();

    let record = controller.step().unwrap();
    assert_eq!(record.iteration, 1);
    assert_eq!(controller.dataset().len(), 3);

    let new_point = &controller.dataset().last().unwrap().point;
    let sphere = controller.manifold();
    assert_relative_eq!(new_point.norm(), 1.0, epsilon = 1e-10);
    assert!(sphere.distance(new_point, &north()).unwrap() > 1e-10);
    assert!(sphere.distance(new_point, &equator()).unwrap() > 1e-10);
    assert_relative_eq!(
        record.displacement,
        sphere.distance(&equator(), new_point).unwrap(),
        epsilon = 1e-8
    );
}

#[test]
fn test_constant_objective_fills_the_budget() {
    let config = quick_config(ManifoldKind::Sphere, 3).with_iteration_budget(5);
    let objective = |_: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(2.5) };
    let mut controller = BoController::<Sphere, _>::new(config, objective).unwrap();

    let result = controller.run().unwrap();
    assert_eq!(result.num_evaluations(), 3 + 5);
    assert_eq!(result.num_initial, 3);
    assert_eq!(result.best_value(), Some(2.5));
    assert_eq!(result.iterations.len(), 5);
    assert_eq!(controller.iteration(), 5);
    for (i, record) in result.iterations.iter().enumerate() {
        assert_eq!(record.iteration, i + 1);
        assert_eq!(record.best_value, 2.5);
        assert!(record.displacement.is_finite() && record.displacement > 0.0);
    }

    // Every evaluated point is distinct
    let sphere = controller.manifold();
    let points: Vec<_> = result.observations.iter().map(|o| &o.point).collect();
    for (i, a) in points.iter().enumerate() {
        for b in &points[i + 1..] {
            assert!(sphere.distance(a, b).unwrap() > 1e-10);
        }
    }
}

#[test]
fn test_run_is_reproducible() {
    let objective = |x: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(1.0 - x[0]) };
    let run = || {
        let config = quick_config(ManifoldKind::Sphere, 3).with_iteration_budget(3);
        BoController::<Sphere, _>::new(config, objective)
            .unwrap()
            .run()
            .unwrap()
    };
    assert_eq!(run(), run());
}

#[test]
fn test_objective_failure_keeps_the_dataset_and_reports_partial_result() {
    let mut calls = 0;
    let objective = move |x: &DVector<f64>| -> Result<f64, ObjectiveError> {
        calls += 1;
        if calls == 5 {
            Err(ObjectiveError::new("simulator crashed"))
        } else {
            Ok(x[1])
        }
    };
    let config = quick_config(ManifoldKind::Sphere, 3).with_iteration_budget(4);
    let mut controller = BoController::<Sphere, _>::new(config, objective).unwrap();

    // Three initial evaluations, then one iteration, then the failing call
    let failure = controller.run().unwrap_err();
    match &failure.error {
        BoError::ObjectiveEvaluation { iteration, reason } => {
            assert_eq!(*iteration, 2);
            assert_eq!(reason, "simulator crashed");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(failure.partial.num_evaluations(), 4);
    assert_eq!(failure.partial.iterations.len(), 1);
    assert_eq!(controller.dataset().len(), 4);
    assert_eq!(controller.iteration(), 1);

    // The run resumes from where it stopped
    let record = controller.step().unwrap();
    assert_eq!(record.iteration, 2);
    assert_eq!(controller.dataset().len(), 5);
}

/// Objective failing on the given call only, returning the first coordinate otherwise.
fn failing_on_call(
    failing_call: usize,
) -> impl FnMut(&DVector<f64>) -> Result<f64, ObjectiveError> {
    let mut calls = 0;
    move |x: &DVector<f64>| -> Result<f64, ObjectiveError> {
        calls += 1;
        if calls == failing_call {
            Err(ObjectiveError::new("transient failure"))
        } else {
            Ok(x[0])
        }
    }
}

#[test]
fn test_initial_design_resumes_after_objective_failure() {
    let config = quick_config(ManifoldKind::Sphere, 3).with_iteration_budget(2);
    let mut controller = BoController::<Sphere, _>::new(config, failing_on_call(2)).unwrap();

    assert!(matches!(
        controller.initialize(),
        Err(BoError::ObjectiveEvaluation { iteration: 0, .. })
    ));
    assert_eq!(controller.dataset().len(), 1);

    controller.initialize().unwrap();
    assert_eq!(controller.dataset().len(), 3);

    let result = controller.run().unwrap();
    assert_eq!(result.num_initial, 3);
    assert_eq!(result.num_evaluations(), 3 + 2);
}

#[test]
fn test_initial_design_keeps_caller_points_after_objective_failure() {
    let design = vec![
        north(),
        equator(),
        DVector::from_vec(vec![0.0, 1.0, 0.0]),
    ];
    let mut controller =
        BoController::<Sphere, _>::new(quick_config(ManifoldKind::Sphere, 3), failing_on_call(2))
            .unwrap()
            .with_initial_points(design.clone())
            .unwrap();

    // A failed initial design surfaces through step too
    assert!(controller.step().is_err());
    assert_eq!(controller.dataset().len(), 1);
    assert_eq!(controller.iteration(), 0);

    controller.initialize().unwrap();
    let evaluated: Vec<DVector<f64>> = controller.dataset().points().cloned().collect();
    assert_eq!(evaluated, design);
    assert_eq!(controller.result().num_initial, 3);
}

#[test]
fn test_non_finite_objective_value_is_an_error() {
    let objective = |_: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(f64::NAN) };
    let mut controller =
        BoController::<Sphere, _>::new(quick_config(ManifoldKind::Sphere, 3), objective).unwrap();
    assert!(matches!(
        controller.initialize(),
        Err(BoError::ObjectiveEvaluation { iteration: 0, .. })
    ));
    assert!(controller.dataset().is_empty());
}

#[test]
fn test_initial_points_must_be_on_the_manifold() {
    let objective = |_: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(0.0) };
    let controller =
        BoController::<Sphere, _>::new(quick_config(ManifoldKind::Sphere, 3), objective).unwrap();
    assert!(matches!(
        controller.with_initial_points(vec![DVector::from_vec(vec![1.0, 1.0, 0.0])]),
        Err(BoError::Manifold(_))
    ));
}

#[test]
fn test_config_from_json_drives_a_run() {
    let json = r#"{
        "manifold": "sphere",
        "dimension": 3,
        "kernel_family": {"family": "laplace"},
        "num_initial_design_points": 2,
        "num_restarts": 2,
        "iteration_budget": 2,
        "domain_bounds": {"kind": "box", "lower": [-1.0, -1.0, 0.0], "upper": [1.0, 1.0, 1.0]},
        "hyperparameter_reoptimization_cadence": 0,
        "seed": 3
    }"#;
    let config = BoConfig::from_json_str(json).unwrap();
    assert_eq!(BoConfig::from_json_str(&config.to_json_string().unwrap()).unwrap(), config);

    let objective = |x: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(x[2]) };
    let mut controller = BoController::<Sphere, _>::new(config.clone(), objective).unwrap();
    let result = controller.run().unwrap();

    assert_eq!(result.num_evaluations(), 4);
    assert!(result.iterations.iter().all(|r| !r.hyperparameters_updated));
    assert_eq!(result.hyperparameters, config.initial_hyperparameters);
    let bounds = config.domain_bounds.as_ref();
    for observation in &result.observations {
        assert!(controller.manifold().is_feasible(&observation.point, bounds).unwrap());
    }
}

#[test]
fn test_mismatched_manifold_kind_is_rejected() {
    let objective = |_: &DMatrix<f64>| -> Result<f64, ObjectiveError> { Ok(0.0) };
    let config = BoConfig::new(ManifoldKind::Sphere, 3);
    assert!(matches!(
        BoController::<Spd, _>::new(config, objective),
        Err(BoError::InvalidConfiguration { .. })
    ));
}

#[test]
fn test_spd_run_stays_in_the_eigenvalue_bounds() {
    let bounds = DomainBounds::new_eigenvalue(0.2, 5.0).unwrap();
    let config = quick_config(ManifoldKind::Spd, 2)
        .with_domain_bounds(bounds.clone())
        .with_iteration_budget(3);
    let target = DMatrix::from_row_slice(2, 2, &[2.0, 0.5, 0.5, 1.0]);
    let objective =
        move |x: &DMatrix<f64>| -> Result<f64, ObjectiveError> { Ok((x - &target).norm_squared()) };
    let mut controller = BoController::<Spd, _>::new(config, objective).unwrap();
    let result = controller.run().unwrap();

    assert_eq!(result.num_evaluations(), 6);
    let spd = controller.manifold();
    for observation in &result.observations {
        assert!(spd.is_point_on_manifold(&observation.point, 1e-8));
        assert!(spd.in_domain(&observation.point, &bounds).unwrap());
    }
    let best = result.best_value().unwrap();
    assert!(result.observations.iter().all(|o| o.value >= best));
}

#[test]
fn test_result_serializes_to_json() {
    let objective = |x: &DVector<f64>| -> Result<f64, ObjectiveError> { Ok(x[0] * x[1]) };
    let config = quick_config(ManifoldKind::Sphere, 3).with_iteration_budget(1);
    let result = BoController::<Sphere, _>::new(config, objective)
        .unwrap()
        .run()
        .unwrap();
    let json = serde_json::to_string(&result).unwrap();
    let back: BoResult<DVector<f64>> = serde_json::from_str(&json).unwrap();
    assert_eq!(back.observations.len(), result.observations.len());
    assert_eq!(back.best_value(), result.best_value());
}
