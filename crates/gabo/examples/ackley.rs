//! Example: Bayesian optimization of the Ackley function on manifolds
//!
//! The Ackley function is defined on the tangent space at a base point and
//! pulled back to the manifold with the logarithm map, so its global minimum
//! sits at the base point. The example runs the optimization loop on the
//! sphere S^2 and on 2x2 SPD matrices and prints what it found.
//!
//! Set `RUST_LOG=gabo=debug` for a detailed trace of every iteration.

use gabo::prelude::*;
use tracing_subscriber::EnvFilter;

/// Ackley function on R^d.
fn ackley(z: &DVector<f64>) -> f64 {
    let (a, b, c) = (20.0, 0.2, 2.0 * std::f64::consts::PI);
    let d = z.len() as f64;
    let mean_square = z.norm_squared() / d;
    let mean_cos = z.iter().map(|zi| (c * zi).cos()).sum::<f64>() / d;
    -a * (-b * mean_square.sqrt()).exp() - mean_cos.exp() + a + std::f64::consts::E
}

/// Ackley function composed with the logarithm map at `base`.
fn pulled_back_ackley<M: Manifold>(
    manifold: M,
    base: M::Point,
) -> impl FnMut(&M::Point) -> Result<f64, ObjectiveError> {
    move |x: &M::Point| -> Result<f64, ObjectiveError> {
        let coordinates = manifold
            .log_map(&base, x)
            .and_then(|v| manifold.tangent_coordinates(&base, &v))
            .map_err(|e| ObjectiveError::new(e.to_string()))?;
        Ok(ackley(&coordinates))
    }
}

fn report<P: std::fmt::Debug>(title: &str, result: &BoResult<P>) {
    println!("✅ {title}");
    println!("   • Evaluations: {} ({} initial)", result.num_evaluations(), result.num_initial);
    if let Some(best) = &result.best {
        println!("   • Best value: {:.6}", best.value);
        println!("   • Best point: {:?}", best.point);
    }
    println!(
        "   • Final hyperparameters: σ² = {:.4}, ℓ = {:.4}, noise = {:.2e}",
        result.hyperparameters.signal_variance,
        result.hyperparameters.length_scale,
        result.noise_variance
    );
    let resampled = result.iterations.iter().filter(|r| r.resampled).count();
    println!("   • Resampled candidates: {resampled}\n");
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gabo=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    println!("🌐 Geometry-aware Bayesian optimization of the Ackley function");
    println!("==============================================================\n");

    // Sphere S^2, minimum at the north pole
    let sphere = Sphere::new(3)?;
    let north = DVector::from_vec(vec![0.0, 0.0, 1.0]);
    let config = BoConfig::new(ManifoldKind::Sphere, 3)
        .with_kernel_family(KernelFamily::Laplace)
        .with_initial_design(5)
        .with_iteration_budget(25)
        .with_seed(2024);
    let mut controller =
        BoController::<Sphere, _>::new(config, pulled_back_ackley(sphere.clone(), north.clone()))?;
    let result = controller.run()?;
    report("Sphere S^2", &result);
    if let Some(best) = result.best_point() {
        println!("   • Distance to the optimum: {:.4}\n", sphere.distance(best, &north)?);
    }

    // SPD(2) with eigenvalues in [0.1, 5], minimum at the identity
    let spd = Spd::new(2)?;
    let identity = DMatrix::identity(2, 2);
    let config = BoConfig::new(ManifoldKind::Spd, 2)
        .with_kernel_family(KernelFamily::Laplace)
        .with_domain_bounds(DomainBounds::new_eigenvalue(0.1, 5.0)?)
        .with_initial_design(5)
        .with_iteration_budget(25)
        .with_seed(2024);
    let mut controller =
        BoController::<Spd, _>::new(config, pulled_back_ackley(spd.clone(), identity.clone()))?;
    let result = controller.run()?;
    report("SPD(2)", &result);
    if let Some(best) = result.best_point() {
        println!("   • Distance to the optimum: {:.4}", spd.distance(best, &identity)?);
    }

    Ok(())
}
