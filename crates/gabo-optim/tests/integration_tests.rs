//! Integration tests for gabo-optim
//!
//! These tests run the multi-start trust-region optimizer on the sphere and
//! SPD manifolds with cost functions whose minimizers are known.

use approx::assert_relative_eq;
use gabo_core::{
    bounds::DomainBounds,
    cost_function::CostFunction,
    error::Result,
    manifold::Manifold,
    types::{DMatrix, DVector},
};
use gabo_manifolds::{Spd, Sphere};
use gabo_optim::{ManifoldOptimizer, ManifoldOptimizerConfig, TrustRegion, TrustRegionConfig};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Simple quadratic cost function on the sphere
#[derive(Debug)]
struct SphericalQuadratic {
    target: DVector,
}

impl CostFunction<Sphere> for SphericalQuadratic {
    fn cost(&self, x: &DVector) -> Result<f64> {
        Ok((x - &self.target).norm_squared())
    }
}

/// Squared affine-invariant distance to a target matrix
#[derive(Debug)]
struct SpdDistance {
    spd: Spd,
    target: DMatrix,
}

impl CostFunction<Spd> for SpdDistance {
    fn cost(&self, x: &DMatrix) -> Result<f64> {
        Ok(self.spd.distance(x, &self.target)?.powi(2))
    }
}

#[test]
fn test_trust_region_on_sphere() {
    let sphere = Sphere::new(3).unwrap();
    let target = DVector::from_vec(vec![1.0, 2.0, 2.0]) / 3.0;
    let cost_fn = SphericalQuadratic {
        target: target.clone(),
    };
    let x0 = DVector::from_vec(vec![1.0, 0.0, 0.0]);

    let tr = TrustRegion::new(TrustRegionConfig::default());
    let ctx = tr.optimize(&sphere, &cost_fn, x0, None).unwrap();

    assert!(sphere.is_point_on_manifold(&ctx.point, 1e-10));
    assert_relative_eq!(ctx.point, target, epsilon = 1e-4);
    assert!(ctx.accepted_steps > 0);
}

#[test]
fn test_multistart_on_sphere_with_box() {
    let sphere = Sphere::new(3).unwrap();
    // The unconstrained minimizer (0, 0, -1) lies outside the box
    let cost_fn = SphericalQuadratic {
        target: DVector::from_vec(vec![0.0, 0.0, -1.0]),
    };
    let bounds = DomainBounds::new_box(vec![-1.0, -1.0, 0.0], vec![1.0, 1.0, 1.0]).unwrap();
    let optimizer = ManifoldOptimizer::new(ManifoldOptimizerConfig::new().with_num_restarts(4));

    let best = optimizer
        .minimize(&sphere, &cost_fn, Some(&bounds), &[], 5)
        .unwrap();
    assert!(sphere.is_point_on_manifold(&best.point, 1e-10));
    assert!(sphere.in_domain(&best.point, &bounds).unwrap());
    // Best feasible points lie on the equator
    assert!(best.point[2].abs() < 1e-2);
}

#[test]
fn test_multistart_on_spd() {
    let spd = Spd::new(2).unwrap();
    let target = DMatrix::from_row_slice(2, 2, &[2.0, 0.3, 0.3, 0.5]);
    let cost_fn = SpdDistance {
        spd: spd.clone(),
        target: target.clone(),
    };
    let bounds = DomainBounds::new_eigenvalue(0.1, 5.0).unwrap();
    let optimizer = ManifoldOptimizer::new(ManifoldOptimizerConfig::new().with_num_restarts(3));

    let best = optimizer
        .minimize(&spd, &cost_fn, Some(&bounds), &[], 9)
        .unwrap();
    assert!(spd.in_domain(&best.point, &bounds).unwrap());
    assert!(spd.distance(&best.point, &target).unwrap() < 1e-3);
}

#[test]
fn test_anchor_seeds_first_restart() {
    let sphere = Sphere::new(3).unwrap();
    let target = DVector::from_vec(vec![0.0, 1.0, 0.0]);
    let cost_fn = SphericalQuadratic {
        target: target.clone(),
    };
    let optimizer = ManifoldOptimizer::new(
        ManifoldOptimizerConfig::new()
            .with_num_restarts(1)
            .with_trust_region(TrustRegionConfig::default().with_max_iterations(1)),
    );

    // Starting at the minimizer, the single step cannot improve on it
    let best = optimizer
        .minimize(&sphere, &cost_fn, None, &[target.clone()], 1)
        .unwrap();
    assert_eq!(best.restart, 0);
    assert_relative_eq!(best.point, target, epsilon = 1e-12);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn multistart_finds_any_sphere_target(
        coords in prop::collection::vec(-1.0f64..1.0, 3),
        seed in any::<u64>(),
    ) {
        let raw = DVector::from_vec(coords);
        prop_assume!(raw.norm() > 0.1);
        let target = raw.normalize();
        let sphere = Sphere::new(3).unwrap();
        let cost_fn = SphericalQuadratic { target: target.clone() };
        let optimizer = ManifoldOptimizer::new(ManifoldOptimizerConfig::new().with_num_restarts(2));

        let best = optimizer.minimize(&sphere, &cost_fn, None, &[], seed).unwrap();
        prop_assert!(sphere.is_point_on_manifold(&best.point, 1e-10));
        prop_assert!(sphere.distance(&best.point, &target).unwrap() < 1e-3);
    }
}
