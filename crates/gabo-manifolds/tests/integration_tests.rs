//! Integration tests for gabo-manifolds
//!
//! These tests check the manifold laws the optimizer relies on, for random
//! points and tangent vectors on both manifolds.

use approx::assert_relative_eq;
use gabo_core::{bounds::DomainBounds, manifold::Manifold, types::DVector};
use gabo_manifolds::{Spd, Sphere};
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

/// Tangent vector at `p` with the given coordinates, rescaled to length `len`.
fn scaled_tangent<M: Manifold>(m: &M, p: &M::Point, coords: &[f64], len: f64) -> M::TangentVector {
    let mut c = DVector::from_column_slice(coords);
    if c.norm() < 1e-3 {
        c.fill(0.0);
        c[0] = 1.0;
    }
    m.tangent_from_coordinates(p, &(c.normalize() * len)).unwrap()
}

fn check_laws<M: Manifold>(m: &M, seed: u64, coords: &[f64], len: f64, tol: f64) {
    let mut rng = StdRng::seed_from_u64(seed);
    let p = m.random_point(&mut rng, None).unwrap();
    let q = m.random_point(&mut rng, None).unwrap();
    assert!(m.is_point_on_manifold(&p, 1e-10));
    assert_eq!(m.distance(&p, &p).unwrap(), 0.0);

    // Symmetry
    let d_pq = m.distance(&p, &q).unwrap();
    let d_qp = m.distance(&q, &p).unwrap();
    assert!(d_pq >= 0.0);
    assert_relative_eq!(d_pq, d_qp, epsilon = tol);

    // exp then log
    let v = scaled_tangent(m, &p, coords, len);
    let moved = m.exp_map(&p, &v).unwrap();
    assert!(m.is_point_on_manifold(&moved, 1e-10));
    assert_eq!(m.distance(&moved, &moved).unwrap(), 0.0);
    let back = m.log_map(&p, &moved).unwrap();
    let back_coords = m.tangent_coordinates(&p, &back).unwrap();
    let v_coords = m.tangent_coordinates(&p, &v).unwrap();
    assert_relative_eq!(back_coords, v_coords, epsilon = tol);
    assert_relative_eq!(m.distance(&p, &moved).unwrap(), len, epsilon = tol);

    // Retraction lands on the manifold
    let retracted = m.retract(&p, &v).unwrap();
    assert!(m.is_point_on_manifold(&retracted, 1e-10));
}

proptest! {
    #[test]
    fn sphere_laws(seed in any::<u64>(), coords in prop::collection::vec(-1.0f64..1.0, 3), len in 0.01f64..2.5) {
        let sphere = Sphere::new(4).unwrap();
        check_laws(&sphere, seed, &coords, len, 1e-8);
    }

    #[test]
    fn spd_laws(seed in any::<u64>(), coords in prop::collection::vec(-1.0f64..1.0, 6), len in 0.01f64..2.0) {
        let spd = Spd::new(3).unwrap();
        check_laws(&spd, seed, &coords, len, 1e-6);
    }

    #[test]
    fn sphere_distance_matches_logarithm_for_nearby_points(
        seed in any::<u64>(),
        coords in prop::collection::vec(-1.0f64..1.0, 3),
        exponent in -9.0f64..-3.0,
    ) {
        let sphere = Sphere::new(4).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let p = sphere.random_point(&mut rng, None).unwrap();
        let len = 10f64.powf(exponent);
        let q = sphere.exp_map(&p, &scaled_tangent(&sphere, &p, &coords, len)).unwrap();
        prop_assume!(p != q);

        let distance = sphere.distance(&p, &q).unwrap();
        let log_norm = sphere.log_map(&p, &q).unwrap().norm();
        prop_assert!(distance > 0.0);
        prop_assert!((distance - log_norm).abs() <= 1e-6 * log_norm);
        prop_assert!((distance - len).abs() <= 1e-5 * len);
    }

    #[test]
    fn bounded_spd_samples_stay_in_domain(seed in any::<u64>(), lo in 0.001f64..1.0, width in 0.0f64..5.0) {
        let spd = Spd::new(3).unwrap();
        let bounds = DomainBounds::new_eigenvalue(lo, lo + width).unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let p = spd.random_point(&mut rng, Some(&bounds)).unwrap();
        prop_assert!(spd.is_point_on_manifold(&p, 1e-10));
        prop_assert!(spd.in_domain(&p, &bounds).unwrap());
    }
}

#[test]
fn test_antipodal_points() {
    let sphere = Sphere::new(3).unwrap();
    let p = DVector::from_vec(vec![0.6, 0.8, 0.0]);
    let err = sphere.log_map(&p, &(-&p)).unwrap_err();
    assert!(err.is_geometry_domain());

    // Slightly off the antipode the logarithm is defined again
    let near = sphere.project_point(&DVector::from_vec(vec![-0.6, -0.8, 1e-3]));
    let v = sphere.log_map(&p, &near).unwrap();
    assert!(sphere.is_vector_in_tangent_space(&p, &v, 1e-9));
}

#[test]
fn test_spd_exp_at_identity_is_matrix_exp() {
    let spd = Spd::new(2).unwrap();
    let i = nalgebra::DMatrix::identity(2, 2);
    let v = nalgebra::DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, -1.0]));
    let e = spd.exp_map(&i, &v).unwrap();
    assert_relative_eq!(e[(0, 0)], std::f64::consts::E, epsilon = 1e-12);
    assert_relative_eq!(e[(1, 1)], 1.0 / std::f64::consts::E, epsilon = 1e-12);
}
