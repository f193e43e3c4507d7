//! Benchmarks for surrogate fitting and prediction
//!
//! Run with: cargo bench -p gabo-gp

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use gabo_core::manifold::Manifold;
use gabo_gp::prelude::*;
use gabo_manifolds::{Spd, Sphere};
use rand::{rngs::StdRng, SeedableRng};

fn sphere_data(sphere: &Sphere, n: usize) -> Dataset<nalgebra::DVector<f64>> {
    let mut rng = StdRng::seed_from_u64(42);
    let mut data = Dataset::new();
    for _ in 0..n {
        let p = sphere.random_point(&mut rng, None).unwrap();
        let value = p[0] * p[1] - p[2];
        data.push(p, value).unwrap();
    }
    data
}

fn benchmark_sphere_surrogate(c: &mut Criterion) {
    let mut group = c.benchmark_group("sphere_surrogate");

    for &n in &[10, 40, 100] {
        let sphere = Sphere::new(4).unwrap();
        let data = sphere_data(&sphere, n);
        let kernel = GeometryKernel::new(sphere.clone(), KernelFamily::Laplace, 0).unwrap();
        let mut gp = GaussianProcess::new(kernel, KernelHyperparameters::default(), 1e-6).unwrap();

        group.bench_with_input(BenchmarkId::new("fit", n), &n, |b, _| {
            b.iter(|| gp.fit(black_box(&data)).unwrap());
        });

        gp.fit(&data).unwrap();
        let query = sphere.random_point(&mut StdRng::seed_from_u64(7), None).unwrap();
        group.bench_with_input(BenchmarkId::new("posterior", n), &n, |b, _| {
            b.iter(|| gp.posterior(black_box(&query)).unwrap());
        });

        let config = HyperparameterSearchConfig::new().with_max_iterations(20);
        group.bench_with_input(BenchmarkId::new("hyperparameters", n), &n, |b, _| {
            let mut rng = StdRng::seed_from_u64(1);
            let mut model = gp.clone();
            b.iter(|| model.optimize_hyperparameters(black_box(&data), &config, &mut rng).unwrap());
        });
    }

    group.finish();
}

fn benchmark_spd_surrogate(c: &mut Criterion) {
    let mut group = c.benchmark_group("spd_surrogate");

    for &n in &[10, 40] {
        let spd = Spd::new(3).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let mut data = Dataset::new();
        for _ in 0..n {
            let p = spd.random_point(&mut rng, None).unwrap();
            let value = p.determinant().ln();
            data.push(p, value).unwrap();
        }
        let kernel = GeometryKernel::new(spd, KernelFamily::Gaussian, 0).unwrap();
        let mut gp = GaussianProcess::new(kernel, KernelHyperparameters::default(), 1e-6).unwrap();

        group.bench_with_input(BenchmarkId::new("fit", n), &n, |b, _| {
            b.iter(|| gp.fit(black_box(&data)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(benches, benchmark_sphere_surrogate, benchmark_spd_surrogate);
criterion_main!(benches);
