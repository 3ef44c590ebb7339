//! Criterion microbenches for the force-allocation solver.
//!
//! - Full solves on the 12-generator test cube (6 basis directions).
//! - Random generator sets of growing size (descent cost scales with n²).
//! - Hot-path pieces: gradient and desaturation.
//!
//! Results live under `target/criterion`.

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use nalgebra::vector;
use noxel::api::{
    compute_gradient, desaturate, draw_direction, draw_generators, make_test_cube, solve,
    GeneratorCfg, GeneratorCount, GeneratorReplay, ScoreMode, SixDofVector,
};

fn bench_cube(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver_cube");
    let gens = make_test_cube(vector![80.0, 100.0, 120.0]);
    for iterations in [100usize, 1_000] {
        group.bench_function(BenchmarkId::new("six_directions", iterations), |b| {
            b.iter(|| {
                for i in 0..6 {
                    let dir = SixDofVector::axis(i, if i >= 3 { 100.0 } else { 1.0 });
                    let _ = solve(&gens, dir, iterations);
                }
            })
        });
    }
    group.finish();
}

fn bench_random_sets(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver_random");
    for n in [6usize, 12, 24] {
        let cfg = GeneratorCfg {
            count: GeneratorCount::Fixed(n),
            ..GeneratorCfg::default()
        };
        group.bench_function(BenchmarkId::new("solve_200", n), |b| {
            b.iter_batched(
                || {
                    let tok = GeneratorReplay::new(11, n as u64);
                    (draw_generators(cfg, tok), draw_direction(100.0, tok))
                },
                |(gens, dir)| {
                    let _ = solve(&gens, dir, 200);
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_hot_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("solver_hot_path");
    let gens = make_test_cube(vector![80.0, 100.0, 120.0]);
    let column = noxel::api::DriveColumn::new(SixDofVector::axis(0, 1.0), vec![0.0; gens.len()]);
    let widths = vec![0.25; gens.len()];
    group.bench_function("compute_gradient", |b| {
        b.iter(|| compute_gradient(&gens, &column, &widths, ScoreMode::InverseDistance))
    });
    let inputs: Vec<f64> = (0..gens.len()).map(|i| (i as f64 - 6.0) * 0.7).collect();
    group.bench_function("desaturate", |b| b.iter(|| desaturate(&gens, &inputs)));
    group.finish();
}

criterion_group!(benches, bench_cube, bench_random_sets, bench_hot_path);
criterion_main!(benches);
