//! Solver tests: the cube scenario, search invariants, desaturation, jobs.

use std::time::Duration;

use nalgebra::{vector, Vector3};
use proptest::prelude::*;

use super::*;
use crate::error::SolverError;
use crate::six_dof::SixDofVector;

fn cube() -> Vec<ForceGenerator> {
    make_test_cube(vector![80.0, 100.0, 120.0])
}

/// Basis direction `i`; rotation axes scaled so torque and force weigh alike.
fn basis(i: usize) -> SixDofVector {
    SixDofVector::axis(i, if i >= 3 { 100.0 } else { 1.0 })
}

fn assert_dominates(out: &SixDofVector, i: usize) {
    let want = basis(i).component(i);
    assert!(
        out.component(i) > 0.9 * want,
        "axis {i}: output {out} does not reach {want}"
    );
    for j in (0..6).filter(|&j| j != i) {
        assert!(
            out.component(j).abs() < 0.1 * want,
            "axis {i}: off-axis component {j} too large in {out}"
        );
    }
}

#[test]
fn test_cube_has_twelve_edges_with_balanced_moments() {
    let gens = cube();
    assert_eq!(gens.len(), 12);
    let total = gens
        .iter()
        .fold(SixDofVector::zeros(), |acc, g| acc + g.force_and_torque);
    // Four edges per axis, moments cancel pairwise.
    assert!((total.translation - Vector3::new(4.0, 4.0, 4.0)).norm() < 1e-12);
    assert!(total.rotation.norm() < 1e-9);
    assert!(gens.iter().all(|g| g.range_min == -1.0 && g.range_max == 1.0));
}

#[test]
fn cube_basis_directions_sync() {
    let gens = cube();
    for i in 0..6 {
        let col = solve(&gens, basis(i), 50).unwrap();
        assert_eq!(col.input_coefficients.len(), 12);
        assert_eq!(col.optimised_direction, basis(i));
        let out = output_vector(&gens, &col, false);
        assert_dominates(&out, i);
        assert!(score(&basis(i), &out) > 0.99);
    }
}

#[test]
fn cube_basis_directions_pool() {
    let gens = cube();
    let mut pool = SolverPool::new(SolverCfg::default());
    for i in 0..6 {
        let idx = pool.start_solve(&gens, basis(i), 10_000).unwrap();
        assert_eq!(idx, i);
    }
    assert_eq!(pool.len(), 6);
    for i in 0..6 {
        while !pool.is_done(i).unwrap() {
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!((pool.progress(i).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(pool.iteration(i).unwrap(), 10_000 * 12);
        let col = pool.output(i).unwrap();
        let out = output_vector(&gens, &col, true);
        assert_dominates(&out, i);
    }
    assert!(matches!(
        pool.output(6),
        Err(SolverError::UnknownRunner(6))
    ));
    pool.clear();
    assert!(pool.is_empty());
}

#[test]
fn best_score_is_non_decreasing() {
    let gens = cube();
    let desired = SixDofVector::from_array([0.5, -0.3, 0.2, 10.0, 0.0, -20.0]);
    let mut d = Descent::new(&gens, desired, SolverCfg::with_iterations(20));
    let mut last = d.best().1;
    while d.iteration() < d.planned() {
        d.step();
        let now = d.best().1;
        assert!(now >= last, "best score dropped from {last} to {now}");
        last = now;
    }
    assert_eq!(d.iteration(), 20 * 12);
}

#[test]
fn binomial_initial_state_is_midpoint_and_quarter_width() {
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 3.0),
        ForceGenerator::new(SixDofVector::axis(1, 1.0), -2.0, 2.0),
    ];
    let d = Descent::new(&gens, SixDofVector::axis(0, 1.0), SolverCfg::with_iterations(4));
    assert_eq!(d.state().input_coefficients, vec![1.0, 0.0]);
    assert_eq!(d.widths(), &[1.0, 1.0]);
    assert_eq!(d.planned(), 8);
}

#[test]
fn step_moves_only_the_steepest_axis_and_halves_its_width() {
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 1.0),
        ForceGenerator::new(SixDofVector::axis(1, 1.0), -1.0, 1.0),
    ];
    // Only the second axis improves the score.
    let desired = SixDofVector::axis(1, 1.0);
    let mut d = Descent::new(&gens, desired, SolverCfg::with_iterations(10));
    d.step();
    assert_eq!(d.state().input_coefficients, vec![0.0, 0.5]);
    assert_eq!(d.widths(), &[0.5, 0.25]);
}

#[test]
fn degenerate_range_stays_fixed_without_nan() {
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 1.0), 0.5, 0.5),
        ForceGenerator::new(SixDofVector::axis(1, 1.0), -1.0, 1.0),
    ];
    let col = solve(&gens, SixDofVector::axis(1, 0.7), 40).unwrap();
    assert_eq!(col.input_coefficients[0], 0.5);
    assert!(col.input_coefficients.iter().all(|c| c.is_finite()));
    assert!((col.input_coefficients[1] - 0.7).abs() < 1e-6);
}

#[test]
fn preconditions_are_rejected() {
    assert_eq!(
        solve(&[], SixDofVector::zeros(), 10),
        Err(SolverError::EmptyGenerators)
    );
    assert_eq!(
        solve(&cube(), SixDofVector::zeros(), 0),
        Err(SolverError::ZeroIterations)
    );
    let cfg = SolverCfg {
        method: SolveMethod::Exhaustive { cuts: 0 },
        ..SolverCfg::default()
    };
    assert_eq!(
        validate_inputs(&cube(), &cfg),
        Err(SolverError::ZeroCuts)
    );
    let mut pool = SolverPool::default();
    assert!(pool.start_solve(&[], SixDofVector::zeros(), 10).is_err());
    assert!(pool.is_empty());
}

#[test]
fn stopped_job_returns_best_so_far() {
    let gens: std::sync::Arc<[ForceGenerator]> = cube().into();
    let mut job = SolveJob::spawn(
        gens.clone(),
        basis(0),
        SolverCfg::with_iterations(usize::MAX / 64),
    )
    .unwrap();
    std::thread::sleep(Duration::from_millis(20));
    let col = job.output();
    assert!(job.is_done());
    assert!(job.progress() < 1.0);
    assert_eq!(col.input_coefficients.len(), 12);
    assert!(col.input_coefficients.iter().all(|c| c.is_finite()));
    // Retrieval is repeatable once joined.
    assert_eq!(job.output(), col);
}

#[test]
fn fixed_epsilon_improves_on_start() {
    let gens = cube();
    let desired = basis(2);
    let cfg = SolverCfg {
        max_iterations: 200,
        method: SolveMethod::FixedEpsilon,
        score: ScoreMode::InverseDistance,
    };
    let start = score(&desired, &SixDofVector::zeros());
    let col = solve_with(&gens, desired, cfg, &SolveProgress::default()).unwrap();
    let end = score(&desired, &output_vector(&gens, &col, false));
    assert!(end > start);
}

#[test]
fn fixed_epsilon_stops_at_range_bounds() {
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 1.0),
        ForceGenerator::new(SixDofVector::axis(1, 1.0), -1.0, 1.0),
    ];
    // Out of reach: the second drive runs into its bound and must stay there.
    let desired = SixDofVector::axis(1, 5.0);
    let cfg = SolverCfg {
        max_iterations: 100,
        method: SolveMethod::FixedEpsilon,
        score: ScoreMode::InverseDistance,
    };
    let col = solve_with(&gens, desired, cfg, &SolveProgress::default()).unwrap();
    for (g, c) in gens.iter().zip(&col.input_coefficients) {
        assert!(*c >= g.range_min && *c <= g.range_max, "{c} outside {g}");
    }
    assert_eq!(col.input_coefficients[0], 0.0);
    assert!((col.input_coefficients[1] - 1.0).abs() < 1e-9);
}

#[test]
fn step_skips_axes_pinned_at_their_bound() {
    // The first drive starts at its maximum and has the steeper gradient.
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 10.0), -1.0, 0.0),
        ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 1.0),
    ];
    let cfg = SolverCfg {
        max_iterations: 4,
        method: SolveMethod::FixedEpsilon,
        score: ScoreMode::InverseDistance,
    };
    let mut d = Descent::new(&gens, SixDofVector::axis(0, 1.0), cfg);
    assert_eq!(d.widths(), &[0.125, 0.25]);
    d.step();
    assert_eq!(d.state().input_coefficients, vec![0.0, 0.25]);
}

#[test]
fn exhaustive_grid_finds_best_sample() {
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 1.0),
        ForceGenerator::new(SixDofVector::axis(1, 1.0), -1.0, 1.0),
    ];
    let cfg = SolverCfg {
        max_iterations: 1,
        method: SolveMethod::Exhaustive { cuts: 4 },
        score: ScoreMode::InverseDistance,
    };
    let desired = SixDofVector::from_array([0.5, -0.5, 0.0, 0.0, 0.0, 0.0]);
    let progress = SolveProgress::default();
    let col = solve_with(&gens, desired, cfg, &progress).unwrap();
    // Samples are {-1, -0.5, 0, 0.5}.
    assert_eq!(col.input_coefficients, vec![0.5, -0.5]);
    assert_eq!(progress.iteration(), 16);
    assert!((progress.fraction() - 1.0).abs() < 1e-12);
    assert!(progress.is_done());
}

#[test]
fn legacy_score_prefers_on_axis_output() {
    let desired = SixDofVector::axis(0, 1.0);
    let on_axis = SixDofVector::axis(0, 1.0);
    let off_axis = SixDofVector::from_array([1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
    let mode = ScoreMode::WantedOverUnwanted;
    assert!(score_with(mode, &desired, &on_axis) > score_with(mode, &desired, &off_axis));
    assert!((score_with(mode, &desired, &on_axis) - 1.0).abs() < 1e-12);
    assert!((score_with(ScoreMode::InverseDistance, &desired, &on_axis) - 1.0).abs() < 1e-12);
}

#[test]
fn output_vector_saturation_clamps_drives() {
    let gens = vec![ForceGenerator::new(SixDofVector::axis(0, 2.0), -1.0, 1.0)];
    let col = DriveColumn::new(SixDofVector::zeros(), vec![3.0]);
    assert_eq!(output_vector(&gens, &col, false).translation.x, 6.0);
    assert_eq!(output_vector(&gens, &col, true).translation.x, 2.0);
}

#[test]
fn gradient_points_toward_target() {
    let gens = vec![ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 1.0)];
    let col = DriveColumn::new(SixDofVector::axis(0, 1.0), vec![0.0]);
    let g = compute_gradient(&gens, &col, &[0.1], ScoreMode::InverseDistance);
    assert!(g[0] > 0.0);
}

#[test]
fn desaturate_scales_uniformly() {
    let gens = vec![
        ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 1.0),
        ForceGenerator::new(SixDofVector::axis(1, 1.0), -2.0, 2.0),
    ];
    let out = desaturate(&gens, &[4.0, 1.0]).unwrap();
    assert!((out[0] - 1.0).abs() < 1e-12);
    assert!((out[1] - 0.25).abs() < 1e-12);
    let out = desaturate(&gens, &[0.5, -6.0]).unwrap();
    assert!((out[0] - 0.5 / 3.0).abs() < 1e-12);
    assert!((out[1] + 2.0).abs() < 1e-12);
    // Already valid: unchanged.
    assert_eq!(desaturate(&gens, &[0.3, -1.5]).unwrap(), vec![0.3, -1.5]);
}

#[test]
fn desaturate_guards_degenerate_bounds() {
    let gens = vec![ForceGenerator::new(SixDofVector::axis(0, 1.0), -1.0, 0.0)];
    assert_eq!(
        desaturate(&gens, &[0.5]),
        Err(SolverError::DegenerateRange { index: 0 })
    );
    assert_eq!(desaturate(&gens, &[-0.5]).unwrap(), vec![-0.5]);
    assert!(matches!(
        desaturate(&gens, &[0.1, 0.2]),
        Err(SolverError::LengthMismatch { .. })
    ));
}

#[test]
fn drive_matrix_combines_columns() {
    let m = DriveMatrix::new(vec![
        DriveColumn::new(SixDofVector::axis(0, 1.0), vec![1.0, 0.0]),
        DriveColumn::new(SixDofVector::axis(3, 1.0), vec![0.5, -0.5]),
    ]);
    assert_eq!(m.output_values(&[2.0, 2.0]).unwrap(), vec![3.0, -1.0]);
    assert_eq!(m.output_values(&[0.0, 1.0]).unwrap(), vec![0.5, -0.5]);
    let v = m.input_vector(&[2.0, -1.0]).unwrap();
    assert_eq!(v.to_array(), [2.0, 0.0, 0.0, -1.0, 0.0, 0.0]);
    assert!(m.output_values(&[1.0]).is_err());
    assert!(format!("{m}").starts_with("0 T:"));
}

fn arb_generators_and_inputs() -> impl Strategy<Value = (Vec<ForceGenerator>, Vec<f64>)> {
    (1usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec((-5.0f64..-0.1, 0.1f64..5.0), n),
            prop::collection::vec(-50.0f64..50.0, n),
        )
            .prop_map(|(ranges, inputs)| {
                let gens = ranges
                    .into_iter()
                    .enumerate()
                    .map(|(i, (lo, hi))| ForceGenerator::new(SixDofVector::axis(i % 6, 1.0), lo, hi))
                    .collect();
                (gens, inputs)
            })
    })
}

proptest! {
    /// Desaturating twice equals desaturating once, and results respect ranges.
    #[test]
    fn desaturate_is_idempotent((gens, inputs) in arb_generators_and_inputs()) {
        let once = desaturate(&gens, &inputs).unwrap();
        let twice = desaturate(&gens, &once).unwrap();
        prop_assert_eq!(&once, &twice);
        for (g, x) in gens.iter().zip(&once) {
            prop_assert!(*x >= g.range_min && *x <= g.range_max);
        }
    }

    /// Proportions are preserved: all inputs share one scale factor.
    #[test]
    fn desaturate_preserves_ratios((gens, inputs) in arb_generators_and_inputs()) {
        let out = desaturate(&gens, &inputs).unwrap();
        let factor = inputs.iter().zip(&out)
            .filter(|(x, _)| x.abs() > 1e-6)
            .map(|(x, y)| x / y)
            .next();
        if let Some(f) = factor {
            prop_assert!(f >= 1.0 - 1e-9);
            for (x, y) in inputs.iter().zip(&out) {
                prop_assert!((x / f - y).abs() < 1e-9 * (1.0 + x.abs()));
            }
        }
    }
}
