use super::*;
use crate::solver::{desaturate, solve};

#[test]
fn draws_replay_exactly() {
    let tok = ReplayToken::new(42, 7);
    let cfg = GeneratorCfg::default();
    assert_eq!(draw_generators(cfg, tok), draw_generators(cfg, tok));
    assert_ne!(draw_generators(cfg, tok), draw_generators(cfg, tok.next()));
    assert_eq!(draw_direction(100.0, tok), draw_direction(100.0, tok));
}

#[test]
fn generators_are_forces_with_their_moments() {
    let cfg = GeneratorCfg {
        count: GeneratorCount::Uniform { min: 3, max: 9 },
        force_scale: 2.0,
        arm: 50.0,
        range: RangeKind::Mixed,
    };
    for index in 0..20 {
        let gens = draw_generators(cfg, ReplayToken::new(1, index));
        assert!((3..=9).contains(&gens.len()));
        for g in &gens {
            let f = g.force_and_torque.translation;
            let t = g.force_and_torque.rotation;
            assert!((f.norm() - 2.0).abs() < 1e-12);
            // A moment is perpendicular to its force.
            assert!(f.dot(&t).abs() < 1e-9);
            assert!(t.norm() <= 2.0 * 50.0 * 3f64.sqrt() + 1e-9);
            assert!(g.range_min == 0.0 || g.range_min == -1.0);
            assert_eq!(g.range_max, 1.0);
        }
    }
}

#[test]
fn one_sided_and_armless_sets() {
    let cfg = GeneratorCfg {
        count: GeneratorCount::Fixed(0),
        arm: 0.0,
        range: RangeKind::OneSided,
        ..GeneratorCfg::default()
    };
    let gens = draw_generators(cfg, ReplayToken::new(3, 0));
    assert_eq!(gens.len(), 1);
    assert_eq!(gens[0].range_min, 0.0);
    assert_eq!(gens[0].force_and_torque.rotation, Vector3::zeros());
}

#[test]
fn directions_are_scaled_units() {
    for index in 0..20 {
        let d = draw_direction(100.0, ReplayToken::new(9, index));
        assert!((d.translation.norm_squared() + d.rotation.norm_squared() / 1e4 - 1.0).abs() < 1e-9);
    }
}

#[test]
fn random_sets_solve_to_valid_drives() {
    let tok = ReplayToken::new(5, 0);
    let gens = draw_generators(GeneratorCfg::default(), tok);
    let column = solve(&gens, draw_direction(100.0, tok), 200).unwrap();
    for (g, x) in gens.iter().zip(&column.input_coefficients) {
        assert!(x.is_finite());
        assert!(*x >= g.range_min - 1e-12 && *x <= g.range_max + 1e-12);
    }
    let fixed = desaturate(&gens, &column.input_coefficients).unwrap();
    assert_eq!(fixed.len(), gens.len());
}
