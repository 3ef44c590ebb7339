//! Seeded random actuator sets and drive directions.
//!
//! Purpose
//! - Reproducible solver inputs for property tests, benches and the CLI.
//!
//! Model
//! - A generator is a force of magnitude `force_scale` along a random unit
//!   direction, applied at a random point in the cube `[-arm, arm]^3`; its
//!   torque is the moment about the origin. Ranges are `[-1, 1]` (reversible
//!   actuators) or `[0, 1]` (thrusters).
//! - Determinism uses a replay token `(seed, index)` mixed into one RNG, so
//!   draw `k` of a stream can be regenerated alone.

use ::rand::rngs::StdRng;
use ::rand::{Rng, SeedableRng};
use nalgebra::Vector3;

use crate::six_dof::SixDofVector;
use crate::solver::ForceGenerator;

/// Replay token to make draws reproducible and indexable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReplayToken {
    pub seed: u64,
    pub index: u64,
}

impl ReplayToken {
    pub fn new(seed: u64, index: u64) -> Self {
        Self { seed, index }
    }

    /// Token for the next draw of the same stream.
    #[inline]
    pub fn next(self) -> Self {
        Self {
            index: self.index.wrapping_add(1),
            ..self
        }
    }

    #[inline]
    fn to_std_rng(self) -> StdRng {
        // SplitMix64 finalizer.
        fn mix(mut x: u64) -> u64 {
            x ^= x >> 30;
            x = x.wrapping_mul(0xbf58476d1ce4e5b9);
            x ^= x >> 27;
            x = x.wrapping_mul(0x94d049bb133111eb);
            x ^ (x >> 31)
        }
        let k = mix(self.seed ^ mix(self.index.wrapping_add(0x9e3779b97f4a7c15)));
        StdRng::seed_from_u64(k)
    }
}

/// How many generators a draw produces.
#[derive(Clone, Copy, Debug)]
pub enum GeneratorCount {
    Fixed(usize),
    Uniform { min: usize, max: usize },
}

impl GeneratorCount {
    fn sample<R: Rng>(&self, rng: &mut R) -> usize {
        match *self {
            GeneratorCount::Fixed(n) => n.max(1),
            GeneratorCount::Uniform { min, max } => {
                let lo = min.max(1);
                let hi = max.max(lo);
                rng.gen_range(lo..=hi)
            }
        }
    }
}

/// Drive range of drawn generators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RangeKind {
    /// `[-1, 1]`.
    Symmetric,
    /// `[0, 1]`.
    OneSided,
    /// Each generator picks one of the two with equal odds.
    Mixed,
}

#[derive(Clone, Copy, Debug)]
pub struct GeneratorCfg {
    pub count: GeneratorCount,
    pub force_scale: f64,
    /// Half-size of the cube the application points are drawn from.
    pub arm: f64,
    pub range: RangeKind,
}

impl Default for GeneratorCfg {
    fn default() -> Self {
        Self {
            count: GeneratorCount::Fixed(12),
            force_scale: 1.0,
            arm: 100.0,
            range: RangeKind::Symmetric,
        }
    }
}

/// Uniform direction on the unit sphere (rejection from the unit ball).
pub(crate) fn unit_vector<R: Rng>(rng: &mut R) -> Vector3<f64> {
    loop {
        let v = Vector3::<f64>::new(
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
            rng.gen_range(-1.0..=1.0),
        );
        let n2 = v.norm_squared();
        if n2 > 1e-6 && n2 <= 1.0 {
            return v / n2.sqrt();
        }
    }
}

/// Draw a generator set.
pub fn draw_generators(cfg: GeneratorCfg, tok: ReplayToken) -> Vec<ForceGenerator> {
    let mut rng = tok.to_std_rng();
    let n = cfg.count.sample(&mut rng);
    let arm = cfg.arm.abs();
    (0..n)
        .map(|_| {
            let force = unit_vector(&mut rng) * cfg.force_scale;
            let at = if arm > 0.0 {
                Vector3::new(
                    rng.gen_range(-arm..=arm),
                    rng.gen_range(-arm..=arm),
                    rng.gen_range(-arm..=arm),
                )
            } else {
                Vector3::zeros()
            };
            let one_sided = match cfg.range {
                RangeKind::Symmetric => false,
                RangeKind::OneSided => true,
                RangeKind::Mixed => rng.gen_bool(0.5),
            };
            let range_min = if one_sided { 0.0 } else { -1.0 };
            ForceGenerator::new(SixDofVector::new(force, at.cross(&force)), range_min, 1.0)
        })
        .collect()
}

/// Unit 6‑DOF direction whose rotation part is scaled by `rotation_scale`
/// afterwards (torques are usually much larger than forces).
pub fn draw_direction(rotation_scale: f64, tok: ReplayToken) -> SixDofVector {
    let mut rng = tok.to_std_rng();
    loop {
        let c: [f64; 6] = std::array::from_fn(|_| rng.gen_range(-1.0..=1.0));
        let v = SixDofVector::from_array(c);
        if let Some(unit) = v.try_normalize(1e-3) {
            return SixDofVector::new(unit.translation, unit.rotation * rotation_scale);
        }
    }
}

#[cfg(test)]
mod tests;
