//! Output assembly, scoring and gradients.
//!
//! All functions are pure; the search runners in `search.rs` compose them.

use nalgebra::Vector3;

use super::types::{DriveColumn, ForceGenerator, ScoreMode};
use crate::error::{SolverError, SolverResult};
use crate::six_dof::SixDofVector;
use crate::SMALL_NUMBER;

/// Sum of `generator[i].force_and_torque * drive[i]`.
///
/// With `with_saturation`, each drive is clamped to its generator's range first.
/// Extra entries on either side are ignored.
pub fn output_vector(
    generators: &[ForceGenerator],
    column: &DriveColumn,
    with_saturation: bool,
) -> SixDofVector {
    let mut out = SixDofVector::zeros();
    for (g, &c) in generators.iter().zip(&column.input_coefficients) {
        let drive = if with_saturation { g.saturate(c) } else { c };
        out += g.force_and_torque * drive;
    }
    out
}

/// Canonical score: `1 / (1 + distance)`; higher is closer, 1 is exact.
#[inline]
pub fn score(desired: &SixDofVector, produced: &SixDofVector) -> f64 {
    1.0 / (1.0 + SixDofVector::distance(desired, produced))
}

/// Score under the configured strategy.
pub fn score_with(mode: ScoreMode, desired: &SixDofVector, produced: &SixDofVector) -> f64 {
    match mode {
        ScoreMode::InverseDistance => score(desired, produced),
        ScoreMode::WantedOverUnwanted => wanted_over_unwanted(desired, produced),
    }
}

/// Legacy score. Axes where `desired` is non-zero are "wanted": their output
/// components add up in the numerator. Every other axis is "unwanted" and its
/// magnitude grows the denominator (which starts at 1). The ratio is then
/// scaled by the cosine between each non-zero desired sub-vector (translation,
/// rotation) and the output restricted to the wanted axes.
fn wanted_over_unwanted(desired: &SixDofVector, produced: &SixDofVector) -> f64 {
    let mut wanted = 0.0;
    let mut unwanted = 1.0;
    for i in 0..6 {
        if desired.component(i).abs() > SMALL_NUMBER {
            wanted += produced.component(i);
        } else {
            unwanted += produced.component(i).abs();
        }
    }
    let mut alignment = 1.0;
    let parts = [
        (desired.translation, produced.translation),
        (desired.rotation, produced.rotation),
    ];
    for (d, p) in parts {
        if d.norm() <= SMALL_NUMBER || p.norm() <= SMALL_NUMBER {
            continue;
        }
        let masked = Vector3::from_fn(|k, _| if d[k].abs() > SMALL_NUMBER { p[k] } else { 0.0 });
        let masked = masked
            .try_normalize(SMALL_NUMBER)
            .unwrap_or_else(Vector3::zeros);
        alignment *= d.normalize().dot(&masked);
    }
    wanted / unwanted * alignment
}

/// Finite-difference score gradient per generator axis.
///
/// Axis `i` is evaluated at `coefficient[i] ± epsilon[i]` with all other axes held
/// fixed, unsaturated; the entry is `score(+) - score(-)`.
pub fn compute_gradient(
    generators: &[ForceGenerator],
    column: &DriveColumn,
    epsilon: &[f64],
    mode: ScoreMode,
) -> Vec<f64> {
    let output = output_vector(generators, column, false);
    let wanted = &column.optimised_direction;
    generators
        .iter()
        .zip(epsilon)
        .map(|(g, &eps)| {
            let step = g.force_and_torque * eps;
            let lo = score_with(mode, wanted, &(output - step));
            let hi = score_with(mode, wanted, &(output + step));
            hi - lo
        })
        .collect()
}

/// Uniformly scale `inputs` down so that none exceeds its generator's range.
///
/// The single factor (≥ 1) is found in one pass, then every input is divided
/// by it, preserving proportions. Already-valid inputs come back unchanged.
pub fn desaturate(generators: &[ForceGenerator], inputs: &[f64]) -> SolverResult<Vec<f64>> {
    if generators.len() != inputs.len() {
        return Err(SolverError::LengthMismatch {
            generators: generators.len(),
            inputs: inputs.len(),
        });
    }
    let mut factor = 1.0_f64;
    for (index, (g, &x)) in generators.iter().zip(inputs).enumerate() {
        if x > g.range_max * factor {
            if g.range_max.abs() <= SMALL_NUMBER {
                return Err(SolverError::DegenerateRange { index });
            }
            factor = x / g.range_max;
        }
        if x < g.range_min * factor {
            if g.range_min.abs() <= SMALL_NUMBER {
                return Err(SolverError::DegenerateRange { index });
            }
            factor = x / g.range_min;
        }
    }
    // Clamp absorbs the last-ulp overshoot of `x / factor`, keeping the result
    // a fixed point of this function.
    Ok(generators
        .iter()
        .zip(inputs)
        .map(|(g, &x)| g.saturate(x / factor))
        .collect())
}

/// Twelve unit-range generators along the edges of a box with half-extents
/// `extents`: each is a unit force along its edge axis, applied at the edge
/// midpoint, with the matching moment about the origin.
pub fn make_test_cube(extents: Vector3<f64>) -> Vec<ForceGenerator> {
    let vertices: Vec<Vector3<f64>> = (0..8)
        .map(|i| {
            Vector3::new(
                if i & 1 != 0 { extents.x } else { -extents.x },
                if i & 2 != 0 { extents.y } else { -extents.y },
                if i & 4 != 0 { extents.z } else { -extents.z },
            )
        })
        .collect();
    let mut generators = Vec::with_capacity(12);
    for v in &vertices {
        for axis_idx in 0..3 {
            if v[axis_idx] >= 0.0 {
                continue;
            }
            let mut axis = Vector3::zeros();
            axis[axis_idx] = 1.0;
            let position = v + axis * extents[axis_idx];
            let torque = position.cross(&axis);
            generators.push(ForceGenerator::new(
                SixDofVector::new(axis, torque),
                -1.0,
                1.0,
            ));
        }
    }
    generators
}
