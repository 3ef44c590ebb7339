//! Solver data types and configuration.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{SolverError, SolverResult};
use crate::six_dof::SixDofVector;
use crate::SMALL_NUMBER;

/// One actuator's unit response and its scalar drive range.
///
/// Invariants (assumed, not validated): `range_min <= 0 <= range_max`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ForceGenerator {
    pub force_and_torque: SixDofVector,
    pub range_min: f64,
    pub range_max: f64,
}

impl ForceGenerator {
    #[inline]
    pub fn new(force_and_torque: SixDofVector, range_min: f64, range_max: f64) -> Self {
        Self {
            force_and_torque,
            range_min,
            range_max,
        }
    }

    #[inline]
    pub fn extent(&self) -> f64 {
        self.range_max - self.range_min
    }

    #[inline]
    pub fn midpoint(&self) -> f64 {
        self.range_min + self.extent() * 0.5
    }

    /// Clamp a drive into `[range_min, range_max]`; never panics on inverted ranges.
    #[inline]
    pub fn saturate(&self, drive: f64) -> f64 {
        drive.max(self.range_min).min(self.range_max)
    }
}

impl fmt::Display for ForceGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{:.3}:{:.3}] {}",
            self.range_min, self.range_max, self.force_and_torque
        )
    }
}

/// Drive coefficients optimised for one direction; one entry per generator,
/// same order as the generator list.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveColumn {
    pub optimised_direction: SixDofVector,
    pub input_coefficients: Vec<f64>,
}

impl DriveColumn {
    pub fn new(optimised_direction: SixDofVector, input_coefficients: Vec<f64>) -> Self {
        Self {
            optimised_direction,
            input_coefficients,
        }
    }

    /// Coefficients scaled by a scalar input.
    pub fn output_values(&self, input: f64) -> Vec<f64> {
        self.input_coefficients.iter().map(|c| c * input).collect()
    }
}

impl fmt::Display for DriveColumn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} fac:{{", self.optimised_direction)?;
        for c in &self.input_coefficients {
            write!(f, "{c:.3} ")?;
        }
        write!(f, "}}")
    }
}

/// A set of columns, one per optimised direction (k columns by N generators).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DriveMatrix {
    pub columns: Vec<DriveColumn>,
}

impl DriveMatrix {
    pub fn new(columns: Vec<DriveColumn>) -> Self {
        Self { columns }
    }

    /// Per-generator drives for a per-column input; near-zero inputs are skipped.
    pub fn output_values(&self, inputs: &[f64]) -> SolverResult<Vec<f64>> {
        self.check_len(inputs)?;
        let n = self
            .columns
            .first()
            .map(|c| c.input_coefficients.len())
            .unwrap_or(0);
        let mut sum = vec![0.0; n];
        for (col, &x) in self.columns.iter().zip(inputs) {
            if x.abs() < SMALL_NUMBER {
                continue;
            }
            for (s, v) in sum.iter_mut().zip(col.output_values(x)) {
                *s += v;
            }
        }
        Ok(sum)
    }

    /// The 6‑DOF input that a per-column input stands for.
    pub fn input_vector(&self, inputs: &[f64]) -> SolverResult<SixDofVector> {
        self.check_len(inputs)?;
        let mut acc = SixDofVector::zeros();
        for (col, &x) in self.columns.iter().zip(inputs) {
            if x.abs() < SMALL_NUMBER {
                continue;
            }
            acc += col.optimised_direction * x;
        }
        Ok(acc)
    }

    fn check_len(&self, inputs: &[f64]) -> SolverResult<()> {
        if inputs.len() != self.columns.len() {
            return Err(SolverError::LengthMismatch {
                generators: self.columns.len(),
                inputs: inputs.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for DriveMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, col) in self.columns.iter().enumerate() {
            writeln!(f, "{i} {col}")?;
        }
        Ok(())
    }
}

/// Search strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveMethod {
    /// Start at range midpoints, width = extent/4, halve the moved axis's width.
    Binomial,
    /// Start at `clamp(0)`, constant width `extent / max_iterations / n`.
    FixedEpsilon,
    /// Grid search over `cuts^n` samples of the range box.
    Exhaustive { cuts: usize },
}

/// Scoring strategy; higher is better for both.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScoreMode {
    /// `1 / (1 + distance(desired, produced))`.
    InverseDistance,
    /// Legacy: wanted-axis sum over (1 + unwanted-axis magnitude), times alignment.
    WantedOverUnwanted,
}

/// Solver configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolverCfg {
    /// Per-generator budget; the run performs `max_iterations * n` steps.
    pub max_iterations: usize,
    pub method: SolveMethod,
    pub score: ScoreMode,
}

impl Default for SolverCfg {
    fn default() -> Self {
        Self {
            max_iterations: 10_000,
            method: SolveMethod::Binomial,
            score: ScoreMode::InverseDistance,
        }
    }
}

impl SolverCfg {
    pub fn with_iterations(max_iterations: usize) -> Self {
        Self {
            max_iterations,
            ..Self::default()
        }
    }
}
