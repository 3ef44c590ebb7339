//! Synchronous search runners.
//!
//! The runners only read the generator slice and own their state, so the same
//! code serves the in-thread `solve` and the worker jobs in `runner.rs`.

use tracing::{debug, info};

use super::runner::SolveProgress;
use super::score::{compute_gradient, output_vector, score_with};
use super::types::{DriveColumn, ForceGenerator, SolveMethod, SolverCfg};
use crate::error::{SolverError, SolverResult};
use crate::six_dof::SixDofVector;

/// Reject inputs that would make a run meaningless.
pub fn validate_inputs(generators: &[ForceGenerator], cfg: &SolverCfg) -> SolverResult<()> {
    if generators.is_empty() {
        return Err(SolverError::EmptyGenerators);
    }
    match cfg.method {
        SolveMethod::Exhaustive { cuts } if cuts == 0 => Err(SolverError::ZeroCuts),
        SolveMethod::Exhaustive { .. } => Ok(()),
        _ if cfg.max_iterations == 0 => Err(SolverError::ZeroIterations),
        _ => Ok(()),
    }
}

/// Number of steps a full run performs (saturating for huge grids).
pub fn planned_iterations(num_generators: usize, cfg: &SolverCfg) -> usize {
    match cfg.method {
        SolveMethod::Exhaustive { cuts } => u32::try_from(num_generators)
            .ok()
            .and_then(|n| cuts.checked_pow(n))
            .unwrap_or(usize::MAX),
        _ => cfg.max_iterations.saturating_mul(num_generators),
    }
}

/// Solve in the calling thread with the canonical method and score.
pub fn solve(
    generators: &[ForceGenerator],
    desired: SixDofVector,
    max_iterations: usize,
) -> SolverResult<DriveColumn> {
    let progress = SolveProgress::default();
    solve_with(
        generators,
        desired,
        SolverCfg::with_iterations(max_iterations),
        &progress,
    )
}

/// Solve in the calling thread, reporting into (and honouring stop on) `progress`.
pub fn solve_with(
    generators: &[ForceGenerator],
    desired: SixDofVector,
    cfg: SolverCfg,
    progress: &SolveProgress,
) -> SolverResult<DriveColumn> {
    validate_inputs(generators, &cfg)?;
    let out = match cfg.method {
        SolveMethod::Exhaustive { cuts } => {
            GridSearch::new(generators, desired, cuts, cfg).run(progress)
        }
        _ => Descent::new(generators, desired, cfg).run(progress),
    };
    progress.finish();
    Ok(out)
}

/// Coordinate-wise coarsening ascent (`Binomial`) or fixed-step ascent (`FixedEpsilon`).
#[derive(Clone, Debug)]
pub struct Descent<'a> {
    generators: &'a [ForceGenerator],
    cfg: SolverCfg,
    state: DriveColumn,
    width: Vec<f64>,
    best: DriveColumn,
    best_score: f64,
    iteration: usize,
    planned: usize,
}

impl<'a> Descent<'a> {
    /// Pre: `generators` is non-empty (see `validate_inputs`).
    pub fn new(generators: &'a [ForceGenerator], desired: SixDofVector, cfg: SolverCfg) -> Self {
        let n = generators.len();
        let mut coefficients = Vec::with_capacity(n);
        let mut width = Vec::with_capacity(n);
        for g in generators {
            match cfg.method {
                SolveMethod::FixedEpsilon => {
                    coefficients.push(g.saturate(0.0));
                    width.push(g.extent() / cfg.max_iterations.max(1) as f64 / n as f64);
                }
                _ => {
                    coefficients.push(g.midpoint());
                    width.push(g.extent() * 0.25);
                }
            }
        }
        let state = DriveColumn::new(desired, coefficients);
        let best_score = score_with(
            cfg.score,
            &desired,
            &output_vector(generators, &state, false),
        );
        Self {
            generators,
            cfg,
            best: state.clone(),
            state,
            width,
            best_score,
            iteration: 0,
            planned: planned_iterations(n, &cfg),
        }
    }

    /// One step: move the steepest axis by its width in the gradient's sign.
    ///
    /// Only axes that can still move that way within their range compete, and
    /// the moved drive is clamped to its range. A state with no movable axis
    /// is left untouched.
    pub fn step(&mut self) {
        let gradient = compute_gradient(self.generators, &self.state, &self.width, self.cfg.score);
        let mut best: Option<(usize, f64)> = None;
        for (j, &g) in gradient.iter().enumerate() {
            if g == 0.0 || !g.is_finite() || !self.can_move(j, g) {
                continue;
            }
            if best.map_or(true, |(_, b)| g.abs() > b.abs()) {
                best = Some((j, g));
            }
        }
        if let Some((axis, g)) = best {
            let sign = if g > 0.0 { 1.0 } else { -1.0 };
            let moved = self.state.input_coefficients[axis] + self.width[axis] * sign;
            self.state.input_coefficients[axis] = self.generators[axis].saturate(moved);
            if self.cfg.method == SolveMethod::Binomial {
                self.width[axis] *= 0.5;
            }
        }
        self.iteration += 1;
        self.track_best();
    }

    /// Whether axis `j` has room left in the direction of `gradient`.
    fn can_move(&self, j: usize, gradient: f64) -> bool {
        let c = self.state.input_coefficients[j];
        let g = &self.generators[j];
        if gradient > 0.0 {
            c < g.range_max
        } else {
            c > g.range_min
        }
    }

    /// Run until the budget is spent or a stop is requested.
    pub fn run(mut self, progress: &SolveProgress) -> DriveColumn {
        progress.set_planned(self.planned);
        info!(
            generators = self.generators.len(),
            planned = self.planned,
            method = ?self.cfg.method,
            "descent_start"
        );
        while self.iteration < self.planned {
            if progress.stop_requested() {
                debug!(iteration = self.iteration, "descent_stopped");
                break;
            }
            self.step();
            progress.set_iteration(self.iteration);
        }
        info!(
            iteration = self.iteration,
            score = self.best_score,
            "descent_done"
        );
        self.best
    }

    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    #[inline]
    pub fn planned(&self) -> usize {
        self.planned
    }

    /// Current (possibly not best) state.
    #[inline]
    pub fn state(&self) -> &DriveColumn {
        &self.state
    }

    #[inline]
    pub fn widths(&self) -> &[f64] {
        &self.width
    }

    /// Best column seen so far and its score.
    #[inline]
    pub fn best(&self) -> (&DriveColumn, f64) {
        (&self.best, self.best_score)
    }

    fn track_best(&mut self) {
        let out = output_vector(self.generators, &self.state, false);
        let s = score_with(self.cfg.score, &self.state.optimised_direction, &out);
        if s > self.best_score {
            self.best_score = s;
            self.best.input_coefficients.clone_from(&self.state.input_coefficients);
        }
    }
}

/// Exhaustive grid search over `cuts^n` samples of the range box.
#[derive(Clone, Debug)]
pub struct GridSearch<'a> {
    generators: &'a [ForceGenerator],
    cfg: SolverCfg,
    desired: SixDofVector,
    cuts: usize,
    best: DriveColumn,
    best_score: f64,
    iteration: usize,
    planned: usize,
}

impl<'a> GridSearch<'a> {
    pub fn new(
        generators: &'a [ForceGenerator],
        desired: SixDofVector,
        cuts: usize,
        cfg: SolverCfg,
    ) -> Self {
        Self {
            generators,
            cfg,
            desired,
            cuts: cuts.max(1),
            best: DriveColumn::new(desired, vec![0.0; generators.len()]),
            best_score: f64::NEG_INFINITY,
            iteration: 0,
            planned: planned_iterations(generators.len(), &cfg),
        }
    }

    /// Sample `slice` decoded as mixed-radix digits, one per generator.
    pub fn sample(&self, slice: usize) -> Vec<f64> {
        let mut rest = slice;
        self.generators
            .iter()
            .map(|g| {
                let digit = rest % self.cuts;
                rest /= self.cuts;
                g.range_min + g.extent() * (digit as f64 / self.cuts as f64)
            })
            .collect()
    }

    pub fn run(mut self, progress: &SolveProgress) -> DriveColumn {
        progress.set_planned(self.planned);
        info!(
            generators = self.generators.len(),
            planned = self.planned,
            "grid_search_start"
        );
        let mut candidate = DriveColumn::new(self.desired, Vec::new());
        while self.iteration < self.planned {
            if progress.stop_requested() {
                debug!(iteration = self.iteration, "grid_search_stopped");
                break;
            }
            candidate.input_coefficients = self.sample(self.iteration);
            let out = output_vector(self.generators, &candidate, false);
            let s = score_with(self.cfg.score, &self.desired, &out);
            if s > self.best_score {
                self.best_score = s;
                self.best.input_coefficients.clone_from(&candidate.input_coefficients);
            }
            self.iteration += 1;
            progress.set_iteration(self.iteration);
        }
        info!(
            iteration = self.iteration,
            score = self.best_score,
            "grid_search_done"
        );
        self.best
    }
}
