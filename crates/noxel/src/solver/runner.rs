//! Worker-thread solve jobs and the runner pool.
//!
//! Handoff model: the worker is the single writer of its coefficient/width
//! arrays; the caller polls `SolveProgress` (non-blocking atomics) and takes
//! the column by joining the worker. `output()` requests a stop first, which
//! the worker observes at the top of its next iteration.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use tracing::debug;

use super::search::{solve_with, validate_inputs};
use super::types::{DriveColumn, ForceGenerator, SolverCfg};
use crate::error::{SolverError, SolverResult};
use crate::six_dof::SixDofVector;

/// Progress/cancellation block shared between a worker and its caller.
#[derive(Debug, Default)]
pub struct SolveProgress {
    iteration: AtomicUsize,
    planned: AtomicUsize,
    stop: AtomicBool,
    done: AtomicBool,
}

impl SolveProgress {
    #[inline]
    pub fn iteration(&self) -> usize {
        self.iteration.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn planned(&self) -> usize {
        self.planned.load(Ordering::Relaxed)
    }

    /// `iteration / planned` in [0, 1]; 1 once done with nothing planned.
    pub fn fraction(&self) -> f64 {
        let planned = self.planned();
        if planned == 0 {
            return if self.is_done() { 1.0 } else { 0.0 };
        }
        (self.iteration() as f64 / planned as f64).min(1.0)
    }

    #[inline]
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub(crate) fn set_iteration(&self, iteration: usize) {
        self.iteration.store(iteration, Ordering::Relaxed);
    }

    pub(crate) fn set_planned(&self, planned: usize) {
        self.planned.store(planned, Ordering::Relaxed);
    }

    pub(crate) fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }
}

/// One solve running on its own worker thread.
#[derive(Debug)]
pub struct SolveJob {
    progress: Arc<SolveProgress>,
    handle: Option<JoinHandle<DriveColumn>>,
    output: Option<DriveColumn>,
}

impl SolveJob {
    /// Validate, then start the worker. The generator list is shared, not copied.
    pub fn spawn(
        generators: Arc<[ForceGenerator]>,
        desired: SixDofVector,
        cfg: SolverCfg,
    ) -> SolverResult<Self> {
        validate_inputs(&generators, &cfg)?;
        let progress = Arc::new(SolveProgress::default());
        let worker_progress = Arc::clone(&progress);
        let handle = thread::spawn(move || {
            // Inputs were validated above, so the error arm is unreachable in practice.
            solve_with(&generators, desired, cfg, &worker_progress).unwrap_or_else(|err| {
                worker_progress.finish();
                debug!(%err, "solve_rejected");
                DriveColumn::new(desired, vec![0.0; generators.len()])
            })
        });
        Ok(Self {
            progress,
            handle: Some(handle),
            output: None,
        })
    }

    #[inline]
    pub fn progress(&self) -> f64 {
        self.progress.fraction()
    }

    #[inline]
    pub fn iteration(&self) -> usize {
        self.progress.iteration()
    }

    #[inline]
    pub fn is_done(&self) -> bool {
        self.progress.is_done()
    }

    /// Ask the worker to stop at its next iteration; returns immediately.
    #[inline]
    pub fn stop(&self) {
        self.progress.request_stop();
    }

    /// Block until the worker finishes its budget, then return the best column.
    pub fn wait(&mut self) -> DriveColumn {
        if let Some(handle) = self.handle.take() {
            match handle.join() {
                Ok(col) => self.output = Some(col),
                Err(panic) => std::panic::resume_unwind(panic),
            }
        }
        self.output.clone().unwrap_or_default()
    }

    /// Stop, wait, and return the best column reached so far.
    pub fn output(&mut self) -> DriveColumn {
        self.stop();
        self.wait()
    }
}

impl Drop for SolveJob {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.progress.request_stop();
            let _ = handle.join();
        }
    }
}

/// Registry of solve jobs addressed by index, one per actuator group/direction.
#[derive(Debug, Default)]
pub struct SolverPool {
    cfg: SolverCfg,
    runners: Vec<SolveJob>,
}

impl SolverPool {
    pub fn new(cfg: SolverCfg) -> Self {
        Self {
            cfg,
            runners: Vec::new(),
        }
    }

    /// Start a job with the pool's method/score and the given budget.
    pub fn start_solve(
        &mut self,
        generators: &[ForceGenerator],
        desired: SixDofVector,
        max_iterations: usize,
    ) -> SolverResult<usize> {
        let cfg = SolverCfg {
            max_iterations,
            ..self.cfg
        };
        let job = SolveJob::spawn(Arc::from(generators), desired, cfg)?;
        self.runners.push(job);
        Ok(self.runners.len() - 1)
    }

    pub fn iteration(&self, idx: usize) -> SolverResult<usize> {
        self.get(idx).map(SolveJob::iteration)
    }

    pub fn progress(&self, idx: usize) -> SolverResult<f64> {
        self.get(idx).map(SolveJob::progress)
    }

    pub fn is_done(&self, idx: usize) -> SolverResult<bool> {
        self.get(idx).map(SolveJob::is_done)
    }

    /// Forced synchronous retrieval: stop the runner and wait for it.
    pub fn output(&mut self, idx: usize) -> SolverResult<DriveColumn> {
        self.runners
            .get_mut(idx)
            .map(SolveJob::output)
            .ok_or(SolverError::UnknownRunner(idx))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.runners.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.runners.is_empty()
    }

    /// Stop and drop every runner.
    pub fn clear(&mut self) {
        self.runners.clear();
    }

    fn get(&self, idx: usize) -> SolverResult<&SolveJob> {
        self.runners.get(idx).ok_or(SolverError::UnknownRunner(idx))
    }
}
