//! Force-allocation solver: per-actuator drive values for a desired 6‑DOF input.
//!
//! Purpose
//! - Given saturated force/torque generators and a desired direction, find one
//!   scalar drive per generator so that the summed output best reproduces the
//!   direction.
//! - The canonical search is a coordinate-wise coarsening ascent: each step
//!   moves only the axis with the steepest finite-difference gradient by its
//!   current width, then halves that width (a per-axis binary search biased
//!   toward the most improving axis).
//!
//! Layout
//! - `types.rs`: generators, columns, matrices and config.
//! - `score.rs`: output assembly, scoring, gradients, desaturation, test cube.
//! - `search.rs`: the synchronous search runners (descent and exhaustive grid).
//! - `runner.rs`: worker-thread jobs with progress/cancel and the runner pool.
//!
//! Each solve owns its coefficient and width arrays; nothing mutable is shared
//! between concurrent solves. The worker is the only writer and the caller
//! reads the result after observing `done` (or after stop + join).

mod runner;
mod score;
mod search;
mod types;

pub use runner::{SolveJob, SolveProgress, SolverPool};
pub use score::{
    compute_gradient, desaturate, make_test_cube, output_vector, score, score_with,
};
pub use search::{planned_iterations, solve, solve_with, validate_inputs, Descent, GridSearch};
pub use types::{DriveColumn, DriveMatrix, ForceGenerator, ScoreMode, SolveMethod, SolverCfg};

#[cfg(test)]
mod tests;
