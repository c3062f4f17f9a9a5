//! Parallel evaluation of recurrences `y_i = f(y_{i-1}, x_i)` and their gradients.

mod method;
mod newton;
pub mod scan;
mod sequential;
mod solution;

use log::{debug, warn};
use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

pub use method::SolverMethod;
pub use solution::{SolveGrad, Solution};

use crate::{Result, arch::StepFunction, error::check_size};

/// How to evaluate a recurrence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub method: SolverMethod,
    /// The largest elementwise update accepted as converged.
    pub tol: f64,
    pub max_iter: usize,
}

impl SolverConfig {
    pub const DEFAULT_TOL: f64 = 1e-7;
    pub const DEFAULT_MAX_ITER: usize = 100;
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            method: SolverMethod::default(),
            tol: Self::DEFAULT_TOL,
            max_iter: Self::DEFAULT_MAX_ITER,
        }
    }
}

/// Diagnostics of a single solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveStats {
    pub iterations: usize,
    /// The largest elementwise change made by the last iteration.
    pub residual: f64,
    pub converged: bool,
}

impl SolveStats {
    /// The stats of a solve that didn't need to iterate.
    pub fn exact() -> Self {
        Self {
            iterations: 0,
            residual: 0.,
            converged: true,
        }
    }
}

/// Finds the trajectory `T` such that `T[i] = step(T[i-1], inputs[i])`, where the state
/// before the first position is `initial_state`.
///
/// A non converged solve isn't an error: the last iterate is returned and its stats say
/// so. Non finite values are not clamped.
///
/// # Arguments
/// * `step` - The state transition.
/// * `params` - The parameters of `step`.
/// * `initial_state` - The `nstates` state before the first input.
/// * `inputs` - The `(nseq, ninputs)` input sequence.
/// * `initial_guess` - A `(nseq, nstates)` starting trajectory, zeros for a cold start.
/// * `config` - The method and its stopping criteria.
///
/// # Returns
/// A `Solution`, or an error if any of the shapes disagree.
pub fn solve<'a, S: StepFunction + ?Sized>(
    step: &'a S,
    params: &'a [f64],
    initial_state: ArrayView1<'a, f64>,
    inputs: ArrayView2<'a, f64>,
    initial_guess: ArrayView2<f64>,
    config: &SolverConfig,
) -> Result<Solution<'a, S>> {
    check_size("params", params.len(), step.size())?;
    check_size("initial state", initial_state.len(), step.nstates())?;
    check_size("input width", inputs.ncols(), step.ninputs())?;
    check_size("initial guess rows", initial_guess.nrows(), inputs.nrows())?;
    check_size("initial guess cols", initial_guess.ncols(), step.nstates())?;

    let (trajectory, stats) = match config.method {
        SolverMethod::Deer => {
            newton::deer(step, params, initial_state, inputs, initial_guess, config)?
        }
        SolverMethod::Sequential => {
            let trajectory = sequential::sequential(step, params, initial_state, inputs)?;
            let stats = SolveStats {
                iterations: usize::from(inputs.nrows() > 0),
                ..SolveStats::exact()
            };
            (trajectory, stats)
        }
    };

    debug!(
        method:% = config.method,
        iterations = stats.iterations,
        residual = stats.residual;
        "solved recurrence"
    );

    if !stats.converged {
        warn!(
            "solver did not converge after {} iterations, residual {:e}",
            stats.iterations, stats.residual
        );
    }

    Ok(Solution::new(
        step,
        params,
        initial_state,
        inputs,
        trajectory,
        stats,
    ))
}
