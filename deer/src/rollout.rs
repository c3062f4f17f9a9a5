use log::debug;
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::{
    Result,
    arch::{Readout, StepFunction},
    error::check_size,
    solver::{self, SolveStats, Solution, SolverConfig},
};

/// The reduced gradients of a batch.
#[derive(Debug, Clone)]
pub struct BatchGrad {
    /// Summed over the batch.
    pub step: Vec<f64>,
    /// Summed over the batch.
    pub readout: Vec<f64>,
    /// One row per example.
    pub initial_states: Array2<f64>,
}

/// The solved batch: one solution per example plus the readout of their final states.
pub struct Rollout<'a, S: ?Sized, R: ?Sized> {
    step: &'a S,
    readout: &'a R,
    readout_params: &'a [f64],
    solutions: Vec<Solution<'a, S>>,
    final_states: Array2<f64>,
    outputs: Array2<f64>,
}

/// Solves every example of a batch independently and applies the readout to each final
/// state.
///
/// # Arguments
/// * `step` - The state transition.
/// * `params` - The parameters of `step`.
/// * `readout` - The head applied to the final states.
/// * `readout_params` - The parameters of `readout`.
/// * `initial_states` - The `(batch, nstates)` initial states.
/// * `inputs` - The `(batch, nseq, ninputs)` input sequences.
/// * `guesses` - The `(batch, nseq, nstates)` starting trajectories.
/// * `config` - The solver configuration shared by every example.
///
/// # Returns
/// An error if the shapes disagree, before solving anything.
#[allow(clippy::too_many_arguments)]
pub fn rollout_batch<'a, S, R>(
    step: &'a S,
    params: &'a [f64],
    readout: &'a R,
    readout_params: &'a [f64],
    initial_states: ArrayView2<'a, f64>,
    inputs: ArrayView3<'a, f64>,
    guesses: ArrayView3<f64>,
    config: &SolverConfig,
) -> Result<Rollout<'a, S, R>>
where
    S: StepFunction + ?Sized,
    R: Readout + ?Sized,
{
    let (batch, nseq, _) = inputs.dim();
    check_size("initial states", initial_states.nrows(), batch)?;
    check_size("guesses", guesses.len_of(Axis(0)), batch)?;
    check_size("guess length", guesses.len_of(Axis(1)), nseq)?;
    check_size("readout width", readout.nstates(), step.nstates())?;
    check_size("readout params", readout_params.len(), readout.size())?;

    let solutions = (0..batch)
        .into_par_iter()
        .map(|b| {
            solver::solve(
                step,
                params,
                initial_states.clone().index_axis_move(Axis(0), b),
                inputs.clone().index_axis_move(Axis(0), b),
                guesses.index_axis(Axis(0), b),
                config,
            )
        })
        .collect::<Result<Vec<_>>>()?;

    let mut final_states = Array2::zeros((batch, step.nstates()));
    for (mut row, solution) in final_states.outer_iter_mut().zip(&solutions) {
        row.assign(&solution.final_state());
    }

    let outputs = readout.apply(readout_params, final_states.view())?;

    let rollout = Rollout {
        step,
        readout,
        readout_params,
        solutions,
        final_states,
        outputs,
    };

    debug!(
        batch = batch,
        max_iterations = rollout.max_iterations();
        "rolled out batch"
    );

    Ok(rollout)
}

impl<S: StepFunction + ?Sized, R: Readout + ?Sized> Rollout<'_, S, R> {
    /// Returns the `(batch, nout)` readout of the final states.
    pub fn outputs(&self) -> ArrayView2<'_, f64> {
        self.outputs.view()
    }

    pub fn stats(&self) -> Vec<SolveStats> {
        self.solutions.iter().map(Solution::stats).collect()
    }

    pub fn max_iterations(&self) -> usize {
        self.solutions
            .iter()
            .map(|s| s.stats().iterations)
            .max()
            .unwrap_or_default()
    }

    /// Returns a copy of the `(batch, nseq, nstates)` trajectories.
    pub fn trajectories(&self) -> Array3<f64> {
        let (nseq, nstates) = self.trajectory_dim();
        let mut trajectories = Array3::zeros((self.solutions.len(), nseq, nstates));

        for (mut dst, solution) in trajectories.outer_iter_mut().zip(&self.solutions) {
            dst.assign(&solution.trajectory());
        }

        trajectories
    }

    fn trajectory_dim(&self) -> (usize, usize) {
        self.solutions
            .first()
            .map(|s| s.trajectory().dim())
            .unwrap_or((0, self.step.nstates()))
    }

    /// Backpropagates the cotangents of the outputs through the readout and every solve.
    ///
    /// # Returns
    /// An error if `d_outputs` doesn't have the outputs' shape.
    pub fn backward(&self, d_outputs: ArrayView2<f64>) -> Result<BatchGrad> {
        check_size("output grad rows", d_outputs.nrows(), self.outputs.nrows())?;
        check_size("output grad cols", d_outputs.ncols(), self.outputs.ncols())?;

        let mut readout_grad = vec![0.; self.readout.size()];
        let d_final = self.readout.backward(
            self.readout_params,
            self.final_states.view(),
            d_outputs,
            &mut readout_grad,
        )?;

        let grads = self
            .solutions
            .par_iter()
            .zip(d_final.outer_iter().into_par_iter())
            .map(|(solution, d_final)| {
                let (nseq, nstates) = solution.trajectory().dim();
                let mut grad_trajectory = Array2::zeros((nseq, nstates));

                if nseq == 0 {
                    let mut grad = solution.backward(grad_trajectory.view())?;
                    grad.initial_state += &d_final;
                    return Ok(grad);
                }

                grad_trajectory.row_mut(nseq - 1).assign(&d_final);
                solution.backward(grad_trajectory.view())
            })
            .collect::<Result<Vec<_>>>()?;

        let mut step_grad = vec![0.; self.step.size()];
        let mut initial_states = Array2::zeros(self.final_states.dim());

        for (grad, mut row) in grads.into_iter().zip(initial_states.outer_iter_mut()) {
            step_grad
                .iter_mut()
                .zip(&grad.params)
                .for_each(|(acc, g)| *acc += g);
            row.assign(&grad.initial_state);
        }

        Ok(BatchGrad {
            step: step_grad,
            readout: readout_grad,
            initial_states,
        })
    }
}
