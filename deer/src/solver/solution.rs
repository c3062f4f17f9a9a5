use ndarray::{Array1, Array2, Array3, ArrayView1, ArrayView2, Axis, s};
use rayon::prelude::*;

use super::{SolveStats, scan};
use crate::{Result, arch::StepFunction, error::check_size};

/// The gradients of a scalar loss with respect to everything a solve depends on.
#[derive(Debug, Clone)]
pub struct SolveGrad {
    pub params: Vec<f64>,
    pub initial_state: Array1<f64>,
    pub inputs: Array2<f64>,
}

/// A converged (or best effort) trajectory together with what's needed to differentiate it.
///
/// The solution borrows the step function and its arguments, the same way an autodiff
/// tape keeps the residuals of the forward pass.
pub struct Solution<'a, S: ?Sized> {
    step: &'a S,
    params: &'a [f64],
    initial_state: ArrayView1<'a, f64>,
    inputs: ArrayView2<'a, f64>,
    trajectory: Array2<f64>,
    stats: SolveStats,
}

impl<'a, S: StepFunction + ?Sized> Solution<'a, S> {
    pub(super) fn new(
        step: &'a S,
        params: &'a [f64],
        initial_state: ArrayView1<'a, f64>,
        inputs: ArrayView2<'a, f64>,
        trajectory: Array2<f64>,
        stats: SolveStats,
    ) -> Self {
        Self {
            step,
            params,
            initial_state,
            inputs,
            trajectory,
            stats,
        }
    }

    /// Returns the `(nseq, nstates)` trajectory.
    pub fn trajectory(&self) -> ArrayView2<'_, f64> {
        self.trajectory.view()
    }

    pub fn into_trajectory(self) -> Array2<f64> {
        self.trajectory
    }

    pub fn stats(&self) -> SolveStats {
        self.stats
    }

    /// Returns the last state of the trajectory, or the initial state for empty sequences.
    pub fn final_state(&self) -> ArrayView1<'_, f64> {
        match self.trajectory.nrows() {
            0 => self.initial_state.view(),
            n => self.trajectory.row(n - 1),
        }
    }

    /// Returns the state fed to the step at position `i`.
    fn prev_state(&self, i: usize) -> ArrayView1<'_, f64> {
        match i {
            0 => self.initial_state.view(),
            i => self.trajectory.row(i - 1),
        }
    }

    /// Backpropagates `grad_trajectory`, the gradient of a loss with respect to every
    /// state of the trajectory, through the fixed point.
    ///
    /// The total sensitivities follow the adjoint recurrence
    /// `λ_i = g_i + J_{i+1}ᵀ·λ_{i+1}` with the Jacobians taken at the returned trajectory.
    /// It runs backwards in time, so it is solved with the same parallel scan over the
    /// reversed sequence, and each `λ_i` is then pulled back through the step.
    ///
    /// # Returns
    /// An error if `grad_trajectory` doesn't have the trajectory's shape.
    pub fn backward(&self, grad_trajectory: ArrayView2<f64>) -> Result<SolveGrad> {
        let (nseq, n) = self.trajectory.dim();
        check_size("trajectory grad rows", grad_trajectory.nrows(), nseq)?;
        check_size("trajectory grad cols", grad_trajectory.ncols(), n)?;

        let adjoint = self.adjoint(grad_trajectory)?;
        let size = self.step.size();
        let mut d_inputs = Array2::zeros(self.inputs.dim());

        let (params, d_initial) = d_inputs
            .outer_iter_mut()
            .into_par_iter()
            .zip(adjoint.outer_iter().into_par_iter())
            .enumerate()
            .try_fold(
                || (vec![0.; size], None),
                |(mut grad, mut d_initial), (i, (mut d_input, lambda))| -> Result<_> {
                    let (d_prev, d_x) = self.step.vjp(
                        self.params,
                        self.prev_state(i),
                        self.inputs.row(i),
                        lambda,
                        &mut grad,
                    )?;

                    d_input.assign(&d_x);
                    if i == 0 {
                        d_initial = Some(d_prev);
                    }

                    Ok((grad, d_initial))
                },
            )
            .try_reduce(
                || (vec![0.; size], None),
                |(mut acc, a), (grad, b)| {
                    acc.iter_mut().zip(&grad).for_each(|(acc, g)| *acc += g);
                    Ok((acc, a.or(b)))
                },
            )?;

        Ok(SolveGrad {
            params,
            initial_state: d_initial.unwrap_or_else(|| Array1::zeros(n)),
            inputs: d_inputs,
        })
    }

    /// Solves the adjoint recurrence for every position.
    fn adjoint(&self, grad_trajectory: ArrayView2<f64>) -> Result<Array2<f64>> {
        let (nseq, n) = self.trajectory.dim();

        // Reversed position k holds J_{nseq-k}ᵀ, the first one multiplies a zero state.
        let mut mats = Array3::zeros((nseq, n, n));
        mats.outer_iter_mut()
            .into_par_iter()
            .enumerate()
            .skip(1)
            .try_for_each(|(k, mut mat)| -> Result<()> {
                let i = nseq - k;
                let jac = self.step.jacobian(
                    self.params,
                    self.prev_state(i),
                    self.inputs.row(i),
                )?;
                mat.assign(&jac.t());
                Ok(())
            })?;

        let rhs = grad_trajectory.slice(s![..;-1, ..]);
        let mut adjoint = scan::solve_affine(mats.view(), rhs, Array1::zeros(n).view())?;
        adjoint.invert_axis(Axis(0));

        Ok(adjoint)
    }
}
