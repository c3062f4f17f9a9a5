use ndarray::{Array2, Array3, ArrayView1, ArrayView2, Zip};
use rayon::prelude::*;

use super::{SolveStats, SolverConfig, scan};
use crate::{Result, arch::StepFunction};

/// Runs Newton iterations over the whole trajectory.
///
/// Every iteration linearizes the step around the current guess,
/// `y_i ≈ J_i·y_{i-1} + (f_i - J_i·ŷ_{i-1})`, and solves the resulting affine recurrence
/// for all the positions at once. The iteration stops once the largest elementwise update
/// is within `tol`, once it stops being a number or after `max_iter` iterations.
pub(super) fn deer<S: StepFunction + ?Sized>(
    step: &S,
    params: &[f64],
    initial_state: ArrayView1<f64>,
    inputs: ArrayView2<f64>,
    initial_guess: ArrayView2<f64>,
    config: &SolverConfig,
) -> Result<(Array2<f64>, SolveStats)> {
    let mut trajectory = initial_guess.to_owned();

    if inputs.nrows() == 0 {
        return Ok((trajectory, SolveStats::exact()));
    }

    let mut stats = SolveStats {
        iterations: 0,
        residual: f64::INFINITY,
        converged: false,
    };

    while stats.iterations < config.max_iter {
        let (mats, rhs) = linearize(step, params, initial_state, inputs, trajectory.view())?;
        let next = scan::solve_affine(mats.view(), rhs.view(), initial_state)?;

        stats.residual = max_abs_diff(next.view(), trajectory.view());
        stats.iterations += 1;
        trajectory = next;

        if stats.residual.is_nan() || stats.residual <= config.tol {
            break;
        }
    }

    stats.converged = stats.residual <= config.tol;
    Ok((trajectory, stats))
}

/// Evaluates the step and its Jacobian at every position of `trajectory` in parallel.
///
/// # Returns
/// The `(nseq, n, n)` Jacobians and the `(nseq, n)` offsets of the linearized recurrence.
fn linearize<S: StepFunction + ?Sized>(
    step: &S,
    params: &[f64],
    initial_state: ArrayView1<f64>,
    inputs: ArrayView2<f64>,
    trajectory: ArrayView2<f64>,
) -> Result<(Array3<f64>, Array2<f64>)> {
    let (nseq, n) = trajectory.dim();
    let mut mats = Array3::zeros((nseq, n, n));
    let mut rhs = Array2::zeros((nseq, n));

    mats.outer_iter_mut()
        .into_par_iter()
        .zip(rhs.outer_iter_mut().into_par_iter())
        .enumerate()
        .try_for_each(|(i, (mut mat, mut offset))| -> Result<()> {
            let prev = if i == 0 {
                initial_state
            } else {
                trajectory.row(i - 1)
            };

            let (next, jac) = step.linearize(params, prev, inputs.row(i))?;
            offset.assign(&(next - jac.dot(&prev)));
            mat.assign(&jac);
            Ok(())
        })?;

    Ok((mats, rhs))
}

/// Returns the largest absolute elementwise difference, or NaN if any difference is NaN.
pub(super) fn max_abs_diff(a: ArrayView2<f64>, b: ArrayView2<f64>) -> f64 {
    Zip::from(&a).and(&b).fold(0., |max: f64, &x, &y| {
        let d = (x - y).abs();
        if max.is_nan() || d <= max { max } else { d }
    })
}
