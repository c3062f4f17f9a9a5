use ndarray::{Array2, ArrayView1, ArrayView2};

use crate::{Result, arch::StepFunction};

/// Evaluates the recurrence one position after the other.
pub(super) fn sequential<S: StepFunction + ?Sized>(
    step: &S,
    params: &[f64],
    initial_state: ArrayView1<f64>,
    inputs: ArrayView2<f64>,
) -> Result<Array2<f64>> {
    let mut trajectory = Array2::zeros((inputs.nrows(), initial_state.len()));
    let mut prev = initial_state.to_owned();

    for (mut row, input) in trajectory.outer_iter_mut().zip(inputs.outer_iter()) {
        prev = step.apply(params, prev.view(), input)?;
        row.assign(&prev);
    }

    Ok(trajectory)
}
