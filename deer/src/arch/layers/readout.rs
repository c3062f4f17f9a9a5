use ndarray::{Array2, ArrayView2};

use crate::Result;

/// Maps a batch of final states to the model's outputs.
///
/// Like a `StepFunction`, a readout doesn't own its parameters and keeps no forward
/// metadata between calls, so it can be shared between threads.
pub trait Readout: Sync {
    /// Returns the width of the states it reads.
    fn nstates(&self) -> usize;

    /// Returns the width of its outputs.
    fn nout(&self) -> usize;

    /// Returns the amount of parameters it reads.
    fn size(&self) -> usize;

    /// Samples a fresh set of parameters.
    fn init(&self, seed: u64) -> Result<Vec<f64>>;

    /// Computes the outputs for a `(batch, nstates)` matrix of states.
    fn apply(&self, params: &[f64], states: ArrayView2<f64>) -> Result<Array2<f64>>;

    /// Backpropagates the output cotangents `d_out`.
    ///
    /// The parameter gradient is **accumulated** into `grad`.
    ///
    /// # Returns
    /// The cotangents of `states`.
    fn backward(
        &self,
        params: &[f64],
        states: ArrayView2<f64>,
        d_out: ArrayView2<f64>,
        grad: &mut [f64],
    ) -> Result<Array2<f64>>;
}
