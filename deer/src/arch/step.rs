use ndarray::{Array1, Array2, ArrayView1};

use crate::Result;

/// A pure state transition `(params, state, input) -> next state`.
///
/// The solver never looks inside an implementation: it only evaluates it, asks for the
/// Jacobian with respect to the state in order to linearize the recurrence, and pulls
/// cotangents back through it when computing gradients.
///
/// Implementations do not own their parameters, they read them from a flat slice of
/// `size()` values.
pub trait StepFunction: Sync {
    /// Returns the width of the state vector.
    fn nstates(&self) -> usize;

    /// Returns the width of a single input vector.
    fn ninputs(&self) -> usize;

    /// Returns the amount of parameters this step function reads.
    fn size(&self) -> usize;

    /// Samples a fresh set of parameters.
    ///
    /// # Arguments
    /// * `seed` - The seed for the random number generator.
    fn init(&self, seed: u64) -> Result<Vec<f64>>;

    /// Computes the next state.
    fn apply(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array1<f64>>;

    /// Computes the Jacobian of the next state with respect to `state`, where
    /// `jac[[i, j]]` is the derivative of the i-th output by the j-th state component.
    fn jacobian(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<Array2<f64>>;

    /// Computes the next state together with the Jacobian with respect to `state`.
    ///
    /// Implementations that share intermediate values between both should override it.
    fn linearize(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
    ) -> Result<(Array1<f64>, Array2<f64>)> {
        let next = self.apply(params, state, input)?;
        let jac = self.jacobian(params, state, input)?;
        Ok((next, jac))
    }

    /// Pulls the cotangent of the next state back through the step.
    ///
    /// The parameter gradient is **accumulated** into `grad`, it is never overwritten.
    ///
    /// # Returns
    /// The cotangents of `state` and `input`, in that order.
    fn vjp(
        &self,
        params: &[f64],
        state: ArrayView1<f64>,
        input: ArrayView1<f64>,
        cotangent: ArrayView1<f64>,
        grad: &mut [f64],
    ) -> Result<(Array1<f64>, Array1<f64>)>;
}
