use crate::Result;

/// Defines the strategy for updating model parameters based on calculated gradients.
///
/// An optimizer owns its own state (moment estimates, velocities), sized to the parameter
/// buffer it was built for.
pub trait Optimizer {
    /// Updates the provided slice of parameters using the gradient.
    ///
    /// # Arguments
    /// * `grad` - A reference to the model's gradient.
    /// * `params` - The parameters to update.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad`, `params` and the optimizer's
    /// state, in which case nothing is modified.
    fn update_params(&mut self, grad: &[f64], params: &mut [f64]) -> Result<()>;
}
