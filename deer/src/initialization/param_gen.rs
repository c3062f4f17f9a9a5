use crate::{MlErr, Result};

/// A `ParamGen` generates values for the initial state of the model's parameters.
pub trait ParamGen {
    /// Should sample at most `n` parameters.
    ///
    /// # Arguments
    /// * `n` - The upper limit of samples to generate.
    ///
    /// # Returns
    /// An option whether the generator is exhausted.
    fn sample(&mut self, n: usize) -> Option<Vec<f64>>;

    /// Samples exactly `n` parameters.
    ///
    /// # Returns
    /// An error if the generator got exhausted before yielding `n` values.
    fn sample_exact(&mut self, n: usize) -> Result<Vec<f64>> {
        let sample = self.sample(n).unwrap_or_default();

        if sample.len() != n {
            return Err(MlErr::SizeMismatch {
                what: "sampled params",
                got: sample.len(),
                expected: n,
            });
        }

        Ok(sample)
    }
}
