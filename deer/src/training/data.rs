use ndarray::{Array2, Array3, Axis};

use crate::{Result, error::check_size};

/// A batch of labelled sequences.
#[derive(Debug, Clone)]
pub struct Batch {
    /// The dataset index of every example.
    pub ids: Vec<usize>,
    /// The `(batch, nseq, ninputs)` input sequences.
    pub inputs: Array3<f64>,
    pub labels: Vec<usize>,
    /// The `(batch, nstates)` initial states, for data sources that provide them.
    pub initial_states: Option<Array2<f64>>,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checks that every field describes the same amount of examples.
    pub fn validate(&self) -> Result<()> {
        check_size("batch inputs", self.inputs.len_of(Axis(0)), self.len())?;
        check_size("batch labels", self.labels.len(), self.len())?;

        if let Some(initial_states) = &self.initial_states {
            check_size("batch initial states", initial_states.nrows(), self.len())?;
        }

        Ok(())
    }
}

/// Yields the batches of an epoch.
pub trait DataSource {
    /// Returns the next batch, or `None` once the epoch is exhausted.
    fn next_batch(&mut self) -> Option<Result<Batch>>;

    /// Starts a new epoch.
    fn reset(&mut self);

    fn batch_size(&self) -> usize;
}
