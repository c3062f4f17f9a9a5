use deer::training::Batch;
use ndarray::{Array2, Array3, Axis};

use crate::{Result, TrainerErr};

/// A labelled set of sequences held in memory.
#[derive(Debug, Clone)]
pub struct SequenceDataset {
    /// `(size, nseq, ninputs)`
    inputs: Array3<f64>,
    labels: Vec<usize>,
    /// `(size, nstates)`
    initial_states: Option<Array2<f64>>,
}

impl SequenceDataset {
    /// Creates a new dataset.
    ///
    /// # Returns
    /// An error if the dataset is empty or if its parts disagree on the amount of examples.
    pub fn new(
        inputs: Array3<f64>,
        labels: Vec<usize>,
        initial_states: Option<Array2<f64>>,
    ) -> Result<Self> {
        let size = inputs.len_of(Axis(0));

        if size == 0 {
            return Err(TrainerErr::Dataset("the dataset is empty".into()));
        }

        if labels.len() != size {
            return Err(TrainerErr::Dataset(format!(
                "got {} labels for {size} sequences",
                labels.len()
            )));
        }

        if let Some(states) = &initial_states
            && states.nrows() != size
        {
            return Err(TrainerErr::Dataset(format!(
                "got {} initial states for {size} sequences",
                states.nrows()
            )));
        }

        Ok(Self {
            inputs,
            labels,
            initial_states,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Returns the length of every sequence.
    pub fn nsequence(&self) -> usize {
        self.inputs.len_of(Axis(1))
    }

    pub fn ninputs(&self) -> usize {
        self.inputs.len_of(Axis(2))
    }

    /// Returns the width of the initial states, if the dataset carries them.
    pub fn nstates(&self) -> Option<usize> {
        self.initial_states.as_ref().map(Array2::ncols)
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Gathers the examples at `ids` into a batch.
    ///
    /// # Panics
    /// If an id is out of bounds.
    pub fn batch(&self, ids: &[usize]) -> Batch {
        Batch {
            ids: ids.to_vec(),
            inputs: self.inputs.select(Axis(0), ids),
            labels: ids.iter().map(|&id| self.labels[id]).collect(),
            initial_states: self
                .initial_states
                .as_ref()
                .map(|states| states.select(Axis(0), ids)),
        }
    }
}
