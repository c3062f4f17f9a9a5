use serde::{Deserialize, Serialize};

use crate::cache::WarmStartCache;

/// Where the state before the first input of every sequence comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitialStatePolicy {
    /// Every sequence starts from zeros.
    #[default]
    Zeros,
    /// Every batch carries its own initial states.
    Provided,
    /// A single trainable state shared by every sequence.
    Learned,
}

/// Everything a training run mutates, threaded through `Orchestrator::step`.
#[derive(Debug, Clone)]
pub struct TrainState<O> {
    /// The step parameters followed by the readout parameters and, under
    /// `InitialStatePolicy::Learned`, the initial state.
    pub params: Vec<f64>,
    pub optimizer: O,
    pub cache: WarmStartCache,
    /// The amount of successful steps taken.
    pub step: usize,
}
