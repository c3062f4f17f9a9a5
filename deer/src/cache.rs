use std::collections::HashSet;

use ndarray::{Array3, ArrayView2, ArrayView3, Axis};
use serde::{Deserialize, Serialize};

use crate::{MlErr, Result, error::check_size};

/// How the examples of a batch are mapped to cache entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarmStartKeying {
    /// One entry per dataset example, keyed by its id.
    #[default]
    Example,
    /// One entry per position within the batch.
    Slot,
}

impl WarmStartKeying {
    /// Returns the cache keys of a batch whose examples have the given `ids`.
    pub fn keys(&self, ids: &[usize]) -> Vec<usize> {
        match self {
            Self::Example => ids.to_vec(),
            Self::Slot => (0..ids.len()).collect(),
        }
    }

    /// Returns how many entries a cache needs under this keying.
    pub fn capacity(&self, dataset_len: usize, batch_size: usize) -> usize {
        match self {
            Self::Example => dataset_len,
            Self::Slot => batch_size,
        }
    }
}

/// Keeps the last trajectory computed for every key, used as the starting guess of the
/// next solve.
///
/// Every entry starts as zeros (a cold start) and is only ever overwritten.
#[derive(Debug, Clone)]
pub struct WarmStartCache {
    entries: Array3<f64>,
    warm: Vec<bool>,
}

impl WarmStartCache {
    /// Creates a new `WarmStartCache`.
    ///
    /// # Arguments
    /// * `capacity` - The amount of keys.
    /// * `nseq` - The length of the trajectories.
    /// * `nstates` - The width of the states.
    pub fn new(capacity: usize, nseq: usize, nstates: usize) -> Self {
        Self {
            entries: Array3::zeros((capacity, nseq, nstates)),
            warm: vec![false; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.warm.len()
    }

    /// Returns the `(nseq, nstates)` shape of the trajectories.
    pub fn trajectory_dim(&self) -> (usize, usize) {
        let (_, nseq, nstates) = self.entries.dim();
        (nseq, nstates)
    }

    /// Returns whether `key` was ever written.
    pub fn is_warm(&self, key: usize) -> bool {
        self.warm.get(key).copied().unwrap_or(false)
    }

    fn check_key(&self, key: usize) -> Result<()> {
        if key >= self.capacity() {
            return Err(MlErr::KeyOutOfBounds {
                key,
                capacity: self.capacity(),
            });
        }

        Ok(())
    }

    fn check_trajectory(&self, trajectory: ArrayView2<f64>) -> Result<()> {
        let (nseq, nstates) = self.trajectory_dim();
        check_size("cached trajectory rows", trajectory.nrows(), nseq)?;
        check_size("cached trajectory cols", trajectory.ncols(), nstates)
    }

    /// Returns the entry of `key`, zeros if it was never written.
    pub fn get(&self, key: usize) -> Result<ArrayView2<'_, f64>> {
        self.check_key(key)?;
        Ok(self.entries.index_axis(Axis(0), key))
    }

    /// Overwrites the entry of `key`.
    pub fn put(&mut self, key: usize, trajectory: ArrayView2<f64>) -> Result<()> {
        self.check_key(key)?;
        self.check_trajectory(trajectory)?;

        self.entries.index_axis_mut(Axis(0), key).assign(&trajectory);
        self.warm[key] = true;
        Ok(())
    }

    /// Gathers the entries of `keys` into a `(keys.len(), nseq, nstates)` array.
    pub fn get_batch(&self, keys: &[usize]) -> Result<Array3<f64>> {
        for &key in keys {
            self.check_key(key)?;
        }

        Ok(self.entries.select(Axis(0), keys))
    }

    /// Checks that `put_batch(keys, trajectories)` would succeed, without writing.
    pub fn validate_batch(&self, keys: &[usize], trajectories: ArrayView3<f64>) -> Result<()> {
        check_size("cached trajectories", trajectories.len_of(Axis(0)), keys.len())?;

        let mut seen = HashSet::with_capacity(keys.len());
        for (&key, trajectory) in keys.iter().zip(trajectories.outer_iter()) {
            self.check_key(key)?;
            self.check_trajectory(trajectory)?;

            if !seen.insert(key) {
                return Err(MlErr::DuplicatedKey(key));
            }
        }

        Ok(())
    }

    /// Overwrites the entries of `keys`, all of them or none.
    ///
    /// # Returns
    /// An error if a key is out of bounds or repeated, or if a trajectory has the wrong
    /// shape, in which case the cache is left untouched.
    pub fn put_batch(&mut self, keys: &[usize], trajectories: ArrayView3<f64>) -> Result<()> {
        self.validate_batch(keys, trajectories)?;

        for (&key, trajectory) in keys.iter().zip(trajectories.outer_iter()) {
            self.entries.index_axis_mut(Axis(0), key).assign(&trajectory);
            self.warm[key] = true;
        }

        Ok(())
    }

    /// Returns a copy of every entry, mostly useful for inspection.
    pub fn to_array(&self) -> Array3<f64> {
        self.entries.clone()
    }
}
