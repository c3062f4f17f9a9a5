use std::f64::consts::TAU;

use ndarray::Array3;
use ndarray_rand::{
    RandomExt,
    rand_distr::{Normal, Uniform},
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use super::SequenceDataset;
use crate::{Result, TrainerErr};

const NOISE_STD_DEV: f64 = 0.1;

/// Generates `size` noisy sinusoids whose frequency depends on their class.
///
/// The sequence of class `c` oscillates `c + 1` times over its length, every input
/// channel with its own random phase. The same seed always yields the same dataset.
pub fn synthetic(
    size: usize,
    nsequence: usize,
    ninputs: usize,
    nclass: usize,
    seed: u64,
) -> Result<SequenceDataset> {
    let mut rng = StdRng::seed_from_u64(seed);

    let labels: Vec<usize> = (0..size).map(|_| rng.random_range(0..nclass)).collect();
    let phases = Array3::random_using((size, 1, ninputs), uniform(0., TAU)?, &mut rng);
    let noise = Normal::new(0., NOISE_STD_DEV).map_err(|e| TrainerErr::Dataset(e.to_string()))?;
    let mut inputs = Array3::random_using((size, nsequence, ninputs), noise, &mut rng);

    for ((i, t, j), x) in inputs.indexed_iter_mut() {
        let freq = (labels[i] + 1) as f64;
        *x += (TAU * freq * t as f64 / nsequence as f64 + phases[[i, 0, j]]).sin();
    }

    SequenceDataset::new(inputs, labels, None)
}

fn uniform(low: f64, high: f64) -> Result<Uniform<f64>> {
    Uniform::new(low, high).map_err(|e| TrainerErr::Dataset(e.to_string()))
}
