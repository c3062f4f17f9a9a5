use std::num::NonZeroUsize;

use deer::training::{Batch, DataSource};
use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::SequenceDataset;

/// Yields fixed-size batches over a `SequenceDataset`.
///
/// A trailing incomplete batch is dropped, so every batch holds exactly `batch_size`
/// examples. When shuffling, every call to `reset` draws a new order from a seeded rng.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: SequenceDataset,
    batch_size: NonZeroUsize,
    order: Vec<usize>,
    cursor: usize,
    rng: Option<StdRng>,
}

impl DataLoader {
    /// Creates a new `DataLoader` that visits the dataset in order.
    pub fn new(dataset: SequenceDataset, batch_size: NonZeroUsize) -> Self {
        let order = (0..dataset.len()).collect();

        Self {
            dataset,
            batch_size,
            order,
            cursor: 0,
            rng: None,
        }
    }

    /// Shuffles the dataset at the start of every epoch.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn dataset(&self) -> &SequenceDataset {
        &self.dataset
    }

    /// Returns the amount of batches per epoch.
    pub fn len(&self) -> usize {
        self.dataset.len() / self.batch_size
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DataSource for DataLoader {
    fn next_batch(&mut self) -> Option<deer::Result<Batch>> {
        let end = self.cursor + self.batch_size.get();
        if end > self.order.len() {
            return None;
        }

        let batch = self.dataset.batch(&self.order[self.cursor..end]);
        self.cursor = end;
        Some(Ok(batch))
    }

    fn reset(&mut self) {
        self.cursor = 0;

        if let Some(rng) = &mut self.rng {
            self.order.shuffle(rng);
        }
    }

    fn batch_size(&self) -> usize {
        self.batch_size.get()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::Array3;

    use super::*;

    fn dataset(size: usize) -> SequenceDataset {
        let inputs = Array3::from_shape_fn((size, 2, 1), |(i, _, _)| i as f64);
        SequenceDataset::new(inputs, vec![0; size], None).unwrap()
    }

    fn epoch(loader: &mut DataLoader) -> Vec<Vec<usize>> {
        loader.reset();

        let mut ids = Vec::new();
        while let Some(batch) = loader.next_batch() {
            ids.push(batch.unwrap().ids);
        }
        ids
    }

    #[test]
    fn drops_the_incomplete_batch() {
        let mut loader = DataLoader::new(dataset(7), NonZeroUsize::new(3).unwrap());

        assert_eq!(loader.len(), 2);
        assert_eq!(epoch(&mut loader), vec![vec![0, 1, 2], vec![3, 4, 5]]);
        assert_eq!(epoch(&mut loader), vec![vec![0, 1, 2], vec![3, 4, 5]]);
    }

    #[test]
    fn shuffling_is_seeded_and_changes_every_epoch() {
        let batch_size = NonZeroUsize::new(4).unwrap();
        let mut a = DataLoader::new(dataset(16), batch_size).shuffled(3);
        let mut b = DataLoader::new(dataset(16), batch_size).shuffled(3);

        let first = epoch(&mut a);
        assert_eq!(first, epoch(&mut b));
        assert_ne!(first, epoch(&mut a));

        let mut seen: Vec<usize> = first.into_iter().flatten().collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..16).collect::<Vec<_>>());
    }

    #[test]
    fn batch_matches_its_ids() {
        let mut loader = DataLoader::new(dataset(6), NonZeroUsize::new(2).unwrap()).shuffled(0);
        loader.reset();

        let batch = loader.next_batch().unwrap().unwrap();
        for (b, &id) in batch.ids.iter().enumerate() {
            assert_eq!(batch.inputs[[b, 0, 0]], id as f64);
        }
    }

    #[test]
    fn too_small_dataset_yields_nothing() {
        let mut loader = DataLoader::new(dataset(2), NonZeroUsize::new(3).unwrap());

        assert!(loader.is_empty());
        assert!(epoch(&mut loader).is_empty());
    }
}
