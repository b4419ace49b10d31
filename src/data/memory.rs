use rand::prelude::*;

use crate::data::{Batch, DataSource, Targets};
use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// A [`DataSource`] over tensors already resident in memory.
///
/// Slices mini-batches off the leading axis; with shuffling enabled the
/// sample order is re-permuted on every reset using the dataset's own seeded
/// RNG.
pub struct InMemoryDataset {
    inputs: Tensor,
    targets: Targets,
    batch_size: usize,
    shuffle: Option<StdRng>,
    order: Vec<usize>,
    cursor: usize,
}

impl InMemoryDataset {
    pub fn new(inputs: Tensor, targets: Targets, batch_size: usize) -> Result<InMemoryDataset> {
        if batch_size == 0 {
            return Err(Error::InvalidConfig("batch_size must be at least 1".to_string()));
        }
        if inputs.ndim() < 2 {
            return Err(Error::InvalidConfig(
                "dataset inputs need a leading batch axis".to_string(),
            ));
        }
        let n = inputs.dim(0);
        if n == 0 {
            return Err(Error::InvalidConfig("dataset must not be empty".to_string()));
        }
        if targets.len() != n {
            return Err(Error::InvalidConfig(format!(
                "dataset has {n} inputs but {} targets",
                targets.len()
            )));
        }
        Ok(InMemoryDataset {
            inputs,
            targets,
            batch_size,
            shuffle: None,
            order: (0..n).collect(),
            cursor: 0,
        })
    }

    /// Enables per-epoch shuffling with a dedicated seed.
    pub fn shuffled(mut self, seed: u64) -> InMemoryDataset {
        self.shuffle = Some(StdRng::seed_from_u64(seed));
        self
    }
}

impl DataSource for InMemoryDataset {
    fn reset(&mut self) {
        self.cursor = 0;
        if let Some(rng) = self.shuffle.as_mut() {
            self.order.shuffle(rng);
        }
    }

    fn next_batch(&mut self) -> Option<Batch> {
        let n = self.order.len();
        if self.cursor >= n {
            return None;
        }
        let end = (self.cursor + self.batch_size).min(n);
        let indices = &self.order[self.cursor..end];
        self.cursor = end;

        let inputs = self.inputs.gather_rows(indices);
        let targets = match &self.targets {
            Targets::Classes(labels) => {
                Targets::Classes(indices.iter().map(|&i| labels[i]).collect())
            }
            Targets::Values(values) => Targets::Values(values.gather_rows(indices)),
        };
        Some(Batch { inputs, targets })
    }

    fn num_samples(&self) -> usize {
        self.order.len()
    }
}
