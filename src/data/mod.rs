pub mod memory;

pub use memory::InMemoryDataset;

use crate::math::tensor::Tensor;

/// Labels for one batch: class indices for classification or a dense tensor
/// matching the network output for regression.
#[derive(Debug, Clone)]
pub enum Targets {
    Classes(Vec<usize>),
    Values(Tensor),
}

impl Targets {
    pub fn len(&self) -> usize {
        match self {
            Targets::Classes(labels) => labels.len(),
            Targets::Values(t) => t.dim(0),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One training step's worth of data. The leading batch dimension of
/// `inputs` matches `targets.len()`.
#[derive(Debug, Clone)]
pub struct Batch {
    pub inputs: Tensor,
    pub targets: Targets,
}

/// A finite, restartable sequence of batches.
///
/// The training loop calls `reset` at the top of every epoch, then drains
/// `next_batch` until it returns `None`. Implementations hand over fully
/// materialized batches; any prefetching or decoding happens behind this
/// boundary.
pub trait DataSource {
    /// Restarts the sequence (and reshuffles, if the source shuffles).
    fn reset(&mut self);

    fn next_batch(&mut self) -> Option<Batch>;

    /// Total number of samples per full pass.
    fn num_samples(&self) -> usize;
}
