use serde::{Deserialize, Serialize};

/// Process-local counters owned by the training loop, reset only at an
/// explicit restart. Saved into checkpoints so a resumed run continues its
/// step numbering and learning rate where it left off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingState {
    /// Last completed epoch, 1-based; 0 before the first epoch finishes.
    pub epoch: usize,
    /// Optimizer steps taken across all epochs.
    pub global_step: usize,
    /// Learning rate currently in effect.
    pub lr: f64,
    /// Best value of the monitored metric seen so far, if any callback
    /// monitors one.
    pub best_metric: Option<f64>,
    /// Seed this run was configured with.
    pub seed: u64,
}

impl TrainingState {
    pub fn new(seed: u64, lr: f64) -> TrainingState {
        TrainingState {
            epoch: 0,
            global_step: 0,
            lr,
            best_metric: None,
            seed,
        }
    }
}
