use serde::{Deserialize, Serialize};

/// Per-epoch training statistics emitted by `train_loop`.
///
/// When a `progress_tx` channel is configured in `TrainConfig`, the training
/// loop sends one `EpochStats` value at the end of every completed epoch.
/// Callbacks look metrics up by name through [`metric`](EpochStats::metric).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochStats {
    /// 1-based epoch number.
    pub epoch: usize,
    /// Total epochs requested for this run.
    pub total_epochs: usize,
    /// Mean training loss over all samples in this epoch.
    pub train_loss: f64,
    /// Training accuracy as a fraction in [0, 1]; only set for
    /// cross-entropy runs with class-index targets.
    pub train_accuracy: Option<f64>,
    /// Mean validation loss, if a validation set was provided.
    pub val_loss: Option<f64>,
    /// Validation accuracy; only set for cross-entropy runs when a
    /// validation set is available.
    pub val_accuracy: Option<f64>,
    /// Learning rate in effect during this epoch.
    pub lr: f64,
    /// Wall-clock duration of this single epoch in milliseconds.
    pub elapsed_ms: u64,
}

impl EpochStats {
    /// Looks a metric up by its monitor name: `train_loss`, `train_acc`,
    /// `val_loss` or `val_acc`. Returns `None` for unknown names and for
    /// metrics this run did not produce.
    pub fn metric(&self, name: &str) -> Option<f64> {
        match name {
            "train_loss" => Some(self.train_loss),
            "train_acc" => self.train_accuracy,
            "val_loss" => self.val_loss,
            "val_acc" => self.val_accuracy,
            _ => None,
        }
    }
}
