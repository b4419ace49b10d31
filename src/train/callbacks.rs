use std::fs;
use std::path::PathBuf;

use crate::error::Result;
use crate::network::checkpoint::Checkpoint;
use crate::network::sequential::Sequential;
use crate::optim::Optimizer;
use crate::train::config::{CheckpointConfig, EarlyStoppingConfig, Mode};
use crate::train::epoch_stats::EpochStats;
use crate::train::state::TrainingState;

/// Stops training after `patience` epochs without improvement on the
/// monitored metric. A missing metric (e.g. `val_loss` on a run with no
/// validation set) is ignored; the loop rejects such configurations up
/// front.
pub struct EarlyStopping {
    monitor: String,
    patience: usize,
    mode: Mode,
    best: f64,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(config: &EarlyStoppingConfig) -> EarlyStopping {
        EarlyStopping {
            monitor: config.monitor.clone(),
            patience: config.patience.max(1),
            mode: config.mode,
            best: config.mode.worst(),
            wait: 0,
        }
    }

    /// Feeds one epoch's stats; returns true when training should stop.
    pub fn observe(&mut self, stats: &EpochStats) -> bool {
        let Some(value) = stats.metric(&self.monitor) else {
            return false;
        };
        if self.mode.improved(value, self.best) {
            self.best = value;
            self.wait = 0;
            false
        } else {
            self.wait += 1;
            self.wait >= self.patience
        }
    }

    pub fn monitor(&self) -> &str {
        &self.monitor
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}

/// Serializes a checkpoint whenever the monitored metric improves.
pub struct ModelCheckpoint {
    path: PathBuf,
    monitor: String,
    mode: Mode,
    best: f64,
}

impl ModelCheckpoint {
    pub fn new(config: &CheckpointConfig) -> ModelCheckpoint {
        ModelCheckpoint {
            path: config.path.clone(),
            monitor: config.monitor.clone(),
            mode: config.mode,
            best: config.mode.worst(),
        }
    }

    /// Feeds one epoch's stats; saves and returns true on improvement.
    pub fn observe(
        &mut self,
        stats: &EpochStats,
        network: &Sequential,
        optimizer: &Optimizer,
        state: &TrainingState,
    ) -> Result<bool> {
        let Some(value) = stats.metric(&self.monitor) else {
            return Ok(false);
        };
        if !self.mode.improved(value, self.best) {
            return Ok(false);
        }
        self.best = value;
        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        Checkpoint::save(&self.path, network, Some(optimizer), Some(state))?;
        Ok(true)
    }

    pub fn monitor(&self) -> &str {
        &self.monitor
    }

    pub fn best(&self) -> f64 {
        self.best
    }
}
