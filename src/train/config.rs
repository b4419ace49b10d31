use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::{mpsc, Arc};

use crate::error::Result;
use crate::loss::loss_type::LossType;
use crate::optim::{Adam, Optimizer, SchedulerConfig, Sgd};
use crate::train::epoch_stats::EpochStats;

/// Optimizer selection for [`TrainConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Sgd,
    Momentum,
    Adam,
}

/// Direction in which a monitored metric improves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Min,
    Max,
}

impl Mode {
    pub fn improved(self, value: f64, best: f64) -> bool {
        match self {
            Mode::Min => value < best,
            Mode::Max => value > best,
        }
    }

    /// Starting "best" value that any real observation improves on.
    pub fn worst(self) -> f64 {
        match self {
            Mode::Min => f64::INFINITY,
            Mode::Max => f64::NEG_INFINITY,
        }
    }
}

fn default_monitor_loss() -> String {
    "val_loss".to_string()
}

fn default_monitor_acc() -> String {
    "val_acc".to_string()
}

fn default_patience() -> usize {
    5
}

fn default_mode_min() -> Mode {
    Mode::Min
}

fn default_mode_max() -> Mode {
    Mode::Max
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarlyStoppingConfig {
    #[serde(default = "default_monitor_loss")]
    pub monitor: String,
    #[serde(default = "default_patience")]
    pub patience: usize,
    #[serde(default = "default_mode_min")]
    pub mode: Mode,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    pub path: PathBuf,
    #[serde(default = "default_monitor_acc")]
    pub monitor: String,
    #[serde(default = "default_mode_max")]
    pub mode: Mode,
}

fn default_momentum() -> f64 {
    0.9
}

fn default_seed() -> u64 {
    42
}

/// Hyperparameters for a `train_loop` run.
///
/// The serializable fields are the configuration-file surface; the progress
/// channel and stop flag are runtime-only wiring. If the `progress_tx`
/// receiver is dropped the loop terminates early (clean shutdown); setting
/// `stop_flag` from another thread stops it after the current epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Total number of full passes over the training data.
    pub epochs: usize,
    /// Samples per mini-batch; consumed by the data source, recorded here as
    /// part of the run's configuration.
    pub batch_size: usize,
    /// Initial learning rate.
    pub lr: f64,
    pub optimizer: OptimizerKind,
    /// Momentum factor, used by `OptimizerKind::Momentum`.
    #[serde(default = "default_momentum")]
    pub momentum: f64,
    #[serde(default)]
    pub weight_decay: f64,
    pub loss: LossType,
    #[serde(default)]
    pub scheduler: Option<SchedulerConfig>,
    #[serde(default)]
    pub early_stopping: Option<EarlyStoppingConfig>,
    #[serde(default)]
    pub checkpoint: Option<CheckpointConfig>,
    #[serde(default = "default_seed")]
    pub seed: u64,
    /// Optional channel sender; one `EpochStats` is sent per completed epoch.
    #[serde(skip)]
    pub progress_tx: Option<mpsc::Sender<EpochStats>>,
    /// Optional atomic flag checked between epochs.
    #[serde(skip)]
    pub stop_flag: Option<Arc<AtomicBool>>,
}

impl TrainConfig {
    /// Creates a minimal config with no scheduler, callbacks, progress
    /// channel or stop flag.
    pub fn new(
        epochs: usize,
        batch_size: usize,
        lr: f64,
        optimizer: OptimizerKind,
        loss: LossType,
    ) -> TrainConfig {
        TrainConfig {
            epochs,
            batch_size,
            lr,
            optimizer,
            momentum: default_momentum(),
            weight_decay: 0.0,
            loss,
            scheduler: None,
            early_stopping: None,
            checkpoint: None,
            seed: default_seed(),
            progress_tx: None,
            stop_flag: None,
        }
    }

    /// Materializes the configured optimizer.
    pub fn build_optimizer(&self) -> Optimizer {
        match self.optimizer {
            OptimizerKind::Sgd => Sgd::new(self.lr).weight_decay(self.weight_decay).into(),
            OptimizerKind::Momentum => Sgd::with_momentum(self.lr, self.momentum)
                .weight_decay(self.weight_decay)
                .into(),
            OptimizerKind::Adam => Adam::new(self.lr).weight_decay(self.weight_decay).into(),
        }
    }

    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<TrainConfig> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
