pub mod callbacks;
pub mod config;
pub mod epoch_stats;
pub mod loop_fn;
pub mod metrics;
pub mod state;

pub use callbacks::{EarlyStopping, ModelCheckpoint};
pub use config::{CheckpointConfig, EarlyStoppingConfig, Mode, OptimizerKind, TrainConfig};
pub use epoch_stats::EpochStats;
pub use loop_fn::{train_loop, StopReason, TrainReport};
pub use metrics::{accuracy, topk_accuracy};
pub use state::TrainingState;
