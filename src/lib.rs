pub mod data;
pub mod error;
pub mod layers;
pub mod loss;
pub mod math;
pub mod network;
pub mod optim;
pub mod train;

// Convenience re-exports
pub use data::{Batch, DataSource, InMemoryDataset, Targets};
pub use error::{Error, Result};
pub use layers::{BatchNorm2d, Conv2d, Dense, Dropout, Layer, MaxPool2d, ReLU, Sigmoid, WeightInit};
pub use loss::{LossType, MseLoss, SoftmaxCrossEntropy};
pub use math::tensor::Tensor;
pub use network::{Checkpoint, NetworkSpec, Sequential};
pub use optim::{Adam, LrScheduler, Optimizer, Sgd};
pub use train::{train_loop, EpochStats, StopReason, TrainConfig, TrainReport};
