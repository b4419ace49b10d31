pub mod cross_entropy;
pub mod loss_type;
pub mod mse;

pub use cross_entropy::SoftmaxCrossEntropy;
pub use loss_type::LossType;
pub use mse::MseLoss;
