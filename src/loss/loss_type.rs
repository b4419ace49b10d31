use serde::{Deserialize, Serialize};

/// Selects which loss function the training loop uses.
///
/// - `Mse`: mean-squared error over every output element; pair with
///   dense-tensor targets (regression).
/// - `CrossEntropy`: softmax cross-entropy over class logits; pair with
///   class-index targets. The gradient is the fused Softmax+CE form
///   `(softmax(logits) - one_hot) / N` computed directly on the logits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossType {
    Mse,
    CrossEntropy,
}
