use thiserror::Error;

/// Errors surfaced by the numeric core and the training loop.
///
/// None of these are recovered internally; the training loop propagates
/// everything to the caller. Early stopping is not an error, it is reported
/// as a [`crate::train::StopReason`].
#[derive(Debug, Error)]
pub enum Error {
    /// Layer input/output shapes are inconsistent. Fatal at construction or
    /// first forward.
    #[error("{layer}: shape mismatch, expected {expected}, got {got}")]
    ShapeMismatch {
        layer: &'static str,
        expected: String,
        got: String,
    },

    /// Backward invoked without a matching prior training-mode forward.
    #[error("{layer}: backward called without a prior training-mode forward")]
    UninitializedCache { layer: &'static str },

    /// Training-mode forward invoked while a previous forward's cache is
    /// still pending consumption by backward.
    #[error("{layer}: forward called in training mode with an unconsumed cache")]
    UnconsumedCache { layer: &'static str },

    /// NaN or Inf detected in the loss during training.
    #[error("numerical instability: {context} not finite at epoch {epoch}, step {step}")]
    NumericalInstability {
        context: String,
        epoch: usize,
        step: usize,
    },

    /// Finite-difference gradient diverged from the analytic gradient.
    /// Produced by the gradient-checking support used in tests.
    #[error("gradient check failed: max error {max_err:.3e} exceeds tolerance {tolerance:.3e}")]
    GradientCheck { max_err: f64, tolerance: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
