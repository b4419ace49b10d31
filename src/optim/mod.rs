pub mod adam;
pub mod scheduler;
pub mod sgd;

pub use adam::Adam;
pub use scheduler::{CosineLr, LrScheduler, SchedulerConfig, StepLr};
pub use sgd::Sgd;

use crate::layers::ParamView;
use serde::{Deserialize, Serialize};

/// The closed set of optimizers.
///
/// Per-parameter state (velocity, moment estimates) is keyed by position in
/// the model's stable parameter iteration order, allocated lazily on the
/// first step and never reallocated mid-training. The whole optimizer,
/// state included, serializes for resumable checkpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Optimizer {
    Sgd(Sgd),
    Adam(Adam),
}

impl Optimizer {
    /// Applies one update to every parameter using its current gradient.
    pub fn step(&mut self, params: &mut [ParamView<'_>]) {
        match self {
            Optimizer::Sgd(o) => o.step(params),
            Optimizer::Adam(o) => o.step(params),
        }
    }

    pub fn lr(&self) -> f64 {
        match self {
            Optimizer::Sgd(o) => o.lr,
            Optimizer::Adam(o) => o.lr,
        }
    }

    /// Schedulers mutate the learning rate through this; nothing else of the
    /// optimizer's state is theirs to touch.
    pub fn set_lr(&mut self, lr: f64) {
        let lr = lr.max(1e-12);
        match self {
            Optimizer::Sgd(o) => o.lr = lr,
            Optimizer::Adam(o) => o.lr = lr,
        }
    }
}

impl From<Sgd> for Optimizer {
    fn from(o: Sgd) -> Optimizer {
        Optimizer::Sgd(o)
    }
}

impl From<Adam> for Optimizer {
    fn from(o: Adam) -> Optimizer {
        Optimizer::Adam(o)
    }
}

/// Global L2 norm of the effective gradients (weight decay folded in).
/// Returns the scale to apply, 1.0 when no clipping is needed.
pub(crate) fn grad_clip_scale(
    params: &[ParamView<'_>],
    weight_decay: f64,
    max_norm: Option<f64>,
) -> f64 {
    let Some(max_norm) = max_norm else {
        return 1.0;
    };
    let mut total_sq = 0.0;
    for p in params {
        for (&g, &w) in p.grad.data.iter().zip(p.value.data.iter()) {
            let eff = g + weight_decay * w;
            total_sq += eff * eff;
        }
    }
    let norm = total_sq.sqrt() + 1e-12;
    if norm > max_norm {
        max_norm / norm
    } else {
        1.0
    }
}
