use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::optim::Optimizer;

/// Serializable scheduler selection for the training configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum SchedulerConfig {
    Step {
        step_size: usize,
        gamma: f64,
    },
    Cosine {
        t_max: usize,
        #[serde(default)]
        min_lr: f64,
    },
}

/// Learning-rate schedules.
///
/// A scheduler owns the base learning rate captured at construction and
/// mutates only the optimizer's current lr; optimizer-internal state is not
/// its concern. `step` is called once at the end of every epoch.
#[derive(Debug, Clone)]
pub enum LrScheduler {
    Step(StepLr),
    Cosine(CosineLr),
}

impl LrScheduler {
    pub fn from_config(config: &SchedulerConfig, optimizer: &Optimizer) -> LrScheduler {
        match *config {
            SchedulerConfig::Step { step_size, gamma } => {
                LrScheduler::Step(StepLr::new(optimizer, step_size, gamma))
            }
            SchedulerConfig::Cosine { t_max, min_lr } => {
                LrScheduler::Cosine(CosineLr::new(optimizer, t_max, min_lr))
            }
        }
    }

    pub fn step(&self, epoch: usize, optimizer: &mut Optimizer) {
        match self {
            LrScheduler::Step(s) => s.step(epoch, optimizer),
            LrScheduler::Cosine(s) => s.step(epoch, optimizer),
        }
    }
}

/// Step decay: multiplies the base lr by `gamma` every `step_size` epochs,
/// `lr = base * gamma^(epoch / step_size)`.
#[derive(Debug, Clone)]
pub struct StepLr {
    step_size: usize,
    gamma: f64,
    base_lr: f64,
}

impl StepLr {
    pub fn new(optimizer: &Optimizer, step_size: usize, gamma: f64) -> StepLr {
        assert!(step_size > 0, "step_size must be positive");
        StepLr {
            step_size,
            gamma,
            base_lr: optimizer.lr(),
        }
    }

    pub fn step(&self, epoch: usize, optimizer: &mut Optimizer) {
        let k = epoch / self.step_size;
        optimizer.set_lr(self.base_lr * self.gamma.powi(k as i32));
    }
}

/// Cosine annealing from the base lr down to `min_lr` over `t_max` epochs.
#[derive(Debug, Clone)]
pub struct CosineLr {
    t_max: usize,
    min_lr: f64,
    max_lr: f64,
}

impl CosineLr {
    pub fn new(optimizer: &Optimizer, t_max: usize, min_lr: f64) -> CosineLr {
        assert!(t_max > 0, "t_max must be positive");
        CosineLr {
            t_max,
            min_lr,
            max_lr: optimizer.lr(),
        }
    }

    pub fn step(&self, epoch: usize, optimizer: &mut Optimizer) {
        let t = epoch.clamp(1, self.t_max);
        let cos_inner = PI * (t - 1) as f64 / self.t_max as f64;
        let lr = self.min_lr + 0.5 * (self.max_lr - self.min_lr) * (1.0 + cos_inner.cos());
        optimizer.set_lr(lr);
    }
}
