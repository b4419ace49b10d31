use serde::{Deserialize, Serialize};

use crate::layers::ParamView;
use crate::math::tensor::Tensor;
use crate::optim::grad_clip_scale;

/// Stochastic gradient descent with optional momentum and Nesterov lookahead.
///
/// L2 weight decay is the classic additive form: `g += weight_decay * w`
/// before the update. Velocity buffers appear on the first step and keep
/// their shapes for the rest of training.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sgd {
    pub lr: f64,
    pub momentum: f64,
    pub nesterov: bool,
    pub weight_decay: f64,
    pub clip_grad_norm: Option<f64>,
    velocity: Vec<Tensor>,
}

impl Sgd {
    /// Plain SGD: `w -= lr * g`.
    pub fn new(lr: f64) -> Sgd {
        Sgd::with_momentum(lr, 0.0)
    }

    /// Momentum SGD: `v = momentum * v + g; w -= lr * v`.
    pub fn with_momentum(lr: f64, momentum: f64) -> Sgd {
        assert!(lr > 0.0, "lr must be positive");
        assert!(momentum >= 0.0, "momentum must be non-negative");
        Sgd {
            lr,
            momentum,
            nesterov: false,
            weight_decay: 0.0,
            clip_grad_norm: None,
            velocity: Vec::new(),
        }
    }

    pub fn nesterov(mut self) -> Sgd {
        self.nesterov = true;
        self
    }

    pub fn weight_decay(mut self, wd: f64) -> Sgd {
        self.weight_decay = wd;
        self
    }

    pub fn step(&mut self, params: &mut [ParamView<'_>]) {
        if self.velocity.is_empty() && self.momentum != 0.0 {
            self.velocity = params
                .iter()
                .map(|p| Tensor::zeros(p.value.shape()))
                .collect();
        }
        if self.momentum != 0.0 {
            assert_eq!(
                self.velocity.len(),
                params.len(),
                "parameter count changed mid-training"
            );
        }

        let scale = grad_clip_scale(params, self.weight_decay, self.clip_grad_norm);

        for (slot, p) in params.iter_mut().enumerate() {
            if self.momentum == 0.0 {
                for (w, &g) in p.value.data.iter_mut().zip(p.grad.data.iter()) {
                    let eff = (g + self.weight_decay * *w) * scale;
                    *w -= self.lr * eff;
                }
                continue;
            }

            let v = &mut self.velocity[slot];
            for ((w, &g), vel) in p
                .value
                .data
                .iter_mut()
                .zip(p.grad.data.iter())
                .zip(v.data.iter_mut())
            {
                let eff = (g + self.weight_decay * *w) * scale;
                *vel = self.momentum * *vel + eff;
                if self.nesterov {
                    *w -= self.lr * (self.momentum * *vel + eff);
                } else {
                    *w -= self.lr * *vel;
                }
            }
        }
    }
}
