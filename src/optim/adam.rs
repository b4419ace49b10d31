use serde::{Deserialize, Serialize};

use crate::layers::ParamView;
use crate::math::tensor::Tensor;
use crate::optim::grad_clip_scale;

/// Adam optimizer.
///
/// Maintains first- and second-moment estimates per parameter, bias-corrects
/// both against their zero initialization, then updates
/// `w -= lr * m_hat / (sqrt(v_hat) + eps)`. The step counter increments once
/// per `step` call and feeds the correction terms. Weight decay is classic
/// additive L2, not decoupled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Adam {
    pub lr: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub eps: f64,
    pub weight_decay: f64,
    pub clip_grad_norm: Option<f64>,
    t: u32,
    m: Vec<Tensor>,
    v: Vec<Tensor>,
}

impl Adam {
    /// Defaults: beta1 0.9, beta2 0.999, eps 1e-8.
    pub fn new(lr: f64) -> Adam {
        Adam::with_betas(lr, 0.9, 0.999)
    }

    pub fn with_betas(lr: f64, beta1: f64, beta2: f64) -> Adam {
        assert!(lr > 0.0, "lr must be positive");
        assert!((0.0..1.0).contains(&beta1), "beta1 must be in [0, 1)");
        assert!((0.0..1.0).contains(&beta2), "beta2 must be in [0, 1)");
        Adam {
            lr,
            beta1,
            beta2,
            eps: 1e-8,
            weight_decay: 0.0,
            clip_grad_norm: None,
            t: 0,
            m: Vec::new(),
            v: Vec::new(),
        }
    }

    pub fn weight_decay(mut self, wd: f64) -> Adam {
        self.weight_decay = wd;
        self
    }

    /// Number of update steps taken so far.
    pub fn steps(&self) -> u32 {
        self.t
    }

    pub fn step(&mut self, params: &mut [ParamView<'_>]) {
        if self.m.is_empty() {
            self.m = params
                .iter()
                .map(|p| Tensor::zeros(p.value.shape()))
                .collect();
            self.v = self.m.clone();
        }
        assert_eq!(
            self.m.len(),
            params.len(),
            "parameter count changed mid-training"
        );

        let scale = grad_clip_scale(params, self.weight_decay, self.clip_grad_norm);

        self.t += 1;
        let bc1 = 1.0 - self.beta1.powi(self.t as i32);
        let bc2 = 1.0 - self.beta2.powi(self.t as i32);

        for (slot, p) in params.iter_mut().enumerate() {
            let m = &mut self.m[slot];
            let v = &mut self.v[slot];
            for (((w, &g), mi), vi) in p
                .value
                .data
                .iter_mut()
                .zip(p.grad.data.iter())
                .zip(m.data.iter_mut())
                .zip(v.data.iter_mut())
            {
                let eff = (g + self.weight_decay * *w) * scale;
                *mi = self.beta1 * *mi + (1.0 - self.beta1) * eff;
                *vi = self.beta2 * *vi + (1.0 - self.beta2) * eff * eff;
                let m_hat = *mi / bc1;
                let v_hat = *vi / bc2;
                *w -= self.lr * m_hat / (v_hat.sqrt() + self.eps);
            }
        }
    }
}
