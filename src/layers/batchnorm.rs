use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::ParamView;
use crate::math::tensor::Tensor;

/// Batch normalization for `(N, C, H, W)` feature maps.
///
/// Training mode normalizes with per-channel batch statistics computed over
/// the N, H, W axes and folds them into the running averages
/// `running = momentum * running + (1 - momentum) * batch`; inference mode
/// normalizes with the running statistics only. Gamma scales, beta shifts,
/// both learnable per channel.
///
/// Backward uses the closed form that accounts for every element of a
/// channel coupling through the shared mean and variance:
/// `dx = gamma * inv_std * (dy - mean(dy) - x_hat * mean(dy * x_hat))`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchNorm2d {
    num_features: usize,
    eps: f64,
    momentum: f64,
    gamma: Tensor,
    beta: Tensor,
    running_mean: Tensor,
    running_var: Tensor,
    dgamma: Tensor,
    dbeta: Tensor,
    #[serde(skip)]
    cache: Option<BnCache>,
}

#[derive(Debug, Clone)]
struct BnCache {
    x_hat: Tensor,
    /// Per-channel 1/sqrt(var + eps).
    inv_std: Tensor,
}

impl BatchNorm2d {
    /// Defaults: eps 1e-5, momentum 0.9.
    pub fn new(num_features: usize) -> BatchNorm2d {
        BatchNorm2d::with_params(num_features, 1e-5, 0.9)
    }

    pub fn with_params(num_features: usize, eps: f64, momentum: f64) -> BatchNorm2d {
        assert!(num_features > 0, "num_features must be positive");
        assert!(eps > 0.0, "eps must be positive");
        assert!((0.0..1.0).contains(&momentum), "momentum must be in [0, 1)");
        BatchNorm2d {
            num_features,
            eps,
            momentum,
            gamma: Tensor::ones(&[num_features]),
            beta: Tensor::zeros(&[num_features]),
            running_mean: Tensor::zeros(&[num_features]),
            running_var: Tensor::ones(&[num_features]),
            dgamma: Tensor::zeros(&[num_features]),
            dbeta: Tensor::zeros(&[num_features]),
            cache: None,
        }
    }

    fn check_input(&self, x: &Tensor) -> Result<()> {
        if x.ndim() != 4 || x.dim(1) != self.num_features {
            return Err(Error::ShapeMismatch {
                layer: "BatchNorm2d",
                expected: format!("(N, {}, H, W)", self.num_features),
                got: format!("{:?}", x.shape()),
            });
        }
        Ok(())
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        self.check_input(x)?;
        let (n, c, h, w) = (x.dim(0), x.dim(1), x.dim(2), x.dim(3));
        let plane = h * w;
        let per_channel = (n * plane) as f64;

        if !training {
            // Eval: normalize with the stored running statistics.
            let mut y = Tensor::zeros(x.shape());
            for img in 0..n {
                for ch in 0..c {
                    let inv_std = 1.0 / (self.running_var.data[ch] + self.eps).sqrt();
                    let mean = self.running_mean.data[ch];
                    let base = (img * c + ch) * plane;
                    for k in 0..plane {
                        let x_hat = (x.data[base + k] - mean) * inv_std;
                        y.data[base + k] = self.gamma.data[ch] * x_hat + self.beta.data[ch];
                    }
                }
            }
            return Ok(y);
        }

        if self.cache.is_some() {
            return Err(Error::UnconsumedCache { layer: "BatchNorm2d" });
        }

        // Per-channel mean and biased variance over N*H*W.
        let mut mean = vec![0.0; c];
        let mut var = vec![0.0; c];
        for img in 0..n {
            for ch in 0..c {
                let base = (img * c + ch) * plane;
                for k in 0..plane {
                    mean[ch] += x.data[base + k];
                }
            }
        }
        for m in mean.iter_mut() {
            *m /= per_channel;
        }
        for img in 0..n {
            for ch in 0..c {
                let base = (img * c + ch) * plane;
                for k in 0..plane {
                    let d = x.data[base + k] - mean[ch];
                    var[ch] += d * d;
                }
            }
        }
        for v in var.iter_mut() {
            *v /= per_channel;
        }

        let mut inv_std = Tensor::zeros(&[c]);
        for ch in 0..c {
            inv_std.data[ch] = 1.0 / (var[ch] + self.eps).sqrt();
        }

        let mut x_hat = Tensor::zeros(x.shape());
        let mut y = Tensor::zeros(x.shape());
        for img in 0..n {
            for ch in 0..c {
                let base = (img * c + ch) * plane;
                for k in 0..plane {
                    let xn = (x.data[base + k] - mean[ch]) * inv_std.data[ch];
                    x_hat.data[base + k] = xn;
                    y.data[base + k] = self.gamma.data[ch] * xn + self.beta.data[ch];
                }
            }
        }

        // Running statistics move only in training mode.
        for ch in 0..c {
            self.running_mean.data[ch] =
                self.momentum * self.running_mean.data[ch] + (1.0 - self.momentum) * mean[ch];
            self.running_var.data[ch] =
                self.momentum * self.running_var.data[ch] + (1.0 - self.momentum) * var[ch];
        }

        self.cache = Some(BnCache { x_hat, inv_std });
        Ok(y)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let cache = self
            .cache
            .take()
            .ok_or(Error::UninitializedCache { layer: "BatchNorm2d" })?;
        if grad_out.shape() != cache.x_hat.shape() {
            return Err(Error::ShapeMismatch {
                layer: "BatchNorm2d",
                expected: format!("{:?}", cache.x_hat.shape()),
                got: format!("{:?}", grad_out.shape()),
            });
        }

        let (n, c, h, w) = (
            grad_out.dim(0),
            grad_out.dim(1),
            grad_out.dim(2),
            grad_out.dim(3),
        );
        let plane = h * w;
        let per_channel = (n * plane) as f64;

        self.dgamma.fill(0.0);
        self.dbeta.fill(0.0);
        for img in 0..n {
            for ch in 0..c {
                let base = (img * c + ch) * plane;
                for k in 0..plane {
                    let dy = grad_out.data[base + k];
                    self.dgamma.data[ch] += dy * cache.x_hat.data[base + k];
                    self.dbeta.data[ch] += dy;
                }
            }
        }

        let mut grad_x = Tensor::zeros(grad_out.shape());
        for img in 0..n {
            for ch in 0..c {
                let mean_dy = self.dbeta.data[ch] / per_channel;
                let mean_dy_xhat = self.dgamma.data[ch] / per_channel;
                let scale = self.gamma.data[ch] * cache.inv_std.data[ch];
                let base = (img * c + ch) * plane;
                for k in 0..plane {
                    let dy = grad_out.data[base + k];
                    grad_x.data[base + k] =
                        scale * (dy - mean_dy - cache.x_hat.data[base + k] * mean_dy_xhat);
                }
            }
        }
        Ok(grad_x)
    }

    pub fn param_views(&mut self) -> Vec<ParamView<'_>> {
        vec![
            ParamView {
                name: "gamma".to_string(),
                value: &mut self.gamma,
                grad: &mut self.dgamma,
            },
            ParamView {
                name: "beta".to_string(),
                value: &mut self.beta,
                grad: &mut self.dbeta,
            },
        ]
    }

    pub fn params(&self) -> Vec<(&'static str, &Tensor)> {
        vec![("gamma", &self.gamma), ("beta", &self.beta)]
    }

    pub fn gamma(&self) -> &Tensor {
        &self.gamma
    }

    pub fn beta(&self) -> &Tensor {
        &self.beta
    }

    pub fn gamma_grad(&self) -> &Tensor {
        &self.dgamma
    }

    pub fn beta_grad(&self) -> &Tensor {
        &self.dbeta
    }

    pub fn running_mean(&self) -> &Tensor {
        &self.running_mean
    }

    pub fn running_var(&self) -> &Tensor {
        &self.running_var
    }
}
