use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::{ParamView, WeightInit};
use crate::math::tensor::Tensor;

/// Fully-connected layer: `y = x . W^T + b` with `W: (out, in)`.
///
/// Inputs of rank > 2 are flattened to `(N, -1)` on the way in and the input
/// gradient is reshaped back on the way out, so a convolutional stack feeds
/// straight into its classifier head without an explicit flatten layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dense {
    in_features: usize,
    out_features: usize,
    w: Tensor,
    b: Option<Tensor>,
    dw: Tensor,
    db: Option<Tensor>,
    #[serde(skip)]
    cache: Option<DenseCache>,
}

#[derive(Debug, Clone)]
struct DenseCache {
    x2: Tensor,
    x_shape: Vec<usize>,
}

impl Dense {
    /// Bias enabled, Xavier-uniform init.
    pub fn new(in_features: usize, out_features: usize, rng: &mut StdRng) -> Dense {
        Dense::with_init(in_features, out_features, true, WeightInit::XavierUniform, rng)
    }

    pub fn with_init(
        in_features: usize,
        out_features: usize,
        bias: bool,
        init: WeightInit,
        rng: &mut StdRng,
    ) -> Dense {
        assert!(in_features > 0 && out_features > 0, "features must be positive");
        let w = init.sample(&[out_features, in_features], rng);
        let dw = Tensor::zeros(&[out_features, in_features]);
        let (b, db) = if bias {
            (
                Some(Tensor::zeros(&[out_features])),
                Some(Tensor::zeros(&[out_features])),
            )
        } else {
            (None, None)
        };
        Dense {
            in_features,
            out_features,
            w,
            b,
            dw,
            db,
            cache: None,
        }
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        if x.ndim() < 2 {
            return Err(Error::ShapeMismatch {
                layer: "Dense",
                expected: "(N, features) or (N, C, H, W)".to_string(),
                got: format!("{:?}", x.shape()),
            });
        }
        let n = x.dim(0);
        let features = x.numel() / n.max(1);
        if features != self.in_features {
            return Err(Error::ShapeMismatch {
                layer: "Dense",
                expected: format!("{} input features", self.in_features),
                got: format!("{features}"),
            });
        }
        if training && self.cache.is_some() {
            return Err(Error::UnconsumedCache { layer: "Dense" });
        }

        let x2 = x.reshaped(&[n, self.in_features]);
        let mut y = x2.matmul(&self.w.transpose2());
        if let Some(b) = &self.b {
            for row in y.data.chunks_mut(self.out_features) {
                for (v, &bias) in row.iter_mut().zip(b.data.iter()) {
                    *v += bias;
                }
            }
        }

        if training {
            self.cache = Some(DenseCache {
                x2,
                x_shape: x.shape().to_vec(),
            });
        }
        Ok(y)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let cache = self
            .cache
            .take()
            .ok_or(Error::UninitializedCache { layer: "Dense" })?;
        let n = cache.x2.dim(0);
        if grad_out.shape() != [n, self.out_features] {
            return Err(Error::ShapeMismatch {
                layer: "Dense",
                expected: format!("[{n}, {}]", self.out_features),
                got: format!("{:?}", grad_out.shape()),
            });
        }

        self.dw = grad_out.transpose2().matmul(&cache.x2);
        if let Some(db) = self.db.as_mut() {
            db.fill(0.0);
            for row in grad_out.data.chunks(self.out_features) {
                for (acc, &g) in db.data.iter_mut().zip(row.iter()) {
                    *acc += g;
                }
            }
        }

        let grad_x2 = grad_out.matmul(&self.w);
        Ok(grad_x2.reshape(&cache.x_shape))
    }

    pub fn param_views(&mut self) -> Vec<ParamView<'_>> {
        let mut views = vec![ParamView {
            name: "W".to_string(),
            value: &mut self.w,
            grad: &mut self.dw,
        }];
        if let (Some(b), Some(db)) = (self.b.as_mut(), self.db.as_mut()) {
            views.push(ParamView {
                name: "b".to_string(),
                value: b,
                grad: db,
            });
        }
        views
    }

    pub fn params(&self) -> Vec<(&'static str, &Tensor)> {
        let mut out = vec![("W", &self.w)];
        if let Some(b) = &self.b {
            out.push(("b", b));
        }
        out
    }

    pub fn weight(&self) -> &Tensor {
        &self.w
    }

    pub fn weight_mut(&mut self) -> &mut Tensor {
        &mut self.w
    }

    pub fn weight_grad(&self) -> &Tensor {
        &self.dw
    }

    pub fn bias(&self) -> Option<&Tensor> {
        self.b.as_ref()
    }

    pub fn bias_grad(&self) -> Option<&Tensor> {
        self.db.as_ref()
    }
}
