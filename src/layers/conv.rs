use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::layers::{ParamView, WeightInit};
use crate::math::im2col::{col2im, im2col, out_size};
use crate::math::tensor::Tensor;

/// 2-D convolution over `(N, C, H, W)` tensors via im2col.
///
/// Weights: `(out_channels, in_channels, KH, KW)`; bias: `(out_channels,)`.
/// Output spatial size is `(in + 2*pad - kernel)/stride + 1` per axis.
/// The forward pass caches the column matrix; backward consumes it, computing
/// `dW = dy^T . cols`, `db = sum(dy)` over batch and spatial axes, and
/// `dx = col2im(dy . W_row)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: (usize, usize),
    stride: usize,
    padding: usize,
    w: Tensor,
    b: Option<Tensor>,
    dw: Tensor,
    db: Option<Tensor>,
    #[serde(skip)]
    cache: Option<ConvCache>,
}

#[derive(Debug, Clone)]
struct ConvCache {
    x_shape: [usize; 4],
    cols: Tensor,
    out_hw: (usize, usize),
}

impl Conv2d {
    /// Square kernel, bias enabled, He-normal init.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        stride: usize,
        padding: usize,
        rng: &mut StdRng,
    ) -> Conv2d {
        Conv2d::with_init(
            in_channels,
            out_channels,
            (kernel_size, kernel_size),
            stride,
            padding,
            true,
            WeightInit::HeNormal,
            rng,
        )
    }

    #[allow(clippy::too_many_arguments)]
    pub fn with_init(
        in_channels: usize,
        out_channels: usize,
        kernel: (usize, usize),
        stride: usize,
        padding: usize,
        bias: bool,
        init: WeightInit,
        rng: &mut StdRng,
    ) -> Conv2d {
        assert!(in_channels > 0 && out_channels > 0, "channels must be positive");
        assert!(kernel.0 > 0 && kernel.1 > 0, "kernel dims must be positive");
        assert!(stride >= 1, "stride must be >= 1");

        let w_shape = [out_channels, in_channels, kernel.0, kernel.1];
        let w = init.sample(&w_shape, rng);
        let dw = Tensor::zeros(&w_shape);
        let (b, db) = if bias {
            (
                Some(Tensor::zeros(&[out_channels])),
                Some(Tensor::zeros(&[out_channels])),
            )
        } else {
            (None, None)
        };

        Conv2d {
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            w,
            b,
            dw,
            db,
            cache: None,
        }
    }

    fn out_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let (kh, kw) = self.kernel;
        if h + 2 * self.padding < kh || w + 2 * self.padding < kw {
            return Err(Error::ShapeMismatch {
                layer: "Conv2d",
                expected: format!("padded spatial extent >= kernel {:?}", self.kernel),
                got: format!("({h}, {w}) with padding {}", self.padding),
            });
        }
        Ok((
            out_size(h, kh, self.stride, self.padding),
            out_size(w, kw, self.stride, self.padding),
        ))
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        if x.ndim() != 4 {
            return Err(Error::ShapeMismatch {
                layer: "Conv2d",
                expected: "(N, C, H, W)".to_string(),
                got: format!("{:?}", x.shape()),
            });
        }
        let (n, c, h, w) = (x.dim(0), x.dim(1), x.dim(2), x.dim(3));
        if c != self.in_channels {
            return Err(Error::ShapeMismatch {
                layer: "Conv2d",
                expected: format!("{} input channels", self.in_channels),
                got: format!("{c}"),
            });
        }
        let (out_h, out_w) = self.out_hw(h, w)?;
        if training && self.cache.is_some() {
            return Err(Error::UnconsumedCache { layer: "Conv2d" });
        }

        let cols = im2col(x, self.kernel, self.stride, self.padding);
        let ckk = self.in_channels * self.kernel.0 * self.kernel.1;
        let w_row = self.w.reshaped(&[self.out_channels, ckk]);
        let mut out2 = cols.matmul(&w_row.transpose2()); // (N*oh*ow, out_c)
        if let Some(b) = &self.b {
            for row in out2.data.chunks_mut(self.out_channels) {
                for (v, &bias) in row.iter_mut().zip(b.data.iter()) {
                    *v += bias;
                }
            }
        }

        // (N*out_h*out_w, C_out) -> (N, C_out, out_h, out_w)
        let mut out = Tensor::zeros(&[n, self.out_channels, out_h, out_w]);
        for img in 0..n {
            for i in 0..out_h {
                for j in 0..out_w {
                    let row = ((img * out_h + i) * out_w + j) * self.out_channels;
                    for o in 0..self.out_channels {
                        let dst = ((img * self.out_channels + o) * out_h + i) * out_w + j;
                        out.data[dst] = out2.data[row + o];
                    }
                }
            }
        }

        if training {
            self.cache = Some(ConvCache {
                x_shape: [n, c, h, w],
                cols,
                out_hw: (out_h, out_w),
            });
        }
        Ok(out)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let cache = self
            .cache
            .take()
            .ok_or(Error::UninitializedCache { layer: "Conv2d" })?;
        let [n, _, _, _] = cache.x_shape;
        let (out_h, out_w) = cache.out_hw;
        let expected = [n, self.out_channels, out_h, out_w];
        if grad_out.shape() != expected {
            return Err(Error::ShapeMismatch {
                layer: "Conv2d",
                expected: format!("{expected:?}"),
                got: format!("{:?}", grad_out.shape()),
            });
        }

        // (N, C_out, oh, ow) -> (N*oh*ow, C_out)
        let mut grad2 = Tensor::zeros(&[n * out_h * out_w, self.out_channels]);
        for img in 0..n {
            for o in 0..self.out_channels {
                for i in 0..out_h {
                    for j in 0..out_w {
                        let src = ((img * self.out_channels + o) * out_h + i) * out_w + j;
                        let row = (img * out_h + i) * out_w + j;
                        grad2.data[row * self.out_channels + o] = grad_out.data[src];
                    }
                }
            }
        }

        let (kh, kw) = self.kernel;
        let ckk = self.in_channels * kh * kw;
        let dw_row = grad2.transpose2().matmul(&cache.cols); // (out_c, ckk)
        self.dw = dw_row.reshape(&[self.out_channels, self.in_channels, kh, kw]);

        if let Some(db) = self.db.as_mut() {
            db.fill(0.0);
            for row in grad2.data.chunks(self.out_channels) {
                for (acc, &g) in db.data.iter_mut().zip(row.iter()) {
                    *acc += g;
                }
            }
        }

        let w_row = self.w.reshaped(&[self.out_channels, ckk]);
        let dx_cols = grad2.matmul(&w_row); // (N*oh*ow, ckk)
        Ok(col2im(
            &dx_cols,
            cache.x_shape,
            self.kernel,
            self.stride,
            self.padding,
        ))
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
