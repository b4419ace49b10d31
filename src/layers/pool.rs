use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// Max pooling over `(N, C, H, W)` tensors.
///
/// Forward records the flat input index of each window's maximum (the argmax
/// mask); on ties the first maximum in row-major scan order wins, in both
/// directions. Backward scatter-adds each upstream element to its recorded
/// position, so overlapping windows accumulate at shared argmax positions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaxPool2d {
    kernel: (usize, usize),
    stride: usize,
    #[serde(skip)]
    cache: Option<PoolCache>,
}

#[derive(Debug, Clone)]
struct PoolCache {
    x_shape: [usize; 4],
    /// Flat index into the input per output element, in output order.
    argmax: Vec<usize>,
}

impl MaxPool2d {
    /// Stride defaults to the kernel size (non-overlapping windows).
    pub fn new(kernel_size: usize) -> MaxPool2d {
        MaxPool2d::with_stride(kernel_size, kernel_size)
    }

    pub fn with_stride(kernel_size: usize, stride: usize) -> MaxPool2d {
        assert!(kernel_size > 0, "kernel size must be positive");
        assert!(stride >= 1, "stride must be >= 1");
        MaxPool2d {
            kernel: (kernel_size, kernel_size),
            stride,
            cache: None,
        }
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        if x.ndim() != 4 {
            return Err(Error::ShapeMismatch {
                layer: "MaxPool2d",
                expected: "(N, C, H, W)".to_string(),
                got: format!("{:?}", x.shape()),
            });
        }
        let (n, c, h, w) = (x.dim(0), x.dim(1), x.dim(2), x.dim(3));
        let (kh, kw) = self.kernel;
        if h < kh || w < kw {
            return Err(Error::ShapeMismatch {
                layer: "MaxPool2d",
                expected: format!("spatial extent >= kernel {:?}", self.kernel),
                got: format!("({h}, {w})"),
            });
        }
        if training && self.cache.is_some() {
            return Err(Error::UnconsumedCache { layer: "MaxPool2d" });
        }

        let out_h = (h - kh) / self.stride + 1;
        let out_w = (w - kw) / self.stride + 1;
        let mut out = Tensor::zeros(&[n, c, out_h, out_w]);
        let mut argmax = Vec::with_capacity(out.numel());

        for img in 0..n {
            for ch in 0..c {
                let plane = (img * c + ch) * h * w;
                for i in 0..out_h {
                    for j in 0..out_w {
                        let h_start = i * self.stride;
                        let w_start = j * self.stride;
                        let mut best = f64::NEG_INFINITY;
                        let mut best_idx = plane + h_start * w + w_start;
                        for ki in 0..kh {
                            for kj in 0..kw {
                                let idx = plane + (h_start + ki) * w + (w_start + kj);
                                // Strict comparison keeps the first maximum.
                                if x.data[idx] > best {
                                    best = x.data[idx];
                                    best_idx = idx;
                                }
                            }
                        }
                        out.data[((img * c + ch) * out_h + i) * out_w + j] = best;
                        argmax.push(best_idx);
                    }
                }
            }
        }

        if training {
            self.cache = Some(PoolCache {
                x_shape: [n, c, h, w],
                argmax,
            });
        }
        Ok(out)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let cache = self
            .cache
            .take()
            .ok_or(Error::UninitializedCache { layer: "MaxPool2d" })?;
        if grad_out.numel() != cache.argmax.len() {
            return Err(Error::ShapeMismatch {
                layer: "MaxPool2d",
                expected: format!("{} output elements", cache.argmax.len()),
                got: format!("{}", grad_out.numel()),
            });
        }

        let [n, c, h, w] = cache.x_shape;
        let mut grad_x = Tensor::zeros(&[n, c, h, w]);
        for (&idx, &g) in cache.argmax.iter().zip(grad_out.data.iter()) {
            grad_x.data[idx] += g;
        }
        Ok(grad_x)
    }
}
