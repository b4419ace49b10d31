use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Sub};

/// An n-dimensional array of `f64` values in row-major layout.
///
/// Image batches use the shape convention `(N, C, H, W)`; flattened batches
/// use `(N, features)`. The shape is kept private so `shape.len() product ==
/// data.len()` always holds; the raw buffer is public because layer kernels
/// index it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor {
    shape: Vec<usize>,
    pub data: Vec<f64>,
}

impl Tensor {
    pub fn zeros(shape: &[usize]) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![0.0; shape.iter().product()],
        }
    }

    pub fn ones(shape: &[usize]) -> Tensor {
        Tensor::filled(shape, 1.0)
    }

    pub fn filled(shape: &[usize], value: f64) -> Tensor {
        Tensor {
            shape: shape.to_vec(),
            data: vec![value; shape.iter().product()],
        }
    }

    /// Wraps an existing buffer. The buffer length must match the shape.
    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Tensor {
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "buffer length does not match shape {shape:?}"
        );
        Tensor {
            shape: shape.to_vec(),
            data,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn dim(&self, axis: usize) -> usize {
        self.shape[axis]
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    /// Reinterprets the buffer under a new shape with the same element count.
    pub fn reshape(mut self, shape: &[usize]) -> Tensor {
        assert_eq!(
            shape.iter().product::<usize>(),
            self.data.len(),
            "cannot reshape {:?} to {shape:?}",
            self.shape
        );
        self.shape = shape.to_vec();
        self
    }

    /// Like [`Tensor::reshape`] but leaves the source tensor untouched.
    pub fn reshaped(&self, shape: &[usize]) -> Tensor {
        self.clone().reshape(shape)
    }

    pub fn fill(&mut self, value: f64) {
        self.data.iter_mut().for_each(|x| *x = value);
    }

    /// Samples a single value from N(0, 1) using the Box-Muller transform.
    /// Both u1 and u2 must be uniform on (0, 1].
    fn sample_standard_normal(rng: &mut StdRng) -> f64 {
        // Draw two independent uniform samples in (0, 1] to avoid log(0).
        let u1: f64 = 1.0 - rng.gen::<f64>();
        let u2: f64 = 1.0 - rng.gen::<f64>();
        (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
    }

    /// (fan_in, fan_out) for a weight shape.
    ///
    /// Dense weights are `(out_features, in_features)`; Conv2d weights are
    /// `(C_out, C_in, KH, KW)` where the receptive field multiplies into both
    /// fans.
    fn fan_in_out(shape: &[usize]) -> (usize, usize) {
        match shape {
            &[out_f, in_f] => (in_f, out_f),
            &[c_out, c_in, kh, kw] => (c_in * kh * kw, c_out * kh * kw),
            _ => {
                let n = shape.iter().product::<usize>();
                let f = (n as f64).sqrt() as usize;
                (f.max(1), f.max(1))
            }
        }
    }

    /// He initialization: samples from N(0, sqrt(2 / fan_in)).
    ///
    /// Recommended before ReLU layers. The variance 2/fan_in accounts for
    /// the fact that ReLU zeroes half of its inputs on average.
    pub fn he_normal(shape: &[usize], rng: &mut StdRng) -> Tensor {
        let (fan_in, _) = Tensor::fan_in_out(shape);
        let std_dev = (2.0 / fan_in as f64).sqrt();
        let mut res = Tensor::zeros(shape);
        for x in res.data.iter_mut() {
            *x = Tensor::sample_standard_normal(rng) * std_dev;
        }
        res
    }

    /// Xavier (Glorot) uniform initialization: U(-a, a) with
    /// a = sqrt(6 / (fan_in + fan_out)).
    ///
    /// Recommended before Sigmoid/Identity layers. Keeps the variance of
    /// activations and gradients roughly equal across layers.
    pub fn xavier_uniform(shape: &[usize], rng: &mut StdRng) -> Tensor {
        let (fan_in, fan_out) = Tensor::fan_in_out(shape);
        let a = (6.0 / (fan_in + fan_out) as f64).sqrt();
        let mut res = Tensor::zeros(shape);
        for x in res.data.iter_mut() {
            *x = rng.gen_range(-a..a);
        }
        res
    }

    /// 2-D matrix product.
    pub fn matmul(&self, rhs: &Tensor) -> Tensor {
        assert_eq!(self.ndim(), 2, "matmul expects 2-D tensors");
        assert_eq!(rhs.ndim(), 2, "matmul expects 2-D tensors");
        let (m, k) = (self.shape[0], self.shape[1]);
        let (k2, n) = (rhs.shape[0], rhs.shape[1]);
        assert_eq!(k, k2, "matmul inner dimensions differ: {k} vs {k2}");

        let mut res = Tensor::zeros(&[m, n]);
        // i-k-j order keeps the inner loop sequential over both operands.
        for i in 0..m {
            for p in 0..k {
                let a = self.data[i * k + p];
                if a == 0.0 {
                    continue;
                }
                let row = &rhs.data[p * n..(p + 1) * n];
                let out = &mut res.data[i * n..(i + 1) * n];
                for (o, &b) in out.iter_mut().zip(row.iter()) {
                    *o += a * b;
                }
            }
        }
        res
    }

    /// 2-D transpose.
    pub fn transpose2(&self) -> Tensor {
        assert_eq!(self.ndim(), 2, "transpose2 expects a 2-D tensor");
        let (m, n) = (self.shape[0], self.shape[1]);
        let mut res = Tensor::zeros(&[n, m]);
        for i in 0..m {
            for j in 0..n {
                res.data[j * m + i] = self.data[i * n + j];
            }
        }
        res
    }

    pub fn map<F>(&self, functor: F) -> Tensor
    where
        F: Fn(f64) -> f64,
    {
        Tensor {
            shape: self.shape.clone(),
            data: self.data.iter().map(|&x| functor(x)).collect(),
        }
    }

    /// Element-wise combination of two same-shape tensors.
    pub fn zip_map<F>(&self, rhs: &Tensor, functor: F) -> Tensor
    where
        F: Fn(f64, f64) -> f64,
    {
        assert_eq!(self.shape, rhs.shape, "zip_map shapes differ");
        Tensor {
            shape: self.shape.clone(),
            data: self
                .data
                .iter()
                .zip(rhs.data.iter())
                .map(|(&a, &b)| functor(a, b))
                .collect(),
        }
    }

    /// Gathers rows along the leading axis, preserving the remaining dims.
    /// Used to assemble shuffled mini-batches.
    pub fn gather_rows(&self, indices: &[usize]) -> Tensor {
        assert!(!self.shape.is_empty(), "gather_rows needs a leading axis");
        let rows = self.shape[0];
        let span = self.numel() / rows.max(1);
        let mut out_shape = self.shape.clone();
        out_shape[0] = indices.len();
        let mut data = Vec::with_capacity(indices.len() * span);
        for &i in indices {
            assert!(i < rows, "row index {i} out of bounds for {rows} rows");
            data.extend_from_slice(&self.data[i * span..(i + 1) * span]);
        }
        Tensor {
            shape: out_shape,
            data,
        }
    }

    /// One-hot encodes integer class labels into an `(N, num_classes)` tensor.
    pub fn one_hot(labels: &[usize], num_classes: usize) -> Tensor {
        let mut res = Tensor::zeros(&[labels.len(), num_classes]);
        for (row, &class) in labels.iter().enumerate() {
            assert!(class < num_classes, "label {class} >= {num_classes} classes");
            res.data[row * num_classes + class] = 1.0;
        }
        res
    }
}

impl Add for &Tensor {
    type Output = Tensor;

    fn add(self, rhs: Self) -> Tensor {
        self.zip_map(rhs, |a, b| a + b)
    }
}

impl Sub for &Tensor {
    type Output = Tensor;

    fn sub(self, rhs: Self) -> Tensor {
        self.zip_map(rhs, |a, b| a - b)
    }
}
