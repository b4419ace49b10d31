pub mod activation;
pub mod batchnorm;
pub mod conv;
pub mod dense;
pub mod dropout;
pub mod pool;

pub use activation::{ReLU, Sigmoid};
pub use batchnorm::BatchNorm2d;
pub use conv::Conv2d;
pub use dense::Dense;
pub use dropout::Dropout;
pub use pool::MaxPool2d;

use crate::error::Result;
use crate::math::tensor::Tensor;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

/// Weight initialization scheme for parameterized layers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightInit {
    /// N(0, sqrt(2/fan_in)); pair with ReLU.
    HeNormal,
    /// U(-a, a), a = sqrt(6/(fan_in+fan_out)); pair with Sigmoid/linear.
    XavierUniform,
}

impl WeightInit {
    pub fn sample(self, shape: &[usize], rng: &mut StdRng) -> Tensor {
        match self {
            WeightInit::HeNormal => Tensor::he_normal(shape, rng),
            WeightInit::XavierUniform => Tensor::xavier_uniform(shape, rng),
        }
    }
}

/// Mutable view of one named parameter paired with its gradient buffer.
///
/// Optimizers iterate these in the model's stable layer order; the position
/// in that order is the identity their per-parameter state is keyed by.
pub struct ParamView<'a> {
    pub name: String,
    pub value: &'a mut Tensor,
    pub grad: &'a mut Tensor,
}

/// The closed set of layer kinds.
///
/// Each variant implements the same capability set: `forward(x, training)`,
/// `backward(dy)` consuming the forward cache, and parameter iteration.
/// Serialization covers parameters and running statistics; caches are
/// transient and skipped.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Layer {
    Conv2d(Conv2d),
    MaxPool2d(MaxPool2d),
    Dense(Dense),
    BatchNorm2d(BatchNorm2d),
    Dropout(Dropout),
    ReLU(ReLU),
    Sigmoid(Sigmoid),
}

impl Layer {
    pub fn name(&self) -> &'static str {
        match self {
            Layer::Conv2d(_) => "Conv2d",
            Layer::MaxPool2d(_) => "MaxPool2d",
            Layer::Dense(_) => "Dense",
            Layer::BatchNorm2d(_) => "BatchNorm2d",
            Layer::Dropout(_) => "Dropout",
            Layer::ReLU(_) => "ReLU",
            Layer::Sigmoid(_) => "Sigmoid",
        }
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => l.forward(x, training),
            Layer::MaxPool2d(l) => l.forward(x, training),
            Layer::Dense(l) => l.forward(x, training),
            Layer::BatchNorm2d(l) => l.forward(x, training),
            Layer::Dropout(l) => l.forward(x, training),
            Layer::ReLU(l) => l.forward(x, training),
            Layer::Sigmoid(l) => l.forward(x, training),
        }
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        match self {
            Layer::Conv2d(l) => l.backward(grad_out),
            Layer::MaxPool2d(l) => l.backward(grad_out),
            Layer::Dense(l) => l.backward(grad_out),
            Layer::BatchNorm2d(l) => l.backward(grad_out),
            Layer::Dropout(l) => l.backward(grad_out),
            Layer::ReLU(l) => l.backward(grad_out),
            Layer::Sigmoid(l) => l.backward(grad_out),
        }
    }

    pub fn param_views(&mut self) -> Vec<ParamView<'_>> {
        match self {
            Layer::Conv2d(l) => l.param_views(),
            Layer::Dense(l) => l.param_views(),
            Layer::BatchNorm2d(l) => l.param_views(),
            _ => Vec::new(),
        }
    }

    pub fn params(&self) -> Vec<(&'static str, &Tensor)> {
        match self {
            Layer::Conv2d(l) => l.params(),
            Layer::Dense(l) => l.params(),
            Layer::BatchNorm2d(l) => l.params(),
            _ => Vec::new(),
        }
    }
}

impl From<Conv2d> for Layer {
    fn from(l: Conv2d) -> Layer {
        Layer::Conv2d(l)
    }
}

impl From<MaxPool2d> for Layer {
    fn from(l: MaxPool2d) -> Layer {
        Layer::MaxPool2d(l)
    }
}

impl From<Dense> for Layer {
    fn from(l: Dense) -> Layer {
        Layer::Dense(l)
    }
}

impl From<BatchNorm2d> for Layer {
    fn from(l: BatchNorm2d) -> Layer {
        Layer::BatchNorm2d(l)
    }
}

impl From<Dropout> for Layer {
    fn from(l: Dropout) -> Layer {
        Layer::Dropout(l)
    }
}

impl From<ReLU> for Layer {
    fn from(l: ReLU) -> Layer {
        Layer::ReLU(l)
    }
}

impl From<Sigmoid> for Layer {
    fn from(l: Sigmoid) -> Layer {
        Layer::Sigmoid(l)
    }
}
