use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// Rectified linear unit. Caches the strict-positive mask; the gradient at
/// exactly zero is zero.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReLU {
    #[serde(skip)]
    mask: Option<Tensor>,
}

impl ReLU {
    pub fn new() -> ReLU {
        ReLU { mask: None }
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        if training && self.mask.is_some() {
            return Err(Error::UnconsumedCache { layer: "ReLU" });
        }
        let mask = x.map(|v| if v > 0.0 { 1.0 } else { 0.0 });
        let y = x.zip_map(&mask, |v, m| v * m);
        if training {
            self.mask = Some(mask);
        }
        Ok(y)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let mask = self
            .mask
            .take()
            .ok_or(Error::UninitializedCache { layer: "ReLU" })?;
        if grad_out.shape() != mask.shape() {
            return Err(Error::ShapeMismatch {
                layer: "ReLU",
                expected: format!("{:?}", mask.shape()),
                got: format!("{:?}", grad_out.shape()),
            });
        }
        Ok(grad_out.zip_map(&mask, |g, m| g * m))
    }
}

/// Logistic sigmoid. Caches its output; backward is `dy * y * (1 - y)`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Sigmoid {
    #[serde(skip)]
    y: Option<Tensor>,
}

impl Sigmoid {
    pub fn new() -> Sigmoid {
        Sigmoid { y: None }
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        if training && self.y.is_some() {
            return Err(Error::UnconsumedCache { layer: "Sigmoid" });
        }
        let y = x.map(|v| 1.0 / (1.0 + (-v).exp()));
        if training {
            self.y = Some(y.clone());
        }
        Ok(y)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let y = self
            .y
            .take()
            .ok_or(Error::UninitializedCache { layer: "Sigmoid" })?;
        if grad_out.shape() != y.shape() {
            return Err(Error::ShapeMismatch {
                layer: "Sigmoid",
                expected: format!("{:?}", y.shape()),
                got: format!("{:?}", grad_out.shape()),
            });
        }
        Ok(grad_out.zip_map(&y, |g, yv| g * yv * (1.0 - yv)))
    }
}
