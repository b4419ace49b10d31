use rand::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

fn entropy_rng() -> StdRng {
    StdRng::from_entropy()
}

/// Inverted dropout.
///
/// Training forward draws a per-element Bernoulli keep-mask (keep probability
/// `1 - p`), zeroes dropped elements and scales survivors by `1/(1 - p)` so
/// the expected activation magnitude is unchanged; inference forward is the
/// identity. Backward multiplies by the same cached scaled mask.
///
/// The mask RNG is owned by the layer and seeded explicitly; it is not part
/// of the serialized state, so a reloaded model draws fresh masks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dropout {
    p: f64,
    #[serde(skip, default = "entropy_rng")]
    rng: StdRng,
    #[serde(skip)]
    mask: Option<Tensor>,
}

impl Dropout {
    pub fn new(p: f64, rng: StdRng) -> Dropout {
        assert!((0.0..1.0).contains(&p), "drop probability must be in [0, 1)");
        Dropout { p, rng, mask: None }
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        if !training || self.p == 0.0 {
            return Ok(x.clone());
        }
        if self.mask.is_some() {
            return Err(Error::UnconsumedCache { layer: "Dropout" });
        }

        let scale = 1.0 / (1.0 - self.p);
        let mut mask = Tensor::zeros(x.shape());
        for m in mask.data.iter_mut() {
            if self.rng.gen::<f64>() >= self.p {
                *m = scale;
            }
        }
        let y = x.zip_map(&mask, |v, m| v * m);
        self.mask = Some(mask);
        Ok(y)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        if self.p == 0.0 {
            return Ok(grad_out.clone());
        }
        let mask = self
            .mask
            .take()
            .ok_or(Error::UninitializedCache { layer: "Dropout" })?;
        if grad_out.shape() != mask.shape() {
            return Err(Error::ShapeMismatch {
                layer: "Dropout",
                expected: format!("{:?}", mask.shape()),
                got: format!("{:?}", grad_out.shape()),
            });
        }
        Ok(grad_out.zip_map(&mask, |g, m| g * m))
    }
}
