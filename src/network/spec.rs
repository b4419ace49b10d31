use rand::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;
use crate::layers::{BatchNorm2d, Conv2d, Dense, Dropout, MaxPool2d, ReLU, Sigmoid, WeightInit};
use crate::loss::loss_type::LossType;
use crate::network::sequential::Sequential;

fn default_stride() -> usize {
    1
}

fn default_eps() -> f64 {
    1e-5
}

fn default_bn_momentum() -> f64 {
    0.9
}

/// Describes one layer in a network specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "layer")]
pub enum LayerSpec {
    Conv2d {
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        #[serde(default = "default_stride")]
        stride: usize,
        #[serde(default)]
        padding: usize,
    },
    MaxPool2d {
        kernel_size: usize,
        /// Defaults to the kernel size (non-overlapping windows).
        #[serde(default)]
        stride: Option<usize>,
    },
    Dense {
        in_features: usize,
        out_features: usize,
        #[serde(default)]
        init: Option<WeightInit>,
    },
    BatchNorm2d {
        num_features: usize,
        #[serde(default = "default_eps")]
        eps: f64,
        #[serde(default = "default_bn_momentum")]
        momentum: f64,
    },
    Dropout {
        p: f64,
    },
    ReLU,
    Sigmoid,
}

/// A fully serializable description of a network architecture plus the loss
/// it trains with.
///
/// A `NetworkSpec` can be saved to / loaded from JSON independently of any
/// trained weights; [`build`](NetworkSpec::build) materializes it into a
/// fresh [`Sequential`] using the supplied RNG for weight initialization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkSpec {
    /// Human-readable name used as the model file stem.
    pub name: String,
    /// Ordered list of layer descriptions (input to output).
    pub layers: Vec<LayerSpec>,
    /// Loss function to pair with this network during training.
    pub loss: LossType,
}

impl NetworkSpec {
    /// Instantiates the architecture with freshly initialized weights.
    pub fn build(&self, rng: &mut StdRng) -> Result<Sequential> {
        let mut layers = Vec::with_capacity(self.layers.len());
        for spec in &self.layers {
            layers.push(match *spec {
                LayerSpec::Conv2d {
                    in_channels,
                    out_channels,
                    kernel_size,
                    stride,
                    padding,
                } => Conv2d::new(in_channels, out_channels, kernel_size, stride, padding, rng)
                    .into(),
                LayerSpec::MaxPool2d {
                    kernel_size,
                    stride,
                } => match stride {
                    Some(s) => MaxPool2d::with_stride(kernel_size, s),
                    None => MaxPool2d::new(kernel_size),
                }
                .into(),
                LayerSpec::Dense {
                    in_features,
                    out_features,
                    init,
                } => Dense::with_init(
                    in_features,
                    out_features,
                    true,
                    init.unwrap_or(WeightInit::XavierUniform),
                    rng,
                )
                .into(),
                LayerSpec::BatchNorm2d {
                    num_features,
                    eps,
                    momentum,
                } => BatchNorm2d::with_params(num_features, eps, momentum).into(),
                LayerSpec::Dropout { p } => {
                    Dropout::new(p, StdRng::seed_from_u64(rng.gen())).into()
                }
                LayerSpec::ReLU => ReLU::new().into(),
                LayerSpec::Sigmoid => Sigmoid::new().into(),
            });
        }
        Sequential::new(layers)
    }

    /// LeNet-style preset for `(N, 1, 28, 28)` inputs.
    pub fn lenet(num_classes: usize) -> NetworkSpec {
        NetworkSpec {
            name: "lenet".to_string(),
            loss: LossType::CrossEntropy,
            layers: vec![
                LayerSpec::Conv2d {
                    in_channels: 1,
                    out_channels: 6,
                    kernel_size: 5,
                    stride: 1,
                    padding: 2,
                },
                LayerSpec::ReLU,
                LayerSpec::MaxPool2d {
                    kernel_size: 2,
                    stride: None,
                },
                LayerSpec::Conv2d {
                    in_channels: 6,
                    out_channels: 16,
                    kernel_size: 5,
                    stride: 1,
                    padding: 0,
                },
                LayerSpec::ReLU,
                LayerSpec::MaxPool2d {
                    kernel_size: 2,
                    stride: None,
                },
                // Flatten happens inside Dense.
                LayerSpec::Dense {
                    in_features: 16 * 5 * 5,
                    out_features: 120,
                    init: Some(WeightInit::HeNormal),
                },
                LayerSpec::ReLU,
                LayerSpec::Dense {
                    in_features: 120,
                    out_features: 84,
                    init: Some(WeightInit::HeNormal),
                },
                LayerSpec::ReLU,
                LayerSpec::Dropout { p: 0.3 },
                LayerSpec::Dense {
                    in_features: 84,
                    out_features: num_classes,
                    init: Some(WeightInit::XavierUniform),
                },
            ],
        }
    }

    /// Serializes the spec to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a `NetworkSpec` from a JSON file.
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<NetworkSpec> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
