use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::{Error, Result};
use crate::layers::{Layer, ParamView};
use crate::math::tensor::Tensor;

/// An ordered composition of layers behind a single forward/backward/
/// parameter-iteration contract.
///
/// Forward threads the tensor through every layer in order with the
/// training/inference mode propagated uniformly; backward threads the loss
/// gradient through the layers in reverse, each consuming its own cache.
/// Layer compatibility is checked by the layers themselves at first forward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sequential {
    pub layers: Vec<Layer>,
}

impl Sequential {
    pub fn new(layers: Vec<Layer>) -> Result<Sequential> {
        if layers.is_empty() {
            return Err(Error::InvalidConfig(
                "Sequential requires at least one layer".to_string(),
            ));
        }
        Ok(Sequential { layers })
    }

    pub fn forward(&mut self, x: &Tensor, training: bool) -> Result<Tensor> {
        let mut out = x.clone();
        for layer in &mut self.layers {
            out = layer.forward(&out, training)?;
        }
        Ok(out)
    }

    pub fn backward(&mut self, grad_out: &Tensor) -> Result<Tensor> {
        let mut grad = grad_out.clone();
        for layer in self.layers.iter_mut().rev() {
            grad = layer.backward(&grad)?;
        }
        Ok(grad)
    }

    /// Mutable parameter/gradient views in stable layer order, named
    /// `"{index}.{Layer}.{param}"`. This order is the identity optimizer
    /// state is keyed by.
    pub fn param_views(&mut self) -> Vec<ParamView<'_>> {
        let mut out = Vec::new();
        for (i, layer) in self.layers.iter_mut().enumerate() {
            let layer_name = layer.name();
            for view in layer.param_views() {
                out.push(ParamView {
                    name: format!("{i}.{layer_name}.{}", view.name),
                    value: view.value,
                    grad: view.grad,
                });
            }
        }
        out
    }

    /// Read-only named parameters, same names and order as [`param_views`].
    ///
    /// [`param_views`]: Sequential::param_views
    pub fn named_params(&self) -> Vec<(String, &Tensor)> {
        let mut out = Vec::new();
        for (i, layer) in self.layers.iter().enumerate() {
            for (name, value) in layer.params() {
                out.push((format!("{i}.{}.{name}", layer.name()), value));
            }
        }
        out
    }

    pub fn zero_grads(&mut self) {
        for view in self.param_views() {
            view.grad.fill(0.0);
        }
    }

    /// Total learnable element count.
    pub fn num_params(&self) -> usize {
        self.named_params().iter().map(|(_, t)| t.numel()).sum()
    }

    /// Serializes the model (parameters and running statistics, not caches)
    /// to a pretty-printed JSON file.
    pub fn save_json<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    /// Deserializes a model from a JSON file previously written by
    /// [`save_json`](Sequential::save_json).
    pub fn load_json<P: AsRef<Path>>(path: P) -> Result<Sequential> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }
}
