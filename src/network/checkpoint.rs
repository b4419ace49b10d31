use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::error::Result;
use crate::math::tensor::Tensor;
use crate::network::sequential::Sequential;
use crate::optim::Optimizer;
use crate::train::state::TrainingState;

/// A saved training snapshot: the model (named parameters plus running
/// statistics), optionally the optimizer with its per-parameter state, and
/// the training counters.
///
/// Everything serializes through serde_json, which round-trips f64 exactly,
/// so a loaded checkpoint resumes training bit-for-bit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub network: Sequential,
    #[serde(default)]
    pub optimizer: Option<Optimizer>,
    #[serde(default)]
    pub state: Option<TrainingState>,
}

/// Borrowed mirror of [`Checkpoint`] so saving never clones tensors.
#[derive(Serialize)]
struct CheckpointRef<'a> {
    network: &'a Sequential,
    optimizer: Option<&'a Optimizer>,
    state: Option<&'a TrainingState>,
}

impl Checkpoint {
    pub fn save<P: AsRef<Path>>(
        path: P,
        network: &Sequential,
        optimizer: Option<&Optimizer>,
        state: Option<&TrainingState>,
    ) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(
            writer,
            &CheckpointRef {
                network,
                optimizer,
                state,
            },
        )?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Checkpoint> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        Ok(serde_json::from_reader(reader)?)
    }

    /// The named parameter-name-to-tensor mapping of the stored model.
    pub fn param_map(&self) -> Vec<(String, &Tensor)> {
        self.network.named_params()
    }
}
