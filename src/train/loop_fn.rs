use std::sync::atomic::Ordering;
use std::time::Instant;

use crate::data::{DataSource, Targets};
use crate::error::{Error, Result};
use crate::loss::cross_entropy::SoftmaxCrossEntropy;
use crate::loss::loss_type::LossType;
use crate::loss::mse::MseLoss;
use crate::math::tensor::Tensor;
use crate::network::sequential::Sequential;
use crate::optim::{LrScheduler, Optimizer};
use crate::train::callbacks::{EarlyStopping, ModelCheckpoint};
use crate::train::config::TrainConfig;
use crate::train::epoch_stats::EpochStats;
use crate::train::metrics::argmax;
use crate::train::state::TrainingState;

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Why the training loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The configured epoch budget ran out.
    Completed,
    /// Early stopping exhausted its patience on the monitored metric.
    EarlyStopped,
    /// The stop flag was set or the progress receiver went away.
    Canceled,
}

/// Result of a `train_loop` run: one `EpochStats` per completed epoch, why
/// the loop stopped, and the final training counters.
#[derive(Debug)]
pub struct TrainReport {
    pub history: Vec<EpochStats>,
    pub stop_reason: StopReason,
    pub state: TrainingState,
}

impl TrainReport {
    /// Mean training loss of the last completed epoch.
    pub fn final_train_loss(&self) -> Option<f64> {
        self.history.last().map(|s| s.train_loss)
    }
}

/// Trains `network` for up to `config.epochs` epochs.
///
/// Per batch: forward in training mode, loss and its gradient, backward,
/// optimizer step, zero gradients. Per epoch: validation pass in inference
/// mode (if a source is given), checkpoint and early-stopping callbacks,
/// progress emission, then the scheduler.
///
/// # Early termination
/// The loop returns before the epoch budget is exhausted when:
/// - early stopping signals on its monitored metric (`StopReason::EarlyStopped`),
/// - the `progress_tx` receiver has been dropped, **or**
/// - `config.stop_flag` is set (both `StopReason::Canceled`).
///
/// # Errors
/// Shape and cache-contract violations from the layers propagate unchanged;
/// a NaN or Inf loss fails with [`Error::NumericalInstability`]. Nothing is
/// recovered internally.
pub fn train_loop(
    network: &mut Sequential,
    train_data: &mut dyn DataSource,
    mut val_data: Option<&mut dyn DataSource>,
    optimizer: &mut Optimizer,
    config: &TrainConfig,
) -> Result<TrainReport> {
    if config.epochs == 0 {
        return Err(Error::InvalidConfig("epochs must be at least 1".to_string()));
    }
    if val_data.is_none() {
        for monitor in [
            config.early_stopping.as_ref().map(|c| c.monitor.as_str()),
            config.checkpoint.as_ref().map(|c| c.monitor.as_str()),
        ]
        .into_iter()
        .flatten()
        {
            if monitor.starts_with("val_") {
                return Err(Error::InvalidConfig(format!(
                    "monitor '{monitor}' requires a validation data source"
                )));
            }
        }
    }

    let scheduler = config
        .scheduler
        .as_ref()
        .map(|c| LrScheduler::from_config(c, optimizer));
    let mut early_stopping = config.early_stopping.as_ref().map(EarlyStopping::new);
    let mut checkpoint_cb = config.checkpoint.as_ref().map(ModelCheckpoint::new);

    let mut state = TrainingState::new(config.seed, optimizer.lr());
    let mut history: Vec<EpochStats> = Vec::with_capacity(config.epochs);

    for epoch in 1..=config.epochs {
        // Check the stop flag at the top of each epoch.
        if let Some(flag) = &config.stop_flag {
            if flag.load(Ordering::Relaxed) {
                return Ok(finish(history, StopReason::Canceled, state));
            }
        }

        let t_start = Instant::now();

        // ── One full pass over the training data ───────────────────────────
        let (train_loss, train_accuracy) =
            run_train_epoch(network, train_data, optimizer, config, epoch, &mut state)?;
        let lr_used = optimizer.lr();

        // ── Validation ─────────────────────────────────────────────────────
        let (val_loss, val_accuracy) = match val_data.as_deref_mut() {
            Some(source) => {
                let (loss, acc) = run_eval_epoch(network, source, config.loss)?;
                if !loss.is_finite() {
                    return Err(Error::NumericalInstability {
                        context: "validation loss".to_string(),
                        epoch,
                        step: state.global_step,
                    });
                }
                (Some(loss), acc)
            }
            None => (None, None),
        };

        state.epoch = epoch;

        let stats = EpochStats {
            epoch,
            total_epochs: config.epochs,
            train_loss,
            train_accuracy,
            val_loss,
            val_accuracy,
            lr: lr_used,
            elapsed_ms: t_start.elapsed().as_millis() as u64,
        };

        // ── Callbacks ──────────────────────────────────────────────────────
        if let Some(cb) = checkpoint_cb.as_mut() {
            if cb.observe(&stats, network, optimizer, &state)? {
                state.best_metric = Some(cb.best());
            }
        }
        let stop_early = early_stopping
            .as_mut()
            .map(|cb| {
                let stop = cb.observe(&stats);
                if checkpoint_cb.is_none() && cb.best().is_finite() {
                    state.best_metric = Some(cb.best());
                }
                stop
            })
            .unwrap_or(false);

        // ── Emit progress ──────────────────────────────────────────────────
        let receiver_gone = match &config.progress_tx {
            Some(tx) => tx.send(stats.clone()).is_err(),
            None => false,
        };
        history.push(stats);

        if stop_early {
            return Ok(finish(history, StopReason::EarlyStopped, state));
        }
        if receiver_gone {
            return Ok(finish(history, StopReason::Canceled, state));
        }

        // ── Scheduler at end of epoch ──────────────────────────────────────
        if let Some(sched) = &scheduler {
            sched.step(epoch, optimizer);
        }
        state.lr = optimizer.lr();

        // Check the stop flag again after potentially expensive eval.
        if let Some(flag) = &config.stop_flag {
            if flag.load(Ordering::Relaxed) {
                return Ok(finish(history, StopReason::Canceled, state));
            }
        }
    }

    Ok(finish(history, StopReason::Completed, state))
}

fn finish(history: Vec<EpochStats>, stop_reason: StopReason, state: TrainingState) -> TrainReport {
    TrainReport {
        history,
        stop_reason,
        state,
    }
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

/// One full pass of mini-batch training. Returns the mean sample loss and,
/// for classification runs, the training accuracy.
fn run_train_epoch(
    network: &mut Sequential,
    data: &mut dyn DataSource,
    optimizer: &mut Optimizer,
    config: &TrainConfig,
    epoch: usize,
    state: &mut TrainingState,
) -> Result<(f64, Option<f64>)> {
    data.reset();

    let mut total_loss = 0.0;
    let mut seen = 0usize;
    let mut correct = 0usize;
    let mut counts_accuracy = false;

    while let Some(batch) = data.next_batch() {
        let batch_len = batch.targets.len();
        let output = network.forward(&batch.inputs, true)?;

        let (loss, batch_correct) = loss_value(config.loss, &output, &batch.targets)?;
        if !loss.is_finite() {
            return Err(Error::NumericalInstability {
                context: "training loss".to_string(),
                epoch,
                step: state.global_step,
            });
        }
        let grad = loss_grad(config.loss, &output, &batch.targets)?;

        network.backward(&grad)?;
        {
            let mut views = network.param_views();
            optimizer.step(&mut views);
        }
        network.zero_grads();
        state.global_step += 1;

        total_loss += loss * batch_len as f64;
        seen += batch_len;
        if let Some(c) = batch_correct {
            correct += c;
            counts_accuracy = true;
        }
    }

    if seen == 0 {
        return Err(Error::InvalidConfig(
            "training data source produced no batches".to_string(),
        ));
    }

    let accuracy = counts_accuracy.then(|| correct as f64 / seen as f64);
    Ok((total_loss / seen as f64, accuracy))
}

/// Full pass in inference mode, loss only.
fn run_eval_epoch(
    network: &mut Sequential,
    data: &mut dyn DataSource,
    loss_type: LossType,
) -> Result<(f64, Option<f64>)> {
    data.reset();

    let mut total_loss = 0.0;
    let mut seen = 0usize;
    let mut correct = 0usize;
    let mut counts_accuracy = false;

    while let Some(batch) = data.next_batch() {
        let batch_len = batch.targets.len();
        let output = network.forward(&batch.inputs, false)?;
        let (loss, batch_correct) = loss_value(loss_type, &output, &batch.targets)?;
        total_loss += loss * batch_len as f64;
        seen += batch_len;
        if let Some(c) = batch_correct {
            correct += c;
            counts_accuracy = true;
        }
    }

    if seen == 0 {
        return Err(Error::InvalidConfig(
            "validation data source produced no batches".to_string(),
        ));
    }

    let accuracy = counts_accuracy.then(|| correct as f64 / seen as f64);
    Ok((total_loss / seen as f64, accuracy))
}

/// Scalar loss for one batch plus, for class-index targets, the number of
/// correct top-1 predictions.
fn loss_value(
    loss_type: LossType,
    output: &Tensor,
    targets: &Targets,
) -> Result<(f64, Option<usize>)> {
    match (loss_type, targets) {
        (LossType::Mse, Targets::Values(expected)) => {
            check_same_shape("MseLoss", output, expected)?;
            Ok((MseLoss::loss(output, expected), None))
        }
        (LossType::CrossEntropy, Targets::Classes(labels)) => {
            let one_hot = class_targets("SoftmaxCrossEntropy", output, labels)?;
            let loss = SoftmaxCrossEntropy::loss(output, &one_hot);
            let classes = output.dim(1);
            let correct = output
                .data
                .chunks(classes)
                .zip(labels.iter())
                .filter(|(row, label)| argmax(row) == **label)
                .count();
            Ok((loss, Some(correct)))
        }
        (LossType::CrossEntropy, Targets::Values(expected)) => {
            check_same_shape("SoftmaxCrossEntropy", output, expected)?;
            Ok((SoftmaxCrossEntropy::loss(output, expected), None))
        }
        (LossType::Mse, Targets::Classes(_)) => Err(Error::InvalidConfig(
            "MSE loss requires dense tensor targets, got class indices".to_string(),
        )),
    }
}

/// Gradient of the batch loss with respect to the network output.
fn loss_grad(loss_type: LossType, output: &Tensor, targets: &Targets) -> Result<Tensor> {
    match (loss_type, targets) {
        (LossType::Mse, Targets::Values(expected)) => Ok(MseLoss::derivative(output, expected)),
        (LossType::CrossEntropy, Targets::Classes(labels)) => {
            let one_hot = class_targets("SoftmaxCrossEntropy", output, labels)?;
            Ok(SoftmaxCrossEntropy::derivative(output, &one_hot))
        }
        (LossType::CrossEntropy, Targets::Values(expected)) => {
            Ok(SoftmaxCrossEntropy::derivative(output, expected))
        }
        (LossType::Mse, Targets::Classes(_)) => Err(Error::InvalidConfig(
            "MSE loss requires dense tensor targets, got class indices".to_string(),
        )),
    }
}

fn check_same_shape(layer: &'static str, output: &Tensor, expected: &Tensor) -> Result<()> {
    if output.shape() != expected.shape() {
        return Err(Error::ShapeMismatch {
            layer,
            expected: format!("{:?}", expected.shape()),
            got: format!("{:?}", output.shape()),
        });
    }
    Ok(())
}

fn class_targets(layer: &'static str, output: &Tensor, labels: &[usize]) -> Result<Tensor> {
    if output.ndim() != 2 || output.dim(0) != labels.len() {
        return Err(Error::ShapeMismatch {
            layer,
            expected: format!("({}, num_classes) logits", labels.len()),
            got: format!("{:?}", output.shape()),
        });
    }
    let classes = output.dim(1);
    if let Some(&bad) = labels.iter().find(|&&l| l >= classes) {
        return Err(Error::InvalidConfig(format!(
            "class label {bad} out of range for {classes} classes"
        )));
    }
    Ok(Tensor::one_hot(labels, classes))
}
