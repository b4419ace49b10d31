// End-to-end training: loss convergence on a tiny synthetic problem, the
// training loop's termination modes, and checkpoint-based resume.

use rand::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use magnetite::train::{
    CheckpointConfig, EarlyStopping, EarlyStoppingConfig, Mode, OptimizerKind,
};
use magnetite::{
    train_loop, Adam, Checkpoint, Dense, EpochStats, Error, InMemoryDataset, LossType, Optimizer,
    ReLU, Sequential, Sgd, SoftmaxCrossEntropy, StopReason, Targets, Tensor, TrainConfig,
};

fn two_layer_net(seed: u64) -> Sequential {
    let mut rng = StdRng::seed_from_u64(seed);
    Sequential::new(vec![
        Dense::new(4, 3, &mut rng).into(),
        ReLU::new().into(),
        Dense::new(3, 2, &mut rng).into(),
    ])
    .unwrap()
}

/// Four linearly separable samples; classes are sign flips of each other so
/// every hidden unit stays reachable from at least half the inputs.
fn four_samples() -> (Tensor, Vec<usize>) {
    let inputs = Tensor::from_vec(
        &[4, 4],
        vec![
            1.0, 0.5, -0.5, -1.0, //
            -1.0, -0.5, 0.5, 1.0, //
            0.9, 1.1, -1.0, -0.4, //
            -0.9, -1.1, 1.0, 0.4,
        ],
    );
    (inputs, vec![0, 1, 0, 1])
}

#[test]
fn sgd_drives_the_two_layer_network_below_threshold() {
    let mut net = two_layer_net(42);
    let (inputs, labels) = four_samples();
    let targets = Tensor::one_hot(&labels, 2);
    let mut optimizer: Optimizer = Sgd::new(0.5).into();

    let mut loss = f64::INFINITY;
    for _ in 0..500 {
        let logits = net.forward(&inputs, true).unwrap();
        loss = SoftmaxCrossEntropy::loss(&logits, &targets);
        let grad = SoftmaxCrossEntropy::derivative(&logits, &targets);
        net.backward(&grad).unwrap();
        let mut views = net.param_views();
        optimizer.step(&mut views);
        drop(views);
        net.zero_grads();
        if loss < 0.04 {
            break;
        }
    }
    assert!(loss < 0.05, "training loss stuck at {loss}");
}

#[test]
fn train_loop_completes_and_reports_progress() {
    let mut net = two_layer_net(7);
    let (inputs, labels) = four_samples();

    let mut config = TrainConfig::new(20, 4, 0.3, OptimizerKind::Momentum, LossType::CrossEntropy);
    config.scheduler = Some(magnetite::optim::SchedulerConfig::Step {
        step_size: 10,
        gamma: 0.5,
    });
    let mut optimizer = config.build_optimizer();

    let mut train_set =
        InMemoryDataset::new(inputs.clone(), Targets::Classes(labels.clone()), 4).unwrap();
    let mut val_set = InMemoryDataset::new(inputs, Targets::Classes(labels), 4).unwrap();

    let report = train_loop(
        &mut net,
        &mut train_set,
        Some(&mut val_set),
        &mut optimizer,
        &config,
    )
    .unwrap();

    assert_eq!(report.stop_reason, StopReason::Completed);
    assert_eq!(report.history.len(), 20);
    assert_eq!(report.state.epoch, 20);
    assert_eq!(report.state.global_step, 20);

    let first = &report.history[0];
    let last = &report.history[19];
    assert!(last.train_loss < first.train_loss);
    assert!(last.val_loss.is_some());
    assert!(last.train_accuracy.is_some());

    // Step decay fires at the end of epoch 10.
    assert!((report.history[9].lr - 0.3).abs() < 1e-12);
    assert!((report.history[10].lr - 0.15).abs() < 1e-12);
}

#[test]
fn early_stopping_counts_patience_on_the_monitored_metric() {
    let config = EarlyStoppingConfig {
        monitor: "val_loss".to_string(),
        patience: 2,
        mode: Mode::Min,
    };
    let mut cb = EarlyStopping::new(&config);
    let stats = |epoch: usize, val_loss: f64| EpochStats {
        epoch,
        total_epochs: 10,
        train_loss: 1.0,
        train_accuracy: None,
        val_loss: Some(val_loss),
        val_accuracy: None,
        lr: 0.1,
        elapsed_ms: 0,
    };

    assert!(!cb.observe(&stats(1, 1.0)));
    assert!(!cb.observe(&stats(2, 0.9)));
    assert!(!cb.observe(&stats(3, 0.95)));
    assert!(cb.observe(&stats(4, 0.96)));
    assert!((cb.best() - 0.9).abs() < 1e-12);
}

#[test]
fn train_loop_reports_an_early_stop() {
    let mut net = two_layer_net(8);
    let (inputs, labels) = four_samples();

    let mut config = TrainConfig::new(30, 4, 0.3, OptimizerKind::Sgd, LossType::CrossEntropy);
    // train_loss under mode=max: the first epoch sets the best and later
    // (smaller) losses never improve, so patience runs out immediately.
    config.early_stopping = Some(EarlyStoppingConfig {
        monitor: "train_loss".to_string(),
        patience: 1,
        mode: Mode::Max,
    });
    let mut optimizer = config.build_optimizer();
    let mut train_set = InMemoryDataset::new(inputs, Targets::Classes(labels), 4).unwrap();

    let report = train_loop(&mut net, &mut train_set, None, &mut optimizer, &config).unwrap();
    assert_eq!(report.stop_reason, StopReason::EarlyStopped);
    assert!(report.history.len() < 30);
}

#[test]
fn stop_flag_cancels_between_epochs() {
    let mut net = two_layer_net(9);
    let (inputs, labels) = four_samples();

    let mut config = TrainConfig::new(10, 4, 0.1, OptimizerKind::Sgd, LossType::CrossEntropy);
    let flag = Arc::new(AtomicBool::new(true));
    config.stop_flag = Some(flag.clone());
    let mut optimizer = config.build_optimizer();
    let mut train_set = InMemoryDataset::new(inputs, Targets::Classes(labels), 4).unwrap();

    let report = train_loop(&mut net, &mut train_set, None, &mut optimizer, &config).unwrap();
    assert_eq!(report.stop_reason, StopReason::Canceled);
    assert!(report.history.is_empty());
    flag.store(false, Ordering::Relaxed);
}

#[test]
fn val_monitor_without_val_data_is_rejected() {
    let mut net = two_layer_net(10);
    let (inputs, labels) = four_samples();

    let mut config = TrainConfig::new(5, 4, 0.1, OptimizerKind::Sgd, LossType::CrossEntropy);
    config.early_stopping = Some(EarlyStoppingConfig {
        monitor: "val_loss".to_string(),
        patience: 2,
        mode: Mode::Min,
    });
    let mut optimizer = config.build_optimizer();
    let mut train_set = InMemoryDataset::new(inputs, Targets::Classes(labels), 4).unwrap();

    let err = train_loop(&mut net, &mut train_set, None, &mut optimizer, &config).unwrap_err();
    assert!(matches!(err, Error::InvalidConfig(_)));
}

#[test]
fn nan_loss_surfaces_as_numerical_instability() {
    let mut net = two_layer_net(11);
    let inputs = Tensor::from_vec(&[1, 4], vec![f64::NAN, 0.0, 0.0, 0.0]);

    let config = TrainConfig::new(3, 1, 0.1, OptimizerKind::Sgd, LossType::CrossEntropy);
    let mut optimizer = config.build_optimizer();
    let mut train_set = InMemoryDataset::new(inputs, Targets::Classes(vec![0]), 1).unwrap();

    let err = train_loop(&mut net, &mut train_set, None, &mut optimizer, &config).unwrap_err();
    assert!(matches!(err, Error::NumericalInstability { .. }));
}

#[test]
fn checkpoint_restores_bit_for_bit_resumable_training() {
    let mut net = two_layer_net(12);
    let (inputs, labels) = four_samples();
    let targets = Tensor::one_hot(&labels, 2);
    let mut optimizer: Optimizer = Adam::new(0.01).into();

    // A few steps so the optimizer has warm moment estimates.
    for _ in 0..3 {
        let logits = net.forward(&inputs, true).unwrap();
        let grad = SoftmaxCrossEntropy::derivative(&logits, &targets);
        net.backward(&grad).unwrap();
        let mut views = net.param_views();
        optimizer.step(&mut views);
        drop(views);
        net.zero_grads();
    }

    let state = magnetite::train::TrainingState::new(12, optimizer.lr());
    let path = std::env::temp_dir().join("magnetite_checkpoint_roundtrip.json");
    Checkpoint::save(&path, &net, Some(&optimizer), Some(&state)).unwrap();
    let loaded = Checkpoint::load(&path).unwrap();
    std::fs::remove_file(&path).ok();

    let mut resumed_net = loaded.network;
    let mut resumed_opt = loaded.optimizer.unwrap();
    assert_eq!(
        serde_json::to_string(&net).unwrap(),
        serde_json::to_string(&resumed_net).unwrap()
    );
    assert_eq!(
        serde_json::to_string(&optimizer).unwrap(),
        serde_json::to_string(&resumed_opt).unwrap()
    );

    // One more identical step on both copies diverges nowhere.
    for (network, opt) in [(&mut net, &mut optimizer), (&mut resumed_net, &mut resumed_opt)] {
        let logits = network.forward(&inputs, true).unwrap();
        let grad = SoftmaxCrossEntropy::derivative(&logits, &targets);
        network.backward(&grad).unwrap();
        let mut views = network.param_views();
        opt.step(&mut views);
    }
    let originals = net.named_params();
    let resumed = resumed_net.named_params();
    assert_eq!(originals.len(), resumed.len());
    for ((name_a, a), (name_b, b)) in originals.iter().zip(resumed.iter()) {
        assert_eq!(name_a, name_b);
        assert_eq!(a, b, "parameter {name_a} diverged after resume");
    }
}

#[test]
fn checkpoint_callback_writes_on_improvement() {
    let mut net = two_layer_net(13);
    let (inputs, labels) = four_samples();

    let path: PathBuf = std::env::temp_dir().join("magnetite_checkpoint_callback.json");
    std::fs::remove_file(&path).ok();

    let mut config = TrainConfig::new(5, 4, 0.3, OptimizerKind::Sgd, LossType::CrossEntropy);
    config.checkpoint = Some(CheckpointConfig {
        path: path.clone(),
        monitor: "train_loss".to_string(),
        mode: Mode::Min,
    });
    let mut optimizer = config.build_optimizer();
    let mut train_set = InMemoryDataset::new(inputs, Targets::Classes(labels), 4).unwrap();

    let report = train_loop(&mut net, &mut train_set, None, &mut optimizer, &config).unwrap();
    assert!(report.state.best_metric.is_some());

    let checkpoint = Checkpoint::load(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert!(checkpoint.optimizer.is_some());
    assert!(checkpoint.state.is_some());
    let names: Vec<String> = checkpoint.param_map().into_iter().map(|(n, _)| n).collect();
    assert_eq!(names, vec!["0.Dense.W", "0.Dense.b", "2.Dense.W", "2.Dense.b"]);
}
