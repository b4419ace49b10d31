use rand::prelude::*;

use magnetite::network::spec::LayerSpec;
use magnetite::optim::SchedulerConfig;
use magnetite::train::OptimizerKind;
use magnetite::{
    train_loop, InMemoryDataset, LossType, NetworkSpec, SoftmaxCrossEntropy, Targets, Tensor,
    TrainConfig,
};

/// Two-class synthetic images: class 0 lights up the top half of an 8x8
/// grid, class 1 the bottom half, plus uniform noise.
fn synthetic_images(n: usize, rng: &mut StdRng) -> (Tensor, Vec<usize>) {
    let mut data = vec![0.0; n * 64];
    let mut labels = Vec::with_capacity(n);
    for i in 0..n {
        let class = i % 2;
        labels.push(class);
        for h in 0..8 {
            for w in 0..8 {
                let bright = if class == 0 { h < 4 } else { h >= 4 };
                let base = if bright { 1.0 } else { 0.0 };
                data[i * 64 + h * 8 + w] = base + 0.2 * rng.gen::<f64>();
            }
        }
    }
    (Tensor::from_vec(&[n, 1, 8, 8], data), labels)
}

fn main() -> magnetite::Result<()> {
    let mut rng = StdRng::seed_from_u64(7);
    let (train_x, train_y) = synthetic_images(64, &mut rng);
    let (val_x, val_y) = synthetic_images(32, &mut rng);

    let spec = NetworkSpec {
        name: "demo-convnet".to_string(),
        loss: LossType::CrossEntropy,
        layers: vec![
            LayerSpec::Conv2d {
                in_channels: 1,
                out_channels: 4,
                kernel_size: 3,
                stride: 1,
                padding: 1,
            },
            LayerSpec::BatchNorm2d {
                num_features: 4,
                eps: 1e-5,
                momentum: 0.9,
            },
            LayerSpec::ReLU,
            LayerSpec::MaxPool2d {
                kernel_size: 2,
                stride: None,
            },
            LayerSpec::Dropout { p: 0.1 },
            LayerSpec::Dense {
                in_features: 4 * 4 * 4,
                out_features: 2,
                init: None,
            },
        ],
    };
    let mut network = spec.build(&mut rng)?;
    println!("{}: {} learnable parameters", spec.name, network.num_params());

    let mut config = TrainConfig::new(10, 8, 0.05, OptimizerKind::Momentum, LossType::CrossEntropy);
    config.scheduler = Some(SchedulerConfig::Step {
        step_size: 5,
        gamma: 0.5,
    });
    let mut optimizer = config.build_optimizer();

    let mut train_set =
        InMemoryDataset::new(train_x, Targets::Classes(train_y), config.batch_size)?.shuffled(11);
    let mut val_set = InMemoryDataset::new(val_x, Targets::Classes(val_y), config.batch_size)?;

    let report = train_loop(
        &mut network,
        &mut train_set,
        Some(&mut val_set),
        &mut optimizer,
        &config,
    )?;

    for stats in &report.history {
        println!(
            "[{:02}/{}] train_loss={:.4} train_acc={:.3} val_loss={:.4} val_acc={:.3} lr={:.4} ({} ms)",
            stats.epoch,
            stats.total_epochs,
            stats.train_loss,
            stats.train_accuracy.unwrap_or(f64::NAN),
            stats.val_loss.unwrap_or(f64::NAN),
            stats.val_accuracy.unwrap_or(f64::NAN),
            stats.lr,
            stats.elapsed_ms,
        );
    }
    println!("stopped: {:?}", report.stop_reason);

    // Inference pass: class probabilities for a few fresh samples.
    let (probe_x, probe_y) = synthetic_images(4, &mut rng);
    let logits = network.forward(&probe_x, false)?;
    let probs = SoftmaxCrossEntropy::softmax(&logits);
    for (i, &actual) in probe_y.iter().enumerate() {
        let p0 = probs.data[i * 2];
        let p1 = probs.data[i * 2 + 1];
        let predicted = if p1 > p0 { 1 } else { 0 };
        println!("sample {i}: predicted {predicted} (p=[{p0:.3}, {p1:.3}]), actual {actual}");
    }
    Ok(())
}
