// Sequential: shape threading through a heterogeneous stack, the cache
// contract, parameter naming, and JSON round-tripping.

use rand::prelude::*;

use magnetite::{
    BatchNorm2d, Conv2d, Dense, Error, Layer, MaxPool2d, ReLU, Sequential, Tensor,
};

fn random_tensor(shape: &[usize], rng: &mut StdRng) -> Tensor {
    let mut t = Tensor::zeros(shape);
    for v in t.data.iter_mut() {
        *v = rng.gen_range(-1.0..1.0);
    }
    t
}

fn small_stack(rng: &mut StdRng) -> Sequential {
    Sequential::new(vec![
        Conv2d::new(1, 2, 3, 1, 1, rng).into(),
        ReLU::new().into(),
        MaxPool2d::new(2).into(),
        Dense::new(2 * 2 * 2, 3, rng).into(),
    ])
    .unwrap()
}

#[test]
fn forward_threads_shapes_through_the_stack() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut net = small_stack(&mut rng);
    let x = random_tensor(&[2, 1, 4, 4], &mut rng);
    let y = net.forward(&x, false).unwrap();
    assert_eq!(y.shape(), &[2, 3]);
}

#[test]
fn backward_returns_an_input_shaped_gradient() {
    let mut rng = StdRng::seed_from_u64(32);
    let mut net = small_stack(&mut rng);
    let x = random_tensor(&[2, 1, 4, 4], &mut rng);
    let y = net.forward(&x, true).unwrap();
    let dx = net.backward(&random_tensor(y.shape(), &mut rng)).unwrap();
    assert_eq!(dx.shape(), x.shape());
}

#[test]
fn parameters_carry_layer_indexed_names() {
    let mut rng = StdRng::seed_from_u64(33);
    let net = small_stack(&mut rng);
    let names: Vec<String> = net.named_params().into_iter().map(|(n, _)| n).collect();
    assert_eq!(
        names,
        vec!["0.Conv2d.W", "0.Conv2d.b", "3.Dense.W", "3.Dense.b"]
    );
}

#[test]
fn backward_before_forward_is_rejected() {
    let mut rng = StdRng::seed_from_u64(34);
    let mut net = small_stack(&mut rng);
    // The reverse pass hits the last layer first.
    let err = net.backward(&Tensor::zeros(&[2, 3])).unwrap_err();
    assert!(matches!(err, Error::UninitializedCache { layer: "Dense" }));
}

#[test]
fn training_forward_twice_without_backward_is_rejected() {
    let mut rng = StdRng::seed_from_u64(35);
    let mut net = small_stack(&mut rng);
    let x = random_tensor(&[1, 1, 4, 4], &mut rng);
    net.forward(&x, true).unwrap();
    let err = net.forward(&x, true).unwrap_err();
    assert!(matches!(err, Error::UnconsumedCache { layer: "Conv2d" }));
}

#[test]
fn repeated_inference_forwards_are_fine() {
    let mut rng = StdRng::seed_from_u64(36);
    let mut net = small_stack(&mut rng);
    let x = random_tensor(&[1, 1, 4, 4], &mut rng);
    let a = net.forward(&x, false).unwrap();
    let b = net.forward(&x, false).unwrap();
    assert_eq!(a, b);
}

#[test]
fn zero_grads_clears_every_gradient_buffer() {
    let mut rng = StdRng::seed_from_u64(37);
    let mut net = small_stack(&mut rng);
    let x = random_tensor(&[2, 1, 4, 4], &mut rng);
    let y = net.forward(&x, true).unwrap();
    net.backward(&random_tensor(y.shape(), &mut rng)).unwrap();

    assert!(net
        .param_views()
        .iter()
        .any(|v| v.grad.data.iter().any(|&g| g != 0.0)));
    net.zero_grads();
    assert!(net
        .param_views()
        .iter()
        .all(|v| v.grad.data.iter().all(|&g| g == 0.0)));
}

#[test]
fn json_round_trip_preserves_the_model_exactly() {
    let mut rng = StdRng::seed_from_u64(38);
    let mut net = Sequential::new(vec![
        Conv2d::new(1, 2, 3, 1, 1, &mut rng).into(),
        Layer::BatchNorm2d(BatchNorm2d::new(2)),
        ReLU::new().into(),
        MaxPool2d::new(2).into(),
        Dense::new(2 * 2 * 2, 3, &mut rng).into(),
    ])
    .unwrap();

    // Move the batch-norm running statistics off their defaults.
    let x = random_tensor(&[4, 1, 4, 4], &mut rng);
    let y = net.forward(&x, true).unwrap();
    net.backward(&random_tensor(y.shape(), &mut rng)).unwrap();

    let path = std::env::temp_dir().join("magnetite_sequential_roundtrip.json");
    net.save_json(&path).unwrap();
    let mut loaded = Sequential::load_json(&path).unwrap();
    std::fs::remove_file(&path).ok();

    // Bit-for-bit: parameters, running stats, everything serialized.
    assert_eq!(
        serde_json::to_string(&net).unwrap(),
        serde_json::to_string(&loaded).unwrap()
    );

    let probe = random_tensor(&[2, 1, 4, 4], &mut rng);
    assert_eq!(
        net.forward(&probe, false).unwrap(),
        loaded.forward(&probe, false).unwrap()
    );
}
