// Conv2d forward shape checks and finite-difference verification of the
// hand-derived gradients for weights, bias and input.

use rand::prelude::*;

use magnetite::math::grad_check::{compare, numeric_grad};
use magnetite::{Conv2d, Error, Tensor};

const TOL: f64 = 1e-4;
const EPS: f64 = 1e-5;

fn random_tensor(shape: &[usize], rng: &mut StdRng) -> Tensor {
    let mut t = Tensor::zeros(shape);
    for v in t.data.iter_mut() {
        *v = rng.gen_range(-1.0..1.0);
    }
    t
}

fn dot(a: &Tensor, b: &Tensor) -> f64 {
    a.data.iter().zip(b.data.iter()).map(|(x, y)| x * y).sum()
}

#[test]
fn forward_shape_follows_the_output_formula() {
    let mut rng = StdRng::seed_from_u64(1);
    let mut conv = Conv2d::new(3, 8, 3, 1, 1, &mut rng);
    let x = random_tensor(&[2, 3, 8, 8], &mut rng);
    let y = conv.forward(&x, false).unwrap();
    // (8 + 2*1 - 3)/1 + 1 = 8: padding 1 preserves the spatial extent.
    assert_eq!(y.shape(), &[2, 8, 8, 8]);

    let mut strided = Conv2d::new(3, 4, 3, 2, 0, &mut rng);
    let y = strided.forward(&x, false).unwrap();
    // (8 - 3)/2 + 1 = 3.
    assert_eq!(y.shape(), &[2, 4, 3, 3]);
}

#[test]
fn rejects_wrong_channel_count() {
    let mut rng = StdRng::seed_from_u64(2);
    let mut conv = Conv2d::new(3, 4, 3, 1, 0, &mut rng);
    let x = Tensor::zeros(&[1, 2, 5, 5]);
    assert!(matches!(
        conv.forward(&x, false),
        Err(Error::ShapeMismatch { layer: "Conv2d", .. })
    ));
}

#[test]
fn input_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(5);
    let mut conv = Conv2d::new(2, 3, 3, 1, 1, &mut rng);
    let x = random_tensor(&[2, 2, 4, 4], &mut rng);

    let y = conv.forward(&x, true).unwrap();
    let upstream = random_tensor(y.shape(), &mut rng);
    let dx = conv.backward(&upstream).unwrap();
    assert_eq!(dx.shape(), x.shape());

    let numeric = numeric_grad(
        &x,
        |probe| {
            let mut fresh = conv.clone();
            let out = fresh.forward(probe, true).unwrap();
            dot(&out, &upstream)
        },
        EPS,
    );
    compare(&dx, &numeric, TOL).unwrap();
}

#[test]
fn weight_gradient_matches_finite_differences() {
    let mut rng = StdRng::seed_from_u64(6);
    let mut conv = Conv2d::new(2, 3, 3, 2, 1, &mut rng);
    let x = random_tensor(&[2, 2, 5, 5], &mut rng);

    let y = conv.forward(&x, true).unwrap();
    let upstream = random_tensor(y.shape(), &mut rng);
    conv.backward(&upstream).unwrap();

    let numeric = numeric_grad(
        &conv.weight().clone(),
        |probe| {
            let mut fresh = conv.clone();
            *fresh.weight_mut() = probe.clone();
            let out = fresh.forward(&x, true).unwrap();
            dot(&out, &upstream)
        },
        EPS,
    );
    compare(conv.weight_grad(), &numeric, TOL).unwrap();
}

#[test]
fn bias_gradient_is_the_spatial_sum_of_upstream() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut conv = Conv2d::new(1, 2, 3, 1, 0, &mut rng);
    let x = random_tensor(&[3, 1, 5, 5], &mut rng);

    let y = conv.forward(&x, true).unwrap();
    let upstream = random_tensor(y.shape(), &mut rng);
    conv.backward(&upstream).unwrap();

    let (out_h, out_w) = (y.dim(2), y.dim(3));
    for o in 0..2 {
        let mut expected = 0.0;
        for img in 0..3 {
            for i in 0..out_h {
                for j in 0..out_w {
                    expected += upstream.data[((img * 2 + o) * out_h + i) * out_w + j];
                }
            }
        }
        let got = conv.bias_grad().unwrap().data[o];
        assert!((got - expected).abs() < 1e-10, "channel {o}: {got} vs {expected}");
    }
}

#[test]
fn backward_without_forward_is_an_error() {
    let mut rng = StdRng::seed_from_u64(8);
    let mut conv = Conv2d::new(1, 1, 3, 1, 0, &mut rng);
    let grad = Tensor::zeros(&[1, 1, 3, 3]);
    assert!(matches!(
        conv.backward(&grad),
        Err(Error::UninitializedCache { layer: "Conv2d" })
    ));
}
