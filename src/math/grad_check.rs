//! Finite-difference gradient checking, used by the test suite to verify
//! that every hand-derived backward pass matches a numeric approximation.

use crate::error::{Error, Result};
use crate::math::tensor::Tensor;

/// Central-difference numeric gradient of a scalar function at `x`.
///
/// Perturbs one element at a time: `(f(x + eps) - f(x - eps)) / (2 eps)`.
pub fn numeric_grad<F>(x: &Tensor, mut f: F, eps: f64) -> Tensor
where
    F: FnMut(&Tensor) -> f64,
{
    let mut grad = Tensor::zeros(x.shape());
    let mut probe = x.clone();
    for i in 0..probe.data.len() {
        let orig = probe.data[i];
        probe.data[i] = orig + eps;
        let f_plus = f(&probe);
        probe.data[i] = orig - eps;
        let f_minus = f(&probe);
        probe.data[i] = orig;
        grad.data[i] = (f_plus - f_minus) / (2.0 * eps);
    }
    grad
}

/// Worst element-wise error between two gradients, relative for large values
/// and absolute for small ones: `|a - n| / max(1, |a| + |n|)`.
pub fn max_error(analytic: &Tensor, numeric: &Tensor) -> f64 {
    assert_eq!(
        analytic.shape(),
        numeric.shape(),
        "gradient shapes differ: {:?} vs {:?}",
        analytic.shape(),
        numeric.shape()
    );
    analytic
        .data
        .iter()
        .zip(numeric.data.iter())
        .map(|(&a, &n)| (a - n).abs() / (a.abs() + n.abs()).max(1.0))
        .fold(0.0, f64::max)
}

/// Compares an analytic gradient against a numeric one, failing with
/// [`Error::GradientCheck`] when the worst error exceeds `tolerance`.
pub fn compare(analytic: &Tensor, numeric: &Tensor, tolerance: f64) -> Result<()> {
    let max_err = max_error(analytic, numeric);
    if max_err > tolerance {
        return Err(Error::GradientCheck { max_err, tolerance });
    }
    Ok(())
}
