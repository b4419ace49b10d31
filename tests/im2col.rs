// Tests for the im2col/col2im pair: exact inversion when windows tile the
// image, and the adjoint identity <im2col(x), y> == <x, col2im(y)> when
// windows overlap.

use rand::prelude::*;

use magnetite::math::{col2im, im2col, out_size};
use magnetite::Tensor;

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
fn columns_list_receptive_fields() {
    // 1x1x3x3 image with values 0..9, kernel 2, stride 1, no padding.
    let x = Tensor::from_vec(&[1, 1, 3, 3], (0..9).map(f64::from).collect());
    let cols = im2col(&x, (2, 2), 1, 0);
    assert_eq!(cols.shape(), &[4, 4]);
    // First window is the top-left 2x2 block.
    assert_eq!(&cols.data[0..4], &[0.0, 1.0, 3.0, 4.0]);
    // Last window is the bottom-right 2x2 block.
    assert_eq!(&cols.data[12..16], &[4.0, 5.0, 7.0, 8.0]);
}

#[test]
fn padding_contributes_zeros() {
    let x = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let cols = im2col(&x, (2, 2), 1, 1);
    assert_eq!(out_size(2, 2, 1, 1), 3);
    assert_eq!(cols.shape(), &[9, 4]);
    // Top-left window covers padding everywhere except its bottom-right cell.
    assert_eq!(&cols.data[0..4], &[0.0, 0.0, 0.0, 1.0]);
}

#[test]
fn col2im_inverts_im2col_when_windows_tile() {
    let mut rng = StdRng::seed_from_u64(3);
    // stride == kernel, no padding: every input element appears in exactly
    // one window, so the scatter-add reconstructs the input exactly.
    let x = random_tensor(&[2, 3, 4, 6], &mut rng);
    let cols = im2col(&x, (2, 2), 2, 0);
    let back = col2im(&cols, [2, 3, 4, 6], (2, 2), 2, 0);
    assert_eq!(back, x);
}

#[test]
fn col2im_is_the_adjoint_with_overlap_and_padding() {
    let mut rng = StdRng::seed_from_u64(4);
    let x = random_tensor(&[2, 3, 5, 5], &mut rng);
    let cols = im2col(&x, (3, 3), 1, 1);
    let y = random_tensor(cols.shape(), &mut rng);
    let lhs = dot(&cols, &y);
    let rhs = dot(&x, &col2im(&y, [2, 3, 5, 5], (3, 3), 1, 1));
    assert!(
        (lhs - rhs).abs() < 1e-10,
        "adjoint identity violated: {lhs} vs {rhs}"
    );
}

#[test]
fn overlapping_windows_accumulate() {
    // All-ones columns, kernel 2, stride 1 on a 3x3 image: the center cell
    // belongs to all four windows.
    let cols = Tensor::ones(&[4, 4]);
    let x = col2im(&cols, [1, 1, 3, 3], (2, 2), 1, 0);
    assert_eq!(x.data[4], 4.0); // center
    assert_eq!(x.data[0], 1.0); // corner
    assert_eq!(x.data[1], 2.0); // edge
}
