// MaxPool2d: gradient routing to recorded argmax positions, first-in-scan
// tie-breaking, and accumulation under overlapping windows.

use magnetite::{Error, MaxPool2d, Tensor};

#[test]
fn forward_picks_window_maxima() {
    let x = Tensor::from_vec(&[1, 1, 4, 4], (0..16).map(f64::from).collect());
    let mut pool = MaxPool2d::new(2);
    let y = pool.forward(&x, false).unwrap();
    assert_eq!(y.shape(), &[1, 1, 2, 2]);
    assert_eq!(y.data, vec![5.0, 7.0, 13.0, 15.0]);
}

#[test]
fn backward_routes_gradient_to_unique_maxima() {
    // Strictly increasing values: the maximum of each 2x2 window is unique
    // and sits at the window's bottom-right corner.
    let x = Tensor::from_vec(&[1, 1, 4, 4], (0..16).map(f64::from).collect());
    let mut pool = MaxPool2d::new(2);
    pool.forward(&x, true).unwrap();

    let upstream = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let dx = pool.backward(&upstream).unwrap();

    let mut expected = Tensor::zeros(&[1, 1, 4, 4]);
    expected.data[5] = 1.0; // value 5, max of top-left window
    expected.data[7] = 2.0; // value 7
    expected.data[13] = 3.0; // value 13
    expected.data[15] = 4.0; // value 15
    assert_eq!(dx, expected);
}

#[test]
fn ties_go_to_the_first_element_in_scan_order() {
    let x = Tensor::ones(&[1, 1, 4, 4]);
    let mut pool = MaxPool2d::new(2);
    pool.forward(&x, true).unwrap();

    let upstream = Tensor::ones(&[1, 1, 2, 2]);
    let dx = pool.backward(&upstream).unwrap();

    // Each window is constant; the whole gradient lands on its top-left cell.
    let mut expected = Tensor::zeros(&[1, 1, 4, 4]);
    for &idx in &[0, 2, 8, 10] {
        expected.data[idx] = 1.0;
    }
    assert_eq!(dx, expected);
}

#[test]
fn overlapping_windows_accumulate_at_a_shared_argmax() {
    // Single global maximum at the center of a 3x3 plane; kernel 2 with
    // stride 1 puts it inside all four windows.
    let mut x = Tensor::zeros(&[1, 1, 3, 3]);
    x.data[4] = 10.0;
    let mut pool = MaxPool2d::with_stride(2, 1);
    pool.forward(&x, true).unwrap();

    let upstream = Tensor::ones(&[1, 1, 2, 2]);
    let dx = pool.backward(&upstream).unwrap();
    assert_eq!(dx.data[4], 4.0);
    assert_eq!(dx.data.iter().sum::<f64>(), 4.0);
}

#[test]
fn backward_without_forward_is_an_error() {
    let mut pool = MaxPool2d::new(2);
    let grad = Tensor::zeros(&[1, 1, 2, 2]);
    assert!(matches!(
        pool.backward(&grad),
        Err(Error::UninitializedCache { layer: "MaxPool2d" })
    ));
}

#[test]
fn eval_forward_keeps_no_cache() {
    let x = Tensor::from_vec(&[1, 1, 2, 2], vec![1.0, 2.0, 3.0, 4.0]);
    let mut pool = MaxPool2d::new(2);
    pool.forward(&x, false).unwrap();
    // No training forward happened, so backward must refuse.
    let grad = Tensor::zeros(&[1, 1, 1, 1]);
    assert!(pool.backward(&grad).is_err());
}
