use crate::math::tensor::Tensor;

/// Output spatial extent of a windowed op: `(in + 2*pad - kernel)/stride + 1`.
/// Callers must ensure `in + 2*pad >= kernel` before calling.
pub fn out_size(input: usize, kernel: usize, stride: usize, pad: usize) -> usize {
    (input + 2 * pad - kernel) / stride + 1
}

/// Rewrites every kernel-sized window of a zero-padded `(N, C, H, W)` tensor
/// as one row of a `(N*out_h*out_w, C*KH*KW)` matrix, so a convolution
/// becomes a single matrix product with the reshaped kernel.
pub fn im2col(x: &Tensor, kernel: (usize, usize), stride: usize, pad: usize) -> Tensor {
    assert_eq!(x.ndim(), 4, "im2col expects a (N,C,H,W) tensor");
    let (n, c, h, w) = (x.dim(0), x.dim(1), x.dim(2), x.dim(3));
    let (kh, kw) = kernel;
    let out_h = out_size(h, kh, stride, pad);
    let out_w = out_size(w, kw, stride, pad);
    let row_len = c * kh * kw;

    let mut cols = Tensor::zeros(&[n * out_h * out_w, row_len]);
    for img in 0..n {
        for oh in 0..out_h {
            for ow in 0..out_w {
                let row = (img * out_h + oh) * out_w + ow;
                let row_base = row * row_len;
                for ch in 0..c {
                    for ki in 0..kh {
                        // Window coordinates in the padded image; skip the
                        // zero-padding band (entries stay 0.0).
                        let ih = oh * stride + ki;
                        if ih < pad || ih >= h + pad {
                            continue;
                        }
                        for kj in 0..kw {
                            let iw = ow * stride + kj;
                            if iw < pad || iw >= w + pad {
                                continue;
                            }
                            let src = ((img * c + ch) * h + (ih - pad)) * w + (iw - pad);
                            let dst = row_base + (ch * kh + ki) * kw + kj;
                            cols.data[dst] = x.data[src];
                        }
                    }
                }
            }
        }
    }
    cols
}

/// Adjoint of [`im2col`]: scatter-adds column entries back into image layout.
///
/// Windows overlap when stride < kernel size, so contributions accumulate
/// rather than overwrite; entries that fell in the padding band are dropped.
/// When windows exactly tile the image (stride == kernel, no padding) this is
/// the exact inverse of `im2col`.
pub fn col2im(
    cols: &Tensor,
    x_shape: [usize; 4],
    kernel: (usize, usize),
    stride: usize,
    pad: usize,
) -> Tensor {
    let [n, c, h, w] = x_shape;
    let (kh, kw) = kernel;
    let out_h = out_size(h, kh, stride, pad);
    let out_w = out_size(w, kw, stride, pad);
    let row_len = c * kh * kw;
    assert_eq!(
        cols.shape(),
        &[n * out_h * out_w, row_len],
        "col2im: column matrix does not match image shape {x_shape:?}"
    );

    let mut x = Tensor::zeros(&[n, c, h, w]);
    for img in 0..n {
        for oh in 0..out_h {
            for ow in 0..out_w {
                let row_base = ((img * out_h + oh) * out_w + ow) * row_len;
                for ch in 0..c {
                    for ki in 0..kh {
                        let ih = oh * stride + ki;
                        if ih < pad || ih >= h + pad {
                            continue;
                        }
                        for kj in 0..kw {
                            let iw = ow * stride + kj;
                            if iw < pad || iw >= w + pad {
                                continue;
                            }
                            let dst = ((img * c + ch) * h + (ih - pad)) * w + (iw - pad);
                            let src = row_base + (ch * kh + ki) * kw + kj;
                            x.data[dst] += cols.data[src];
                        }
                    }
                }
            }
        }
    }
    x
}
