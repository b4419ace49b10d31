use crate::math::tensor::Tensor;

/// Softmax cross-entropy over `(N, C)` logits, the softmax fused into the
/// loss so training never needs a standalone softmax layer.
pub struct SoftmaxCrossEntropy;

impl SoftmaxCrossEntropy {
    /// Numerically stable row-wise softmax: logits are shifted by their
    /// per-row maximum before exponentiation to avoid overflow.
    pub fn softmax(logits: &Tensor) -> Tensor {
        assert_eq!(logits.ndim(), 2, "softmax expects (N, C) logits");
        let classes = logits.dim(1);
        let mut probs = logits.clone();
        for row in probs.data.chunks_mut(classes) {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let mut sum = 0.0;
            for v in row.iter_mut() {
                *v = (*v - max).exp();
                sum += *v;
            }
            for v in row.iter_mut() {
                *v /= sum;
            }
        }
        probs
    }

    /// Mean negative log-likelihood over the batch, computed through the
    /// max-shifted log-sum-exp so no probability is ever materialized near 0.
    ///
    /// `targets` are one-hot (or soft) rows matching the logits shape.
    pub fn loss(logits: &Tensor, targets: &Tensor) -> f64 {
        assert_eq!(
            logits.shape(),
            targets.shape(),
            "cross-entropy logits and target shapes differ"
        );
        let n = logits.dim(0);
        let classes = logits.dim(1);
        let mut total = 0.0;
        for (row, t_row) in logits
            .data
            .chunks(classes)
            .zip(targets.data.chunks(classes))
        {
            let max = row.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
            let log_sum_exp = row.iter().map(|&z| (z - max).exp()).sum::<f64>().ln();
            for (&z, &t) in row.iter().zip(t_row.iter()) {
                // log p = (z - max) - logsumexp
                total -= t * ((z - max) - log_sum_exp);
            }
        }
        total / n as f64
    }

    /// Gradient with respect to the logits: exactly
    /// `(softmax(logits) - targets) / N`.
    ///
    /// Implemented directly rather than by chaining a softmax backward into a
    /// cross-entropy backward, which would hit a 0/0 when a predicted
    /// probability reaches 1.
    pub fn derivative(logits: &Tensor, targets: &Tensor) -> Tensor {
        assert_eq!(
            logits.shape(),
            targets.shape(),
            "cross-entropy logits and target shapes differ"
        );
        let n = logits.dim(0) as f64;
        let probs = SoftmaxCrossEntropy::softmax(logits);
        probs.zip_map(targets, |p, t| (p - t) / n)
    }
}
