use crate::math::tensor::Tensor;

/// Index of the maximum element; first maximum wins on ties.
pub(crate) fn argmax(row: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in row.iter().enumerate() {
        if v > row[best] {
            best = i;
        }
    }
    best
}

/// Top-1 accuracy for `(N, C)` logits (or probabilities) against integer
/// class labels.
pub fn accuracy(logits: &Tensor, labels: &[usize]) -> f64 {
    assert_eq!(logits.ndim(), 2, "accuracy expects (N, C) scores");
    assert_eq!(logits.dim(0), labels.len(), "score rows and labels differ");
    if labels.is_empty() {
        return 0.0;
    }
    let classes = logits.dim(1);
    let correct = logits
        .data
        .chunks(classes)
        .zip(labels.iter())
        .filter(|(row, label)| argmax(row) == **label)
        .count();
    correct as f64 / labels.len() as f64
}

/// Top-k accuracy: a row counts as correct when fewer than `k` classes score
/// strictly higher than the true class.
pub fn topk_accuracy(logits: &Tensor, labels: &[usize], k: usize) -> f64 {
    assert_eq!(logits.ndim(), 2, "topk_accuracy expects (N, C) scores");
    assert_eq!(logits.dim(0), labels.len(), "score rows and labels differ");
    if labels.is_empty() {
        return 0.0;
    }
    let classes = logits.dim(1);
    let k = k.clamp(1, classes);
    let correct = logits
        .data
        .chunks(classes)
        .zip(labels.iter())
        .filter(|(row, label)| {
            let target = row[**label];
            row.iter().filter(|&&v| v > target).count() < k
        })
        .count();
    correct as f64 / labels.len() as f64
}
