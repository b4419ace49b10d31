use crate::math::tensor::Tensor;

/// Mean-squared error over every element of the prediction.
pub struct MseLoss;

impl MseLoss {
    /// Scalar MSE: mean((predicted - expected)^2) over all elements.
    pub fn loss(predicted: &Tensor, expected: &Tensor) -> f64 {
        assert_eq!(
            predicted.shape(),
            expected.shape(),
            "MSE prediction and target shapes differ"
        );
        let n = predicted.numel() as f64;
        predicted
            .data
            .iter()
            .zip(expected.data.iter())
            .map(|(&p, &e)| (p - e) * (p - e))
            .sum::<f64>()
            / n
    }

    /// Gradient with respect to the prediction: `2 * (predicted - expected) / n`
    /// where `n` is the total element count.
    pub fn derivative(predicted: &Tensor, expected: &Tensor) -> Tensor {
        let n = predicted.numel() as f64;
        predicted.zip_map(expected, |p, e| 2.0 * (p - e) / n)
    }
}
