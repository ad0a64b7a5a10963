//! Test helpers.

use burn::prelude::{Backend, Tensor};

/// Sample mean and (unbiased) variance of every element of a tensor.
pub fn sample_mean_and_variance<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> (f64, f64) {
    let values: Vec<f64> = tensor.into_data().iter::<f64>().collect();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    (mean, variance)
}

/// Assert every element of a tensor equals `expected`.
pub fn assert_all_eq<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    expected: f64,
) {
    for v in tensor.into_data().iter::<f64>() {
        assert_eq!(v, expected);
    }
}
