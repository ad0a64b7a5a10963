//! # Weight Initialization
//!
//! Every convolution and transposed convolution in the segmentation
//! models is drawn from:
//!
//! ```text
//! weight ~ Normal(0, sqrt(2 / n)),  n = kernel_height * kernel_width * out_channels
//! ```
//!
//! Batch norm layers keep the ``burn`` defaults of ``gamma = 1``, ``beta = 0``.

use burn::nn::Initializer;

/// The ``n`` of the ``sqrt(2 / n)`` rule.
pub fn conv_fan_out(
    kernel_size: [usize; 2],
    out_channels: usize,
) -> usize {
    kernel_size[0] * kernel_size[1] * out_channels
}

/// Standard deviation of the conv weight distribution.
pub fn conv_init_std(
    kernel_size: [usize; 2],
    out_channels: usize,
) -> f64 {
    (2.0 / conv_fan_out(kernel_size, out_channels) as f64).sqrt()
}

/// Build the [`Initializer`] for a conv layer.
pub fn conv_initializer(
    kernel_size: [usize; 2],
    out_channels: usize,
) -> Initializer {
    Initializer::Normal {
        mean: 0.0,
        std: conv_init_std(kernel_size, out_channels),
    }
}
