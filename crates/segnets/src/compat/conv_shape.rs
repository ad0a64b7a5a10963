//! # Convolution Shape Utilities
//!
//! Utilities for computing the output shape of convolution, pooling,
//! and transposed convolution operations; and for reconciling
//! upsampled feature maps with their skip partners.

/// Predict the output size of a 1D convolution operation.
///
/// ```text
/// out_size = floor( ((in_size + 2*padding - dilation*(kernel_size-1) - 1) / stride) + 1 )
/// ```
///
/// Pooling layers without ceil-mode share this arithmetic.
///
/// # Reference
///
/// - [conv_arithmetic diagram](https://github.com/vdumoulin/conv_arithmetic/blob/master/README.md)
///   visual explanations of these convolution parameters.
/// - [pytorch conv1d](https://docs.pytorch.org/docs/stable/generated/torch.nn.Conv1d.html)
///
/// # Arguments
///
/// - `input_size`: The input dimension size, must be > 0.
/// - `kernel_size`: The kernel size, must be > 0.
/// - `stride`: The stride of the convolution, must be > 0.
/// - `padding`: The padding of the convolution, added evenly to all sides of the input.
/// - `dilation`: The dilation of the convolution, must be > 0.
///
/// # Returns
///
/// An `Option<usize>` representing the output size; or `None` for <= 0.
pub fn maybe_conv1d_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    assert!(input_size > 0);
    assert!(kernel_size > 0);
    assert!(stride > 0);
    assert!(dilation > 0);

    let effective_size = input_size + 2 * padding;
    let pos = effective_size + stride;
    let kernel_width = 1 + dilation * (kernel_size - 1);

    if pos < kernel_width {
        return None;
    }
    let x = (pos - kernel_width) / stride;
    if x < 1 { None } else { Some(x) }
}

/// Predict the output shape of a D convolution operation.
///
/// This is the ``panic``-ing generalization of [`maybe_conv1d_output_size`]
/// to D dimensions.
///
/// # Panics
///
/// If any output dimension would be <= 0.
pub fn expect_conv_output_shape<const D: usize>(
    input_shape: [usize; D],
    kernel_shape: [usize; D],
    stride: [usize; D],
    padding: [usize; D],
    dilation: [usize; D],
) -> [usize; D] {
    let mut output_shape = input_shape;
    for i in 0..D {
        output_shape[i] = match maybe_conv1d_output_size(
            input_shape[i],
            kernel_shape[i],
            stride[i],
            padding[i],
            dilation[i],
        ) {
            Some(x) => x,
            None => panic!(
                "No legal output size for conv with:\n input_shape:{input_shape:?}\n kernel_shape:{kernel_shape:?}\n stride:{stride:?}\n dilation:{dilation:?}\n padding:{padding:?}",
            ),
        };
    }
    output_shape
}

/// The output size of a 1D transposed convolution.
///
/// ```text
/// out_size = (in_size - 1)*stride - 2*padding + dilation*(kernel_size - 1) + padding_out + 1
/// ```
///
/// # Panics
///
/// If the padding consumes the entire output.
pub fn conv_transpose1d_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    padding_out: usize,
    dilation: usize,
) -> usize {
    let full = (input_size - 1) * stride + dilation * (kernel_size - 1) + padding_out + 1;
    match full.checked_sub(2 * padding) {
        Some(size) if size > 0 => size,
        _ => panic!(
            "No legal output size for conv_transpose with:\n input_size:{input_size}\n kernel_size:{kernel_size}\n stride:{stride}\n padding:{padding}\n padding_out:{padding_out}",
        ),
    }
}

/// Solve for the output padding which makes a 1D transposed convolution
/// produce exactly `target_size`.
///
/// A target is reachable iff the solution satisfies ``0 <= padding_out < stride``.
///
/// # Returns
///
/// `Some(padding_out)`, or `None` if the target is not reachable.
pub fn maybe_conv_transpose1d_padding_out(
    input_size: usize,
    target_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    let min_size = conv_transpose1d_output_size(input_size, kernel_size, stride, padding, 0, dilation);
    let padding_out = target_size.checked_sub(min_size)?;
    if padding_out < stride {
        Some(padding_out)
    } else {
        None
    }
}

/// Split a padding discrepancy around the center.
///
/// The leading side receives ``floor(diff / 2)``, the trailing side the rest.
///
/// # Returns
///
/// ``(before, after)``
#[inline(always)]
pub fn centered_padding(diff: usize) -> (usize, usize) {
    let before = diff / 2;
    (before, diff - before)
}

/// Compute the discrepancy between a source and a (not smaller) target size.
///
/// # Panics
///
/// If the source is larger than the target.
pub fn expect_pad_to_size(
    source_size: usize,
    target_size: usize,
) -> usize {
    match target_size.checked_sub(source_size) {
        Some(diff) => diff,
        None => panic!(
            "Cannot pad size {source_size} to smaller target size {target_size}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conv1d_output_shape() {
        pub fn conv1d_output_size_reference(
            input_shape: usize,
            kernel_shape: usize,
            stride: usize,
            padding: usize,
            dilation: usize,
        ) -> Option<usize> {
            let input_shape = input_shape as f64;
            let kernel_shape = kernel_shape as f64;
            let stride = stride as f64;
            let dilation = dilation as f64;
            let padding = padding as f64;

            let effective_shape = input_shape + 2.0 * padding;
            let kernel_width = 1.0 + dilation * (kernel_shape - 1.0);

            let x = (((effective_shape - kernel_width) / stride) + 1.0).floor();
            if x < 1.0 { None } else { Some(x as usize) }
        }

        for input_shape in 1..10 {
            for stride in 1..3 {
                for kernel_shape in 1..4 {
                    for padding in 0..4 {
                        assert_eq!(
                            maybe_conv1d_output_size(input_shape, kernel_shape, stride, padding, 1),
                            conv1d_output_size_reference(input_shape, kernel_shape, stride, padding, 1)
                        )
                    }
                }
            }
        }
    }

    #[test]
    fn test_stride2_conv_is_ceil_half() {
        for h in 1usize..40 {
            let [out] = expect_conv_output_shape([h], [3], [2], [1], [1]);
            assert_eq!(out, h.div_ceil(2));
        }
    }

    #[test]
    fn test_max_pool_is_floor_half() {
        for h in 2..40 {
            let [out] = expect_conv_output_shape([h], [2], [2], [0], [1]);
            assert_eq!(out, h / 2);
        }
    }

    #[test]
    #[should_panic(expected = "No legal output size")]
    fn test_expect_conv_output_shape_panic() {
        expect_conv_output_shape([1, 1], [3, 3], [1, 1], [0, 0], [1, 1]);
    }

    #[test]
    fn test_conv_transpose_output_size() {
        // 3x3, stride 2, padding 1.
        assert_eq!(conv_transpose1d_output_size(4, 3, 2, 1, 0, 1), 7);
        assert_eq!(conv_transpose1d_output_size(4, 3, 2, 1, 1, 1), 8);

        // 2x2, stride 2.
        assert_eq!(conv_transpose1d_output_size(5, 2, 2, 0, 0, 1), 10);
    }

    #[test]
    fn test_conv_transpose_padding_out_inverts_stride2_conv() {
        for h in 2usize..40 {
            let down = h.div_ceil(2);
            let padding_out = maybe_conv_transpose1d_padding_out(down, h, 3, 2, 1, 1).unwrap();
            assert_eq!(padding_out, if h % 2 == 0 { 1 } else { 0 });
            assert_eq!(conv_transpose1d_output_size(down, 3, 2, 1, padding_out, 1), h);
        }
    }

    #[test]
    fn test_conv_transpose_padding_out_unreachable() {
        // min output is 7; 9 needs padding_out=2 >= stride.
        assert_eq!(maybe_conv_transpose1d_padding_out(4, 9, 3, 2, 1, 1), None);
        assert_eq!(maybe_conv_transpose1d_padding_out(4, 6, 3, 2, 1, 1), None);
    }

    #[test]
    fn test_centered_padding() {
        assert_eq!(centered_padding(0), (0, 0));
        assert_eq!(centered_padding(1), (0, 1));
        assert_eq!(centered_padding(2), (1, 1));
        assert_eq!(centered_padding(5), (2, 3));
    }

    #[test]
    #[should_panic(expected = "Cannot pad size 9 to smaller target size 8")]
    fn test_expect_pad_to_size_panic() {
        expect_pad_to_size(9, 8);
    }
}
