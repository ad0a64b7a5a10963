//! # `ConvTransposeLayer` Decoder Stage
//!
//! A [`Bottleneck`] at the input resolution, followed by a 3x3 stride 2
//! transposed convolution to an explicit output resolution:
//!
//! ```text
//! out = deconv3x3/2(bottleneck(x), output_resolution)
//! ```
//!
//! The output resolution is supplied per call; the decoder passes the
//! resolution of the mirrored encoder tensor, so the result can be
//! concatenated with it.

use crate::layers::conv::conv_transpose_to_size::{
    ConvTranspose2dToSize, ConvTranspose2dToSizeConfig, ConvTranspose2dToSizeMeta,
};
use crate::models::uresnet::bottleneck::{Bottleneck, BottleneckConfig, BottleneckMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Deconv kernel size.
pub const DECONV_KERNEL_SIZE: usize = 3;

/// Deconv padding.
pub const DECONV_PADDING: usize = 1;

/// [`ConvTransposeLayer`] Meta trait.
pub trait ConvTransposeLayerMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn out_planes(&self) -> usize;

    /// The upsampling stride.
    fn stride(&self) -> usize;
}

/// [`ConvTransposeLayer`] Config.
#[derive(Config, Debug)]
pub struct ConvTransposeLayerConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The number of output feature planes.
    pub out_planes: usize,

    /// The upsampling stride.
    #[config(default = 2)]
    pub stride: usize,
}

impl ConvTransposeLayerMeta for ConvTransposeLayerConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn out_planes(&self) -> usize {
        self.out_planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl ConvTransposeLayerConfig {
    /// Build the deconv config.
    pub fn deconv_config(&self) -> ConvTranspose2dToSizeConfig {
        ConvTranspose2dToSizeConfig::new(
            [self.in_planes, self.out_planes],
            [DECONV_KERNEL_SIZE, DECONV_KERNEL_SIZE],
        )
        .with_stride([self.stride, self.stride])
        .with_padding([DECONV_PADDING, DECONV_PADDING])
        .with_bias(false)
    }

    /// Initialize a [`ConvTransposeLayer`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvTransposeLayer<B> {
        ConvTransposeLayer {
            res: BottleneckConfig::new(self.in_planes, self.in_planes).init(device),
            deconv: self.deconv_config().init(device),
        }
    }
}

/// Bottleneck + sized transposed convolution decoder stage.
#[derive(Module, Debug)]
pub struct ConvTransposeLayer<B: Backend> {
    /// Residual refinement at the input resolution.
    pub res: Bottleneck<B>,

    /// Upsampling deconv.
    pub deconv: ConvTranspose2dToSize<B>,
}

impl<B: Backend> ConvTransposeLayerMeta for ConvTransposeLayer<B> {
    fn in_planes(&self) -> usize {
        self.res.in_planes()
    }

    fn out_planes(&self) -> usize {
        self.deconv.out_channels()
    }

    fn stride(&self) -> usize {
        self.deconv.stride()[0]
    }
}

impl<B: Backend> ConvTransposeLayer<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    /// - `output_resolution`: ``[out_height, out_width]``; must be reachable,
    ///   ``out = 2*in - 1`` or ``out = 2*in``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_planes, out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the output resolution is not reachable.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        output_resolution: [usize; 2],
    ) -> Tensor<B, 4> {
        let [batch] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("in_planes", self.in_planes())]
        );

        let x = self.res.forward(input);
        let x = self.deconv.forward_to_size(x, output_resolution);

        assert_shape_contract_periodically!(
            ["batch", "out_planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_planes", self.out_planes()),
                ("out_height", output_resolution[0]),
                ("out_width", output_resolution[1])
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_config() {
        let config = ConvTransposeLayerConfig::new(16, 8);
        assert_eq!(config.in_planes(), 16);
        assert_eq!(config.out_planes(), 8);
        assert_eq!(config.stride(), 2);

        let deconv = config.deconv_config();
        assert_eq!(deconv.channels, [16, 8]);
        assert_eq!(deconv.kernel_size, [3, 3]);
        assert_eq!(deconv.stride, [2, 2]);
        assert_eq!(deconv.padding, [1, 1]);
        assert!(!deconv.bias);
    }

    #[test]
    fn test_forward_even_and_odd_targets() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: ConvTransposeLayer<B> = ConvTransposeLayerConfig::new(8, 4).init(&device);
        assert_eq!(layer.in_planes(), 8);
        assert_eq!(layer.out_planes(), 4);
        assert!(layer.res.shortcut.is_none());

        for target in [[10usize, 10], [9, 9], [10, 9], [1, 2]] {
            let input = Tensor::random(
                [2, 8, target[0].div_ceil(2), target[1].div_ceil(2)],
                Distribution::Default,
                &device,
            );
            let output = layer.forward(input, target);
            assert_shape_contract!(
                ["batch", "out_planes", "out_height", "out_width"],
                &output,
                &[
                    ("batch", 2),
                    ("out_planes", 4),
                    ("out_height", target[0]),
                    ("out_width", target[1])
                ]
            );
        }
    }

    #[test]
    #[should_panic(expected = "is not reachable")]
    fn test_forward_unreachable_target() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: ConvTransposeLayer<B> = ConvTransposeLayerConfig::new(2, 2).init(&device);
        layer.forward(Tensor::zeros([1, 2, 4, 4], &device), [12, 12]);
    }
}
