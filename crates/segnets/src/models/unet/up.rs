//! # `UNet` Decoder Stage
//!
//! [`Up`] doubles the resolution of the decoder tensor, pads it to exactly
//! the resolution of the skip tensor, concatenates ``[skip, upsampled]``
//! on the channel axis, and applies a [`DoubleConv`].
//!
//! The upsample is either:
//! * bilinear interpolation (``scale_factor=2``), or
//! * a learned 2x2 stride 2 transposed convolution.
//!
//! Bilinear uses ``InterpolateMode::Linear``, which aligns corners on 4-D input.
//!
//! Odd skip sizes leave a discrepancy of 1; it is split ``floor/ceil``
//! around the center, so the extra row/column goes to the bottom/right.

use crate::compat::conv_shape::{centered_padding, expect_pad_to_size};
use crate::layers::blocks::double_conv::{DoubleConv, DoubleConvConfig, DoubleConvMeta};
use crate::layers::init::conv_initializer;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{ConvTranspose2d, ConvTranspose2dConfig};
use burn::nn::interpolate::{Interpolate2d, Interpolate2dConfig, InterpolateMode};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Upsampling scale.
pub const UP_SCALE: usize = 2;

/// Upsample layer wrapper.
#[derive(Module, Debug)]
pub enum Upsample<B: Backend> {
    /// Bilinear interpolation; no weights.
    Bilinear(Interpolate2d),

    /// Learned transposed convolution.
    Transposed(ConvTranspose2d<B>),
}

impl<B: Backend> Upsample<B> {
    /// Build the upsample layer for the given channel count.
    pub fn init(
        channels: usize,
        bilinear: bool,
        device: &B::Device,
    ) -> Self {
        if bilinear {
            Upsample::Bilinear(
                Interpolate2dConfig::new()
                    .with_scale_factor(Some([UP_SCALE as f32, UP_SCALE as f32]))
                    .with_mode(InterpolateMode::Linear)
                    .init(),
            )
        } else {
            let kernel = [UP_SCALE, UP_SCALE];
            Upsample::Transposed(
                ConvTranspose2dConfig::new([channels, channels], kernel)
                    .with_stride(kernel)
                    .with_initializer(conv_initializer(kernel, channels))
                    .init(device),
            )
        }
    }

    /// Upsample ``[batch, channels, height, width]``
    /// to ``[batch, channels, 2*height, 2*width]``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Upsample::Bilinear(interpolate) => interpolate.forward(input),
            Upsample::Transposed(deconv) => deconv.forward(input),
        }
    }
}

/// Zero pad a ``[batch, channels, height, width]`` tensor to a target resolution.
///
/// Each axis discrepancy is split with [`centered_padding`].
///
/// # Panics
///
/// If the tensor is larger than the target on either axis.
pub fn pad_to_resolution<B: Backend>(
    input: Tensor<B, 4>,
    target_resolution: [usize; 2],
) -> Tensor<B, 4> {
    let [_, _, height, width] = input.dims();
    let diff_y = expect_pad_to_size(height, target_resolution[0]);
    let diff_x = expect_pad_to_size(width, target_resolution[1]);
    if diff_y == 0 && diff_x == 0 {
        return input;
    }

    let (top, bottom) = centered_padding(diff_y);
    let (left, right) = centered_padding(diff_x);
    input.pad((left, right, top, bottom), 0.0)
}

/// [`Up`] Meta trait.
pub trait UpMeta {
    /// Channels after concatenation; the [`DoubleConv`] input.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Channels of the decoder input; also of the skip input.
    fn up_channels(&self) -> usize {
        self.in_channels() / 2
    }
}

/// [`Up`] Config.
#[derive(Config, Debug)]
pub struct UpConfig {
    /// Channels after concatenation.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Use bilinear interpolation rather than a transposed convolution.
    #[config(default = true)]
    pub bilinear: bool,
}

impl UpMeta for UpConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl UpConfig {
    /// Initialize an [`Up`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Up<B> {
        Up {
            up: Upsample::init(self.up_channels(), self.bilinear, device),
            conv: DoubleConvConfig::new(self.in_channels, self.out_channels).init(device),
        }
    }
}

/// Upsample + pad + skip concat + double conv decoder stage.
#[derive(Module, Debug)]
pub struct Up<B: Backend> {
    /// The upsample layer.
    pub up: Upsample<B>,

    /// The post-concat block.
    pub conv: DoubleConv<B>,
}

impl<B: Backend> UpMeta for Up<B> {
    fn in_channels(&self) -> usize {
        self.conv.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }
}

impl<B: Backend> Up<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, up_channels, in_height, in_width]``;
    ///   with ``2*in_height <= height``, ``2*in_width <= width``.
    /// - `skip`: ``[batch, up_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
        skip: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch] = unpack_shape_contract!(
            ["batch", "up_channels", "in_height", "in_width"],
            &input,
            &["batch"],
            &[("up_channels", self.up_channels())]
        );
        let [height, width] = unpack_shape_contract!(
            ["batch", "up_channels", "height", "width"],
            &skip,
            &["height", "width"],
            &[("batch", batch), ("up_channels", self.up_channels())]
        );

        let x = self.up.forward(input);
        let x = pad_to_resolution(x, [height, width]);

        let x = Tensor::cat(vec![skip, x], 1);
        let x = self.conv.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}
