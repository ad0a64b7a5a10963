//! # `UNet` Model
//!
//! The classic 4 level encoder/decoder:
//!
//! ```text
//! inc  (n_channels -> w)            x1 ───────────────────────────┐
//! down1(w  -> 2w)  /2               x2 ──────────────────────┐    │
//! down2(2w -> 4w)  /2               x3 ─────────────────┐    │    │
//! down3(4w -> 8w)  /2               x4 ────────────┐    │    │    │
//! down4(8w -> 8w)  /2               x5             │    │    │    │
//! up1  (16w -> 4w) x2  <── cat ────────────────────┘    │    │    │
//! up2  (8w  -> 2w) x2  <── cat ─────────────────────────┘    │    │
//! up3  (4w  -> w)  x2  <── cat ──────────────────────────────┘    │
//! up4  (2w  -> w)  x2  <── cat ───────────────────────────────────┘
//! outc (w -> n_classes) 1x1
//! ```
//!
//! With ``w = base_width``; 64 in the reference architecture.

use crate::layers::blocks::double_conv::{DoubleConv, DoubleConvConfig};
use crate::layers::init::conv_initializer;
use crate::models::unet::down::{Down, DownConfig, DownMeta};
use crate::models::unet::up::{Up, UpConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Number of encoder (and decoder) stages.
pub const UNET_DEPTH: usize = 4;

/// [`UNet`] Meta trait.
pub trait UNetMeta {
    /// Number of input channels.
    fn n_channels(&self) -> usize;

    /// Number of output classes.
    fn n_classes(&self) -> usize;

    /// Width of the first encoder level.
    fn base_width(&self) -> usize;

    /// Resolutions of the encoder outputs ``[x1, x2, x3, x4, x5]``.
    ///
    /// # Panics
    ///
    /// If the input is too small for the encoder depth.
    fn encoder_resolutions(
        &self,
        input_resolution: [usize; 2],
    ) -> [[usize; 2]; UNET_DEPTH + 1] {
        // The pool arithmetic is channel independent.
        let pool = DownConfig::new(1, 1);
        let mut resolutions = [input_resolution; UNET_DEPTH + 1];
        for i in 1..=UNET_DEPTH {
            resolutions[i] = pool.output_resolution(resolutions[i - 1]);
        }
        resolutions
    }
}

/// [`UNet`] Config.
#[derive(Config, Debug)]
pub struct UNetConfig {
    /// Number of input channels.
    pub n_channels: usize,

    /// Number of output classes.
    pub n_classes: usize,

    /// Upsample with bilinear interpolation, rather than transposed convolutions.
    #[config(default = true)]
    pub bilinear: bool,

    /// Width of the first encoder level.
    #[config(default = 64)]
    pub base_width: usize,
}

impl UNetMeta for UNetConfig {
    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn base_width(&self) -> usize {
        self.base_width
    }
}

impl UNetConfig {
    /// Initialize a [`UNet`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> UNet<B> {
        let w = self.base_width;
        let bilinear = self.bilinear;
        let up = |in_channels, out_channels| {
            UpConfig::new(in_channels, out_channels)
                .with_bilinear(bilinear)
                .init(device)
        };

        let model = UNet {
            inc: DoubleConvConfig::new(self.n_channels, w).init(device),
            down1: DownConfig::new(w, 2 * w).init(device),
            down2: DownConfig::new(2 * w, 4 * w).init(device),
            down3: DownConfig::new(4 * w, 8 * w).init(device),
            down4: DownConfig::new(8 * w, 8 * w).init(device),
            up1: up(16 * w, 4 * w),
            up2: up(8 * w, 2 * w),
            up3: up(4 * w, w),
            up4: up(2 * w, w),
            outc: Conv2dConfig::new([w, self.n_classes], [1, 1])
                .with_initializer(conv_initializer([1, 1], self.n_classes))
                .init(device),
            n_channels: self.n_channels,
            n_classes: self.n_classes,
            base_width: w,
        };

        tracing::debug!(
            model = "UNet",
            n_channels = self.n_channels,
            n_classes = self.n_classes,
            base_width = w,
            bilinear,
            num_params = model.num_params(),
            "initialized"
        );

        model
    }
}

/// `UNet` model.
///
/// Maps ``[batch, n_channels, height, width]`` to
/// ``[batch, n_classes, height, width]``.
#[derive(Module, Debug)]
pub struct UNet<B: Backend> {
    /// Input block.
    pub inc: DoubleConv<B>,

    /// Encoder stage 1.
    pub down1: Down<B>,
    /// Encoder stage 2.
    pub down2: Down<B>,
    /// Encoder stage 3.
    pub down3: Down<B>,
    /// Encoder stage 4.
    pub down4: Down<B>,

    /// Decoder stage 1; pairs with `down3`.
    pub up1: Up<B>,
    /// Decoder stage 2; pairs with `down2`.
    pub up2: Up<B>,
    /// Decoder stage 3; pairs with `down1`.
    pub up3: Up<B>,
    /// Decoder stage 4; pairs with `inc`.
    pub up4: Up<B>,

    /// 1x1 class projection.
    pub outc: Conv2d<B>,

    n_channels: usize,
    n_classes: usize,
    base_width: usize,
}

impl<B: Backend> UNetMeta for UNet<B> {
    fn n_channels(&self) -> usize {
        self.n_channels
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }

    fn base_width(&self) -> usize {
        self.base_width
    }
}

impl<B: Backend> UNet<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, n_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, n_classes, height, width]`` logits.
    ///
    /// # Panics
    ///
    /// If either spatial dimension is smaller than ``2^4``.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "n_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("n_channels", self.n_channels())]
        );
        // Fail before any compute on inputs too small for the encoder.
        self.encoder_resolutions([height, width]);

        let x1 = self.inc.forward(input);
        tracing::trace!(stage = "inc", dims = ?x1.dims());
        let x2 = self.down1.forward(x1.clone());
        tracing::trace!(stage = "down1", dims = ?x2.dims());
        let x3 = self.down2.forward(x2.clone());
        tracing::trace!(stage = "down2", dims = ?x3.dims());
        let x4 = self.down3.forward(x3.clone());
        tracing::trace!(stage = "down3", dims = ?x4.dims());
        let x5 = self.down4.forward(x4.clone());
        tracing::trace!(stage = "down4", dims = ?x5.dims());

        let x = self.up1.forward(x5, x4);
        tracing::trace!(stage = "up1", dims = ?x.dims());
        let x = self.up2.forward(x, x3);
        tracing::trace!(stage = "up2", dims = ?x.dims());
        let x = self.up3.forward(x, x2);
        tracing::trace!(stage = "up3", dims = ?x.dims());
        let x = self.up4.forward(x, x1);
        tracing::trace!(stage = "up4", dims = ?x.dims());

        let x = self.outc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "n_classes", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("n_classes", self.n_classes()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::unet::up::UpMeta;
    use crate::testing::{assert_all_eq, sample_mean_and_variance};
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;
    use hamcrest::prelude::*;

    #[test]
    fn test_unet_config() {
        let config = UNetConfig::new(3, 5);
        assert_eq!(config.n_channels(), 3);
        assert_eq!(config.n_classes(), 5);
        assert_eq!(config.base_width(), 64);
        assert!(config.bilinear);

        assert_eq!(
            config.encoder_resolutions([128, 100]),
            [[128, 100], [64, 50], [32, 25], [16, 12], [8, 6]]
        );
    }

    #[test]
    fn test_unet_channel_schedule() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UNet<B> = UNetConfig::new(1, 2).with_base_width(4).init(&device);

        let encoder = [
            model.down1.out_channels(),
            model.down2.out_channels(),
            model.down3.out_channels(),
            model.down4.out_channels(),
        ];
        assert_eq!(encoder, [8, 16, 32, 32]);

        let decoder = [
            (model.up1.in_channels(), model.up1.out_channels()),
            (model.up2.in_channels(), model.up2.out_channels()),
            (model.up3.in_channels(), model.up3.out_channels()),
            (model.up4.in_channels(), model.up4.out_channels()),
        ];
        assert_eq!(decoder, [(64, 16), (32, 8), (16, 4), (8, 4)]);
        assert_eq!(model.outc.weight.dims(), [2, 4, 1, 1]);
    }

    #[test]
    fn test_unet_init() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UNet<B> = UNetConfig::new(3, 2).with_base_width(16).init(&device);

        // down3.conv.cna2: 3x3, 128 -> 128
        let weight = model.down3.conv.cna2.conv.weight.val();
        let (_, variance) = sample_mean_and_variance(weight);
        let expected = 2.0 / (9.0 * 128.0);
        assert_that!(variance, close_to(expected, 0.05));

        assert_all_eq(model.up2.conv.cna1.norm.gamma.val(), 1.0);
        assert_all_eq(model.up2.conv.cna1.norm.beta.val(), 0.0);
    }

    #[test]
    fn test_unet_forward_odd_sizes() {
        type B = NdArray<f32>;
        let device = Default::default();

        for bilinear in [true, false] {
            let model: UNet<B> = UNetConfig::new(2, 3)
                .with_base_width(4)
                .with_bilinear(bilinear)
                .init(&device);

            for [height, width] in [[16, 16], [37, 21], [33, 48]] {
                let input =
                    Tensor::random([2, 2, height, width], Distribution::Default, &device);
                let output = model.forward(input);

                assert_shape_contract!(
                    ["batch", "n_classes", "height", "width"],
                    &output,
                    &[
                        ("batch", 2),
                        ("n_classes", 3),
                        ("height", height),
                        ("width", width)
                    ]
                );
            }
        }
    }

    #[test]
    #[should_panic(expected = "No legal output size")]
    fn test_unet_input_too_small() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UNet<B> = UNetConfig::new(1, 1).with_base_width(2).init(&device);
        model.forward(Tensor::zeros([1, 1, 8, 32], &device));
    }

    #[test]
    fn test_unet_reference_shape() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UNet<B> = UNetConfig::new(3, 5).init(&device);
        let input = Tensor::random([1, 3, 128, 128], Distribution::Default, &device);

        let output = model.forward(input);
        assert_eq!(output.dims(), [1, 5, 128, 128]);
    }
}
