//! # `UResNet` Model
//!
//! A residual encoder/decoder; every encoder stage is a strided
//! [`DoubleResNet`], every decoder stage a [`ConvTransposeLayer`]
//! sized to its skip partner:
//!
//! ```text
//! stem  (input_channels -> i -> i -> i)      x0 ──────────────────────────┐
//! enc1  (i  -> 2i)  /2                       x1 ─────────────────────┐    │
//! enc2  (2i -> 4i)  /2                       x2 ────────────────┐    │    │
//! enc3  (4i -> 8i)  /2                       x3 ───────────┐    │    │    │
//! enc4  (8i -> 16i) /2                       x4            │    │    │    │
//! dec4  (16i -> 8i) x2  -> size(x3), cat ──────────────────┘    │    │    │
//! dec3  (16i -> 4i) x2  -> size(x2), cat ───────────────────────┘    │    │
//! dec2  (8i  -> 2i) x2  -> size(x1), cat ────────────────────────────┘    │
//! dec1  (4i  -> i)  x2  -> size(x0) ──────────────────────────────────────┘
//! head  (i -> h -> 2h -> h)
//! classifier (h -> num_classes) 1x1
//! ```
//!
//! With ``i = inplanes`` and ``h = head_width``. The encoder rounds odd
//! sizes up, and each decoder stage solves its output padding to land on
//! the exact skip resolution, so any ``height, width >= 1`` round trips.

use crate::layers::init::conv_initializer;
use crate::models::uresnet::bottleneck::BottleneckMeta;
use crate::models::uresnet::conv_transpose_layer::{ConvTransposeLayer, ConvTransposeLayerConfig};
use crate::models::uresnet::double_resnet::{DoubleResNet, DoubleResNetConfig};
use crate::models::uresnet::stems::{ConvStem, ConvStemConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Number of encoder (and decoder) stages.
pub const URESNET_DEPTH: usize = 4;

/// Stride of every encoder stage.
pub const ENCODER_STRIDE: usize = 2;

/// [`UResNet`] Meta trait.
pub trait UResNetMeta {
    /// Number of output classes.
    fn num_classes(&self) -> usize;

    /// Number of input channels.
    fn input_channels(&self) -> usize;

    /// Width of the input stem; the encoder doubles it per stage.
    fn inplanes(&self) -> usize;

    /// Width of the output head.
    fn head_width(&self) -> usize;

    /// Resolutions of the encoder outputs ``[x0, x1, x2, x3, x4]``.
    fn encoder_resolutions(
        &self,
        input_resolution: [usize; 2],
    ) -> [[usize; 2]; URESNET_DEPTH + 1] {
        // The stride arithmetic is channel independent.
        let stage = DoubleResNetConfig::new(1, 1).with_stride(ENCODER_STRIDE);
        let mut resolutions = [input_resolution; URESNET_DEPTH + 1];
        for i in 1..=URESNET_DEPTH {
            resolutions[i] = stage.output_resolution(resolutions[i - 1]);
        }
        resolutions
    }
}

/// [`UResNet`] Config.
#[derive(Config, Debug)]
pub struct UResNetConfig {
    /// Number of output classes.
    #[config(default = 3)]
    pub num_classes: usize,

    /// Number of input channels.
    #[config(default = 3)]
    pub input_channels: usize,

    /// Width of the input stem.
    #[config(default = 16)]
    pub inplanes: usize,

    /// Width of the output head.
    #[config(default = 16)]
    pub head_width: usize,
}

impl Default for UResNetConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl UResNetMeta for UResNetConfig {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_channels(&self) -> usize {
        self.input_channels
    }

    fn inplanes(&self) -> usize {
        self.inplanes
    }

    fn head_width(&self) -> usize {
        self.head_width
    }
}

impl UResNetConfig {
    /// Initialize a [`UResNet`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> UResNet<B> {
        let i = self.inplanes;
        let h = self.head_width;
        let enc = |in_planes, planes| {
            DoubleResNetConfig::new(in_planes, planes)
                .with_stride(ENCODER_STRIDE)
                .init(device)
        };
        let dec =
            |in_planes, out_planes| ConvTransposeLayerConfig::new(in_planes, out_planes).init(device);

        let model = UResNet {
            stem: ConvStemConfig::new(self.input_channels, vec![i, i, i]).init(device),
            enc_layer1: enc(i, 2 * i),
            enc_layer2: enc(2 * i, 4 * i),
            enc_layer3: enc(4 * i, 8 * i),
            enc_layer4: enc(8 * i, 16 * i),
            dec_layer4: dec(16 * i, 8 * i),
            dec_layer3: dec(16 * i, 4 * i),
            dec_layer2: dec(8 * i, 2 * i),
            dec_layer1: dec(4 * i, i),
            head: ConvStemConfig::new(i, vec![h, 2 * h, h]).init(device),
            classifier: Conv2dConfig::new([h, self.num_classes], [1, 1])
                .with_initializer(conv_initializer([1, 1], self.num_classes))
                .init(device),
            num_classes: self.num_classes,
            input_channels: self.input_channels,
            inplanes: i,
            head_width: h,
        };

        tracing::debug!(
            model = "UResNet",
            num_classes = self.num_classes,
            input_channels = self.input_channels,
            inplanes = i,
            head_width = h,
            num_params = model.num_params(),
            "initialized"
        );

        model
    }
}

/// `UResNet` model.
///
/// Maps ``[batch, input_channels, height, width]`` to
/// ``[batch, num_classes, height, width]``.
#[derive(Module, Debug)]
pub struct UResNet<B: Backend> {
    /// Input stem.
    pub stem: ConvStem<B>,

    /// Encoder stage 1.
    pub enc_layer1: DoubleResNet<B>,
    /// Encoder stage 2.
    pub enc_layer2: DoubleResNet<B>,
    /// Encoder stage 3.
    pub enc_layer3: DoubleResNet<B>,
    /// Encoder stage 4.
    pub enc_layer4: DoubleResNet<B>,

    /// Decoder stage 4; sized to `enc_layer3`.
    pub dec_layer4: ConvTransposeLayer<B>,
    /// Decoder stage 3; sized to `enc_layer2`.
    pub dec_layer3: ConvTransposeLayer<B>,
    /// Decoder stage 2; sized to `enc_layer1`.
    pub dec_layer2: ConvTransposeLayer<B>,
    /// Decoder stage 1; sized to the stem.
    pub dec_layer1: ConvTransposeLayer<B>,

    /// Output head.
    pub head: ConvStem<B>,

    /// 1x1 class projection.
    pub classifier: Conv2d<B>,

    num_classes: usize,
    input_channels: usize,
    inplanes: usize,
    head_width: usize,
}

impl<B: Backend> UResNetMeta for UResNet<B> {
    fn num_classes(&self) -> usize {
        self.num_classes
    }

    fn input_channels(&self) -> usize {
        self.input_channels
    }

    fn inplanes(&self) -> usize {
        self.inplanes
    }

    fn head_width(&self) -> usize {
        self.head_width
    }
}

impl<B: Backend> UResNet<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, input_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes, height, width]`` logits.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "input_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("input_channels", self.input_channels())]
        );
        // Decoder stage targets; the stem preserves resolution.
        let resolutions = self.encoder_resolutions([height, width]);

        let x0 = self.stem.forward(input);
        tracing::trace!(stage = "stem", dims = ?x0.dims());
        let x1 = self.enc_layer1.forward(x0.clone());
        tracing::trace!(stage = "enc_layer1", dims = ?x1.dims());
        let x2 = self.enc_layer2.forward(x1.clone());
        tracing::trace!(stage = "enc_layer2", dims = ?x2.dims());
        let x3 = self.enc_layer3.forward(x2.clone());
        tracing::trace!(stage = "enc_layer3", dims = ?x3.dims());
        let x4 = self.enc_layer4.forward(x3.clone());
        tracing::trace!(stage = "enc_layer4", dims = ?x4.dims());

        let x = self.dec_layer4.forward(x4, resolutions[3]);
        tracing::trace!(stage = "dec_layer4", dims = ?x.dims());
        let x = Tensor::cat(vec![x, x3], 1);
        let x = self.dec_layer3.forward(x, resolutions[2]);
        tracing::trace!(stage = "dec_layer3", dims = ?x.dims());
        let x = Tensor::cat(vec![x, x2], 1);
        let x = self.dec_layer2.forward(x, resolutions[1]);
        tracing::trace!(stage = "dec_layer2", dims = ?x.dims());
        let x = Tensor::cat(vec![x, x1], 1);
        let x = self.dec_layer1.forward(x, resolutions[0]);
        tracing::trace!(stage = "dec_layer1", dims = ?x.dims());

        let x = self.head.forward(x);
        tracing::trace!(stage = "head", dims = ?x.dims());
        let x = self.classifier.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "num_classes", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("num_classes", self.num_classes()),
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
    use crate::models::uresnet::conv_transpose_layer::ConvTransposeLayerMeta;
    use crate::models::uresnet::stems::ConvStemMeta;
    use crate::testing::{assert_all_eq, sample_mean_and_variance};
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;
    use hamcrest::prelude::*;

    #[test]
    fn test_uresnet_config() {
        let config = UResNetConfig::default();
        assert_eq!(config.num_classes(), 3);
        assert_eq!(config.input_channels(), 3);
        assert_eq!(config.inplanes(), 16);
        assert_eq!(config.head_width(), 16);

        assert_eq!(
            config.encoder_resolutions([64, 37]),
            [[64, 37], [32, 19], [16, 10], [8, 5], [4, 3]]
        );
        assert_eq!(
            config.encoder_resolutions([1, 3]),
            [[1, 3], [1, 2], [1, 1], [1, 1], [1, 1]]
        );
    }

    #[test]
    fn test_uresnet_channel_schedule() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UResNet<B> = UResNetConfig::new()
            .with_input_channels(1)
            .with_num_classes(2)
            .with_inplanes(4)
            .with_head_width(3)
            .init(&device);

        assert_eq!(model.stem.in_channels(), 1);
        assert_eq!(model.stem.widths(), vec![4, 4, 4]);

        let encoder = [
            (model.enc_layer1.in_planes(), model.enc_layer1.planes()),
            (model.enc_layer2.in_planes(), model.enc_layer2.planes()),
            (model.enc_layer3.in_planes(), model.enc_layer3.planes()),
            (model.enc_layer4.in_planes(), model.enc_layer4.planes()),
        ];
        assert_eq!(encoder, [(4, 8), (8, 16), (16, 32), (32, 64)]);

        let decoder = [
            (model.dec_layer4.in_planes(), model.dec_layer4.out_planes()),
            (model.dec_layer3.in_planes(), model.dec_layer3.out_planes()),
            (model.dec_layer2.in_planes(), model.dec_layer2.out_planes()),
            (model.dec_layer1.in_planes(), model.dec_layer1.out_planes()),
        ];
        assert_eq!(decoder, [(64, 32), (64, 16), (32, 8), (16, 4)]);

        assert_eq!(model.head.widths(), vec![3, 6, 3]);
        assert_eq!(model.classifier.weight.dims(), [2, 3, 1, 1]);
        assert!(model.classifier.bias.is_some());
    }

    #[test]
    fn test_uresnet_init() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UResNet<B> = UResNetConfig::new().init(&device);

        // enc_layer3.res2.cna2: 3x3, 128 -> 128
        let weight = model.enc_layer3.res2.cna2.conv.weight.val();
        let (_, variance) = sample_mean_and_variance(weight);
        let expected = 2.0 / (9.0 * 128.0);
        assert_that!(variance, close_to(expected, 0.05));

        // dec_layer4.deconv: 3x3, 256 -> 128
        let weight = model.dec_layer4.deconv.weight.val();
        let (mean, variance) = sample_mean_and_variance(weight);
        assert!(mean.abs() < 1e-3, "mean={mean}");
        assert_that!(variance, close_to(expected, 0.05));

        assert_all_eq(model.head.layers[1].norm.gamma.val(), 1.0);
        assert_all_eq(model.head.layers[1].norm.beta.val(), 0.0);
    }

    #[test]
    fn test_uresnet_reference_shape_autodiff() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let model: UResNet<B> = UResNetConfig::new()
            .with_num_classes(2)
            .with_input_channels(1)
            .with_inplanes(16)
            .init(&device);

        let input = Tensor::random([2, 1, 64, 64], Distribution::Default, &device);
        let output = model.forward(input);

        assert_shape_contract!(
            ["batch", "num_classes", "height", "width"],
            &output,
            &[
                ("batch", 2),
                ("num_classes", 2),
                ("height", 64),
                ("width", 64)
            ]
        );
    }

    #[test]
    fn test_uresnet_encoder_matches_resolutions() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UResNet<B> = UResNetConfig::new()
            .with_input_channels(1)
            .with_inplanes(2)
            .init(&device);

        let [height, width] = [37, 21];
        let resolutions = model.encoder_resolutions([height, width]);

        let x = model
            .stem
            .forward(Tensor::random([1, 1, height, width], Distribution::Default, &device));
        let mut dims = vec![x.dims()];
        let x = model.enc_layer1.forward(x);
        dims.push(x.dims());
        let x = model.enc_layer2.forward(x);
        dims.push(x.dims());
        let x = model.enc_layer3.forward(x);
        dims.push(x.dims());
        let x = model.enc_layer4.forward(x);
        dims.push(x.dims());

        let observed: Vec<[usize; 2]> = dims.iter().map(|d| [d[2], d[3]]).collect();
        assert_eq!(observed, resolutions.to_vec());
        assert_eq!(resolutions[4], [3, 2]);
    }

    #[test]
    fn test_uresnet_forward_odd_sizes() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: UResNet<B> = UResNetConfig::new()
            .with_input_channels(2)
            .with_num_classes(3)
            .with_inplanes(2)
            .with_head_width(4)
            .init(&device);

        for [height, width] in [[16, 16], [37, 21], [33, 48], [5, 3]] {
            let input = Tensor::random([1, 2, height, width], Distribution::Default, &device);
            let output = model.forward(input);

            assert_shape_contract!(
                ["batch", "num_classes", "height", "width"],
                &output,
                &[
                    ("batch", 1),
                    ("num_classes", 3),
                    ("height", height),
                    ("width", width)
                ]
            );
        }
    }
}
