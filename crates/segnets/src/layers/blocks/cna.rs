//! # `CNA2d` - conv/norm/activation block.
//!
//! A [`CNA2d`] module is:
//! * a [`Conv2d`] layer,
//! * a [`BatchNorm`] layer,
//! * a [`Relu`] layer.
//!
//! With support for hooking the forward method,
//! to run code between the norm and activation layers;
//! which is where residual blocks add their bypass.

use crate::compat::conv_shape::expect_conv_output_shape;
use crate::layers::init::conv_initializer;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d, Relu};
use burn::prelude::{Backend, Tensor};

/// Resolve a [`PaddingConfig2d`] to explicit ``[pad_height, pad_width]``.
///
/// # Panics
///
/// On [`PaddingConfig2d::Same`]; the blocks in this crate always pad explicitly.
pub fn explicit_padding(padding: &PaddingConfig2d) -> [usize; 2] {
    match padding {
        PaddingConfig2d::Explicit(h, w) => [*h, *w],
        PaddingConfig2d::Valid => [0, 0],
        PaddingConfig2d::Same => panic!("Same padding has no fixed explicit size"),
    }
}

/// Build a square-kernel conv config carrying the crate's weight initializer.
///
/// # Arguments
///
/// - `channels`: ``[in_channels, out_channels]``.
/// - `kernel_size`: square kernel size.
/// - `stride`: square stride.
/// - `padding`: square explicit padding.
/// - `bias`: whether the conv has a bias.
pub fn square_conv2d_config(
    channels: [usize; 2],
    kernel_size: usize,
    stride: usize,
    padding: usize,
    bias: bool,
) -> Conv2dConfig {
    let kernel = [kernel_size, kernel_size];
    Conv2dConfig::new(channels, kernel)
        .with_stride([stride, stride])
        .with_padding(PaddingConfig2d::Explicit(padding, padding))
        .with_bias(bias)
        .with_initializer(conv_initializer(kernel, channels[1]))
}

/// [`CNA2d`] Meta.
pub trait CNA2dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// The conv kernel size.
    fn kernel_size(&self) -> [usize; 2];

    /// Get the stride.
    fn stride(&self) -> [usize; 2];

    /// Get the explicit padding.
    fn padding(&self) -> [usize; 2];

    /// Get the dilation.
    fn dilation(&self) -> [usize; 2];

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the input is too small for the conv.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        expect_conv_output_shape(
            input_resolution,
            self.kernel_size(),
            self.stride(),
            self.padding(),
            self.dilation(),
        )
    }
}

/// [`CNA2d`] Config.
///
/// Implements [`CNA2dMeta`].
#[derive(Config, Debug)]
pub struct CNA2dConfig {
    /// The [`Conv2d`] config.
    pub conv: Conv2dConfig,

    /// The [`BatchNorm`] config.
    ///
    /// The feature size is auto-matched to the conv output channels.
    #[config(default = "BatchNormConfig::new(0)")]
    pub norm: BatchNormConfig,
}

impl From<Conv2dConfig> for CNA2dConfig {
    fn from(conv: Conv2dConfig) -> Self {
        Self::new(conv)
    }
}

impl CNA2dMeta for CNA2dConfig {
    fn in_channels(&self) -> usize {
        self.conv.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.conv.channels[1]
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.conv.kernel_size
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }

    fn padding(&self) -> [usize; 2] {
        explicit_padding(&self.conv.padding)
    }

    fn dilation(&self) -> [usize; 2] {
        self.conv.dilation
    }
}

impl CNA2dConfig {
    /// Initialize a [`CNA2d`].
    ///
    /// Auto-matches the norm layer features
    /// to the conv layer's output channels.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> CNA2d<B> {
        let cfg = self.match_norm_features();
        CNA2d {
            conv: cfg.conv.init(device),
            norm: cfg.norm.init(device),
            act: Relu::new(),
        }
    }

    /// Adjust the norm features to match the conv output size.
    ///
    /// [`CNA2dConfig::init`] does this automatically.
    pub fn match_norm_features(self) -> Self {
        let num_features = self.out_channels();
        let norm = BatchNormConfig {
            num_features,
            ..self.norm
        };
        Self { norm, ..self }
    }
}

/// Sequenced conv/norm/activation block.
///
/// Implements [`CNA2dMeta`].
#[derive(Module, Debug)]
pub struct CNA2d<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,

    /// Activation layer.
    pub act: Relu,
}

impl<B: Backend> CNA2dMeta for CNA2d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.conv.groups
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.conv.kernel_size
    }

    fn stride(&self) -> [usize; 2] {
        self.conv.stride
    }

    fn padding(&self) -> [usize; 2] {
        explicit_padding(&self.conv.padding.0)
    }

    fn dilation(&self) -> [usize; 2] {
        self.conv.dilation
    }
}

impl<B: Backend> CNA2d<B> {
    /// Forward Pass.
    ///
    /// Applies the conv/norm/act layers in sequence:
    ///
    /// ```rust,ignore
    /// let x = self.conv.forward(input);
    /// let x = self.norm.forward(x);
    /// let x = self.act.forward(x);
    /// return x
    /// ```
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.hook_forward(input, |x| x)
    }

    /// Hooked Forward Pass.
    ///
    /// Applies the hook after normalization but before activation.
    ///
    /// ```rust,ignore
    /// let x = self.conv.forward(input);
    /// let x = self.norm.forward(x);
    /// let x = hook(x);
    /// let x = self.act.forward(x);
    /// return x
    /// ```
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn hook_forward<F>(
        &self,
        input: Tensor<B, 4>,
        hook: F,
    ) -> Tensor<B, 4>
    where
        F: FnOnce(Tensor<B, 4>) -> Tensor<B, 4>,
    {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.conv.forward(input);
        let x = self.norm.forward(x);

        let x = hook(x);

        let x = self.act.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::assert_all_eq;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::{Autodiff, NdArray};
    use burn::tensor::Distribution;

    #[test]
    fn test_cna_config() {
        let config: CNA2dConfig = square_conv2d_config([2, 4], 3, 2, 1, false).into();

        assert_eq!(config.in_channels(), 2);
        assert_eq!(config.out_channels(), 4);
        assert_eq!(config.kernel_size(), [3, 3]);
        assert_eq!(config.stride(), [2, 2]);
        assert_eq!(config.padding(), [1, 1]);
        assert_eq!(config.output_resolution([10, 10]), [5, 5]);
        assert_eq!(config.output_resolution([9, 7]), [5, 4]);

        let config = config.match_norm_features();
        assert_eq!(config.norm.num_features, 4);
    }

    #[test]
    #[should_panic(expected = "Same padding")]
    fn test_explicit_padding_same_panics() {
        explicit_padding(&PaddingConfig2d::Same);
    }

    #[test]
    fn test_cna_init() {
        type B = NdArray<f32>;
        let device = Default::default();

        let layer: CNA2d<B> = CNA2dConfig::new(square_conv2d_config([3, 8], 3, 1, 1, true))
            .init(&device);

        assert_eq!(layer.in_channels(), 3);
        assert_eq!(layer.out_channels(), 8);
        assert_eq!(layer.norm.gamma.dims(), [8]);
        assert_all_eq(layer.norm.gamma.val(), 1.0);
        assert_all_eq(layer.norm.beta.val(), 0.0);
    }

    #[test]
    fn test_cna() {
        type B = Autodiff<NdArray<f32>>;
        let device = Default::default();

        let layer: CNA2d<B> = CNA2dConfig::new(square_conv2d_config([2, 4], 3, 2, 1, false))
            .init(&device);

        let input = Tensor::random([2, 2, 9, 10], Distribution::Default, &device);

        {
            let output = layer.forward(input.clone());
            assert_shape_contract!(
                ["batch", "out_channels", "out_height", "out_width"],
                &output,
                &[
                    ("batch", 2),
                    ("out_channels", 4),
                    ("out_height", 5),
                    ("out_width", 5)
                ]
            );

            let expected = {
                let x = layer.conv.forward(input.clone());
                let x = layer.norm.forward(x);
                layer.act.forward(x)
            };
            output.to_data().assert_eq(&expected.to_data(), true);
        }

        {
            let hook = |x| x * 2.0;

            let output = layer.hook_forward(input.clone(), hook);
            let expected = {
                let x = layer.conv.forward(input.clone());
                let x = layer.norm.forward(x);
                let x = hook(x);
                layer.act.forward(x)
            };
            output.to_data().assert_eq(&expected.to_data(), true);
        }
    }
}
