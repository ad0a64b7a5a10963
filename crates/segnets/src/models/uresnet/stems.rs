//! # Conv Stems
//!
//! A [`ConvStem`] is a stack of resolution preserving 3x3
//! conv/norm/activation blocks; `UResNet` uses one on the input
//! (``input_channels -> i -> i -> i``) and one on the output
//! (``i -> 16 -> 32 -> 16``).

use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta, square_conv2d_config};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Stem kernel size.
pub const STEM_KERNEL_SIZE: usize = 3;

/// [`ConvStem`] Meta trait.
pub trait ConvStemMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// The output widths of each layer.
    fn widths(&self) -> Vec<usize>;

    /// Number of output channels.
    fn out_channels(&self) -> usize {
        self.widths()
            .last()
            .copied()
            .unwrap_or_else(|| self.in_channels())
    }
}

/// [`ConvStem`] Config.
#[derive(Config, Debug)]
pub struct ConvStemConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// The output widths of each layer.
    pub widths: Vec<usize>,

    /// Whether the convs carry a bias.
    #[config(default = true)]
    pub bias: bool,
}

impl ConvStemMeta for ConvStemConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn widths(&self) -> Vec<usize> {
        self.widths.clone()
    }
}

impl ConvStemConfig {
    /// The per-layer [`CNA2dConfig`]s.
    pub fn layer_configs(&self) -> Vec<CNA2dConfig> {
        let mut in_channels = self.in_channels;
        self.widths
            .iter()
            .map(|&width| {
                let config: CNA2dConfig =
                    square_conv2d_config([in_channels, width], STEM_KERNEL_SIZE, 1, 1, self.bias)
                        .into();
                in_channels = width;
                config
            })
            .collect()
    }

    /// Initialize a [`ConvStem`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvStem<B> {
        ConvStem {
            layers: self
                .layer_configs()
                .into_iter()
                .map(|config| config.init(device))
                .collect(),
            in_channels: self.in_channels,
        }
    }
}

/// Stack of 3x3 conv/norm/activation blocks.
#[derive(Module, Debug)]
pub struct ConvStem<B: Backend> {
    /// The layers, in order.
    pub layers: Vec<CNA2d<B>>,

    in_channels: usize,
}

impl<B: Backend> ConvStemMeta for ConvStem<B> {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn widths(&self) -> Vec<usize> {
        self.layers.iter().map(|layer| layer.out_channels()).collect()
    }
}

impl<B: Backend> ConvStem<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "in_channels", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("in_channels", self.in_channels())]
        );

        let x = self
            .layers
            .iter()
            .fold(input, |x, layer| layer.forward(x));

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
