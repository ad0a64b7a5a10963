//! # `DoubleConv` Block
//!
//! ``(conv3x3 => BN => ReLU) * 2``; the unit block of `UNet`.
//!
//! Both convs pad by 1, so the block preserves resolution.

use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta, square_conv2d_config};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`DoubleConv`] Meta trait.
pub trait DoubleConvMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;
}

/// [`DoubleConv`] Config.
#[derive(Config, Debug)]
pub struct DoubleConvConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Whether the convs carry a bias.
    #[config(default = true)]
    pub bias: bool,
}

impl DoubleConvMeta for DoubleConvConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl DoubleConvConfig {
    /// Initialize a [`DoubleConv`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DoubleConv<B> {
        let cna1: CNA2dConfig =
            square_conv2d_config([self.in_channels, self.out_channels], 3, 1, 1, self.bias).into();
        let cna2: CNA2dConfig =
            square_conv2d_config([self.out_channels, self.out_channels], 3, 1, 1, self.bias)
                .into();

        DoubleConv {
            cna1: cna1.init(device),
            cna2: cna2.init(device),
        }
    }
}

/// Two stacked conv/norm/act blocks.
#[derive(Module, Debug)]
pub struct DoubleConv<B: Backend> {
    /// First Conv/Norm/Act Block.
    pub cna1: CNA2d<B>,

    /// Second Conv/Norm/Act Block.
    pub cna2: CNA2d<B>,
}

impl<B: Backend> DoubleConvMeta for DoubleConv<B> {
    fn in_channels(&self) -> usize {
        self.cna1.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.cna2.out_channels()
    }
}

impl<B: Backend> DoubleConv<B> {
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

        let x = self.cna1.forward(input);
        let x = self.cna2.forward(x);

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
