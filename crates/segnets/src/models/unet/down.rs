//! # `UNet` Encoder Stage
//!
//! [`Down`] halves the resolution with a 2x2 max-pool, then deepens channels
//! with a [`DoubleConv`]. Odd dimensions round down.

use crate::compat::conv_shape::expect_conv_output_shape;
use crate::layers::blocks::double_conv::{DoubleConv, DoubleConvConfig, DoubleConvMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::PaddingConfig2d;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Pooling window and stride.
pub const POOL_SIZE: usize = 2;

/// [`Down`] Meta trait.
pub trait DownMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// ``out = floor(in / 2)``
    ///
    /// # Panics
    ///
    /// If either input dimension is smaller than the pool window.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        expect_conv_output_shape(
            input_resolution,
            [POOL_SIZE, POOL_SIZE],
            [POOL_SIZE, POOL_SIZE],
            [0, 0],
            [1, 1],
        )
    }
}

/// [`Down`] Config.
#[derive(Config, Debug)]
pub struct DownConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,
}

impl DownMeta for DownConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }
}

impl DownConfig {
    /// Initialize a [`Down`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Down<B> {
        Down {
            pool: MaxPool2dConfig::new([POOL_SIZE, POOL_SIZE])
                .with_strides([POOL_SIZE, POOL_SIZE])
                .with_padding(PaddingConfig2d::Valid)
                .init(),
            conv: DoubleConvConfig::new(self.in_channels, self.out_channels).init(device),
        }
    }
}

/// Max-pool + double conv encoder stage.
#[derive(Module, Debug)]
pub struct Down<B: Backend> {
    /// 2x2 stride 2 max-pool.
    pub pool: MaxPool2d,

    /// Channel deepening block.
    pub conv: DoubleConv<B>,
}

impl<B: Backend> DownMeta for Down<B> {
    fn in_channels(&self) -> usize {
        self.conv.in_channels()
    }

    fn out_channels(&self) -> usize {
        self.conv.out_channels()
    }
}

impl<B: Backend> Down<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, floor(in_height/2), floor(in_width/2)]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.pool.forward(input);
        let x = self.conv.forward(x);

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
