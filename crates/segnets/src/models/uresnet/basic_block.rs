//! # Basic Block
//!
//! [`BasicBlock`] is the two-conv `ResNet` residual unit:
//!
//! ```text
//! out = ReLU(BN(conv3x3(ReLU(BN(conv3x3/s(x))))) + downsample(x))
//! ```
//!
//! where `downsample` is the identity, or a 1x1 conv/norm projection when
//! the stride or the channel count changes.
//!
//! The `UResNet` assembly uses [`super::bottleneck::Bottleneck`];
//! [`BasicBlock`] is provided as the lighter alternative unit.

use crate::compat::conv_shape::expect_conv_output_shape;
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta, square_conv2d_config};
use crate::layers::blocks::conv_norm::{ConvNorm2d, ConvNorm2dConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`BasicBlock`] Meta trait.
pub trait BasicBlockMeta {
    /// The size of the in channels dimension.
    fn in_planes(&self) -> usize;

    /// The size of the out channels dimension.
    fn planes(&self) -> usize;

    /// The stride of the first conv.
    ///
    /// Affects downsample behavior.
    fn stride(&self) -> usize;

    /// Whether the residual needs a projection.
    fn has_downsample(&self) -> bool {
        self.stride() != 1 || self.in_planes() != self.planes()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// ``out = ceil(in / stride)``
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let stride = self.stride();
        expect_conv_output_shape(input_resolution, [3, 3], [stride, stride], [1, 1], [1, 1])
    }
}

/// [`BasicBlock`] Config.
///
/// Implements [`BasicBlockMeta`].
#[derive(Config, Debug)]
pub struct BasicBlockConfig {
    /// The size of the in channels dimension.
    pub in_planes: usize,

    /// The size of the out channels dimension.
    pub planes: usize,

    /// The stride of the first conv.
    #[config(default = 1)]
    pub stride: usize,
}

impl BasicBlockMeta for BasicBlockConfig {
    fn in_planes(&self) -> usize {
        self.in_planes
    }

    fn planes(&self) -> usize {
        self.planes
    }

    fn stride(&self) -> usize {
        self.stride
    }
}

impl BasicBlockConfig {
    /// Initialize a [`BasicBlock`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> BasicBlock<B> {
        let in_planes = self.in_planes;
        let planes = self.planes;
        let stride = self.stride;

        let downsample = if self.has_downsample() {
            let config: ConvNorm2dConfig =
                square_conv2d_config([in_planes, planes], 1, stride, 0, false).into();
            Some(config.init(device))
        } else {
            None
        };

        let cna1: CNA2dConfig = square_conv2d_config([in_planes, planes], 3, stride, 1, false).into();
        let cna2: CNA2dConfig = square_conv2d_config([planes, planes], 3, 1, 1, false).into();

        BasicBlock {
            downsample,
            cna1: cna1.init(device),
            cna2: cna2.init(device),
        }
    }
}

/// Basic residual block.
///
/// Implements [`BasicBlockMeta`].
#[derive(Module, Debug)]
pub struct BasicBlock<B: Backend> {
    /// Optional downsample projection; for the residual connection.
    pub downsample: Option<ConvNorm2d<B>>,

    /// First Conv/Norm/Act Block.
    pub cna1: CNA2d<B>,
    /// Second Conv/Norm/Act Block.
    pub cna2: CNA2d<B>,
}

impl<B: Backend> BasicBlockMeta for BasicBlock<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna2.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna1.stride()[0]
    }
}

impl<B: Backend> BasicBlock<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// A ``[batch, planes, out_height, out_width]`` tensor.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_planes", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_planes", self.in_planes())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let identity = match &self.downsample {
            Some(downsample) => downsample.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.cna1.forward(input);
        let x = self.cna2.hook_forward(x, |x| x + identity);

        assert_shape_contract_periodically!(
            ["batch", "planes", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("planes", self.planes()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}
