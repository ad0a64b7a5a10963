//! # Bottleneck Block for `UResNet`
//!
//! [`Bottleneck`] is the residual unit of the `UResNet` encoder and decoder:
//!
//! ```text
//! residual = BN(conv1x1(ReLU(BN(conv3x3/s(ReLU(BN(conv1x1(x))))))))
//! bypass   = x                    ; stride == 1 and in_planes == planes
//!          = conv1x1/s(x)         ; otherwise
//! out      = ReLU(bypass + residual)
//! ```
//!
//! Unlike the classic `ResNet` bottleneck, the block does not expand
//! channels; all three convs produce `planes` channels.
//!
//! [`BottleneckConfig`] implements [`Config`], and provides
//! [`BottleneckConfig::init`] to initialize a [`Bottleneck`].

use crate::compat::conv_shape::expect_conv_output_shape;
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta, square_conv2d_config};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::nn::conv::Conv2d;
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`Bottleneck`] Meta trait.
pub trait BottleneckMeta {
    /// The number of input feature planes.
    fn in_planes(&self) -> usize;

    /// The number of output feature planes.
    fn planes(&self) -> usize;

    /// The stride of the 3x3 conv, and of the projection bypass.
    fn stride(&self) -> usize;

    /// Whether the bypass needs a projection conv.
    fn has_shortcut(&self) -> bool {
        self.stride() > 1 || self.in_planes() != self.planes()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// ``out = ceil(in / stride)``; odd dimensions round up.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let stride = self.stride();
        expect_conv_output_shape(input_resolution, [3, 3], [stride, stride], [1, 1], [1, 1])
    }
}

/// [`Bottleneck`] Config.
///
/// Implements [`BottleneckMeta`].
#[derive(Config, Debug)]
pub struct BottleneckConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The number of output feature planes.
    pub planes: usize,

    /// The stride of the 3x3 conv.
    #[config(default = 1)]
    pub stride: usize,
}

impl BottleneckMeta for BottleneckConfig {
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

impl BottleneckConfig {
    /// Initialize a [`Bottleneck`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> Bottleneck<B> {
        let in_planes = self.in_planes;
        let planes = self.planes;
        let stride = self.stride;

        let cna1: CNA2dConfig = square_conv2d_config([in_planes, planes], 1, 1, 0, false).into();
        let cna2: CNA2dConfig = square_conv2d_config([planes, planes], 3, stride, 1, false).into();
        let cna3: CNA2dConfig = square_conv2d_config([planes, planes], 1, 1, 0, false).into();

        Bottleneck {
            shortcut: if self.has_shortcut() {
                Some(square_conv2d_config([in_planes, planes], 1, stride, 0, false).init(device))
            } else {
                None
            },
            cna1: cna1.init(device),
            cna2: cna2.init(device),
            cna3: cna3.init(device),
        }
    }
}

/// Bottleneck residual block.
///
/// Implements [`BottleneckMeta`].
#[derive(Module, Debug)]
pub struct Bottleneck<B: Backend> {
    /// Optional 1x1 projection bypass.
    pub shortcut: Option<Conv2d<B>>,

    /// 1x1 reduction.
    pub cna1: CNA2d<B>,
    /// 3x3 (strided) conv.
    pub cna2: CNA2d<B>,
    /// 1x1 projection; the bypass is added before its activation.
    pub cna3: CNA2d<B>,
}

impl<B: Backend> BottleneckMeta for Bottleneck<B> {
    fn in_planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn planes(&self) -> usize {
        self.cna3.out_channels()
    }

    fn stride(&self) -> usize {
        self.cna2.stride()[0]
    }
}

impl<B: Backend> Bottleneck<B> {
    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_planes, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, planes, ceil(in_height/stride), ceil(in_width/stride)]``
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

        let bypass = match &self.shortcut {
            Some(shortcut) => shortcut.forward(input.clone()),
            None => input.clone(),
        };

        let x = self.cna1.forward(input);
        let x = self.cna2.forward(x);
        let x = self.cna3.hook_forward(x, |x| bypass + x);

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
