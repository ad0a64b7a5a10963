//! # `DoubleResNet` Encoder Stage
//!
//! Two chained [`Bottleneck`]s; the first carries the stride
//! and the channel change, the second refines at the output resolution.

use crate::models::uresnet::bottleneck::{Bottleneck, BottleneckConfig, BottleneckMeta};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::prelude::{Backend, Config, Module, Tensor};

/// [`DoubleResNet`] Config.
///
/// Implements [`BottleneckMeta`]; the pair behaves as a single wider block.
#[derive(Config, Debug)]
pub struct DoubleResNetConfig {
    /// The number of input feature planes.
    pub in_planes: usize,

    /// The number of output feature planes.
    pub planes: usize,

    /// The stride of the first block.
    #[config(default = 1)]
    pub stride: usize,
}

impl BottleneckMeta for DoubleResNetConfig {
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

impl DoubleResNetConfig {
    /// Initialize a [`DoubleResNet`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DoubleResNet<B> {
        DoubleResNet {
            res1: BottleneckConfig::new(self.in_planes, self.planes)
                .with_stride(self.stride)
                .init(device),
            res2: BottleneckConfig::new(self.planes, self.planes).init(device),
        }
    }
}

/// Two stacked bottleneck blocks.
#[derive(Module, Debug)]
pub struct DoubleResNet<B: Backend> {
    /// Strided block.
    pub res1: Bottleneck<B>,

    /// Refinement block.
    pub res2: Bottleneck<B>,
}

impl<B: Backend> BottleneckMeta for DoubleResNet<B> {
    fn in_planes(&self) -> usize {
        self.res1.in_planes()
    }

    fn planes(&self) -> usize {
        self.res2.planes()
    }

    fn stride(&self) -> usize {
        self.res1.stride()
    }
}

impl<B: Backend> DoubleResNet<B> {
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

        let x = self.res1.forward(input);
        let x = self.res2.forward(x);

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
