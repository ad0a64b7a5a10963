//! # Sized Transposed Convolution
//!
//! A stride ``s`` transposed convolution maps ``s`` distinct input sizes
//! onto the same output size range; so the output size alone is ambiguous.
//! [`ConvTranspose2dToSize::forward_to_size`] resolves this per call
//! by solving for the output padding which hits a requested target size,
//! matching the ``output_size`` argument of the torch ``ConvTranspose2d``.
//!
//! The weight layout is ``[in_channels, out_channels, kernel_height, kernel_width]``,
//! matching ``burn::nn::conv::ConvTranspose2d``.

use crate::compat::conv_shape::{
    conv_transpose1d_output_size, maybe_conv_transpose1d_padding_out,
};
use crate::layers::init::conv_initializer;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::{Module, Param};
use burn::nn::Initializer;
use burn::prelude::{Backend, Tensor};
use burn::tensor::module::conv_transpose2d;
use burn::tensor::ops::ConvTransposeOptions;

/// [`ConvTranspose2dToSize`] Meta trait.
pub trait ConvTranspose2dToSizeMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Kernel size.
    fn kernel_size(&self) -> [usize; 2];

    /// Stride.
    fn stride(&self) -> [usize; 2];

    /// Padding.
    fn padding(&self) -> [usize; 2];

    /// Dilation.
    fn dilation(&self) -> [usize; 2];

    /// The output resolution for a given input resolution and output padding.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
        padding_out: [usize; 2],
    ) -> [usize; 2] {
        let kernel_size = self.kernel_size();
        let stride = self.stride();
        let padding = self.padding();
        let dilation = self.dilation();
        [0, 1].map(|i| {
            conv_transpose1d_output_size(
                input_resolution[i],
                kernel_size[i],
                stride[i],
                padding[i],
                padding_out[i],
                dilation[i],
            )
        })
    }

    /// Solve for the output padding which produces `target_resolution`.
    ///
    /// # Panics
    ///
    /// If the target is not reachable from the input resolution.
    fn expect_padding_out(
        &self,
        input_resolution: [usize; 2],
        target_resolution: [usize; 2],
    ) -> [usize; 2] {
        let kernel_size = self.kernel_size();
        let stride = self.stride();
        let padding = self.padding();
        let dilation = self.dilation();
        [0, 1].map(|i| {
            match maybe_conv_transpose1d_padding_out(
                input_resolution[i],
                target_resolution[i],
                kernel_size[i],
                stride[i],
                padding[i],
                dilation[i],
            ) {
                Some(padding_out) => padding_out,
                None => panic!(
                    "Output resolution {target_resolution:?} is not reachable from {input_resolution:?} with kernel_size:{kernel_size:?} stride:{stride:?} padding:{padding:?}"
                ),
            }
        })
    }
}

/// [`ConvTranspose2dToSize`] Config.
#[derive(Config, Debug)]
pub struct ConvTranspose2dToSizeConfig {
    /// ``[in_channels, out_channels]``.
    pub channels: [usize; 2],

    /// Kernel size.
    pub kernel_size: [usize; 2],

    /// Stride.
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],

    /// Padding.
    #[config(default = "[0, 0]")]
    pub padding: [usize; 2],

    /// Dilation.
    #[config(default = "[1, 1]")]
    pub dilation: [usize; 2],

    /// Whether the layer has a bias.
    #[config(default = true)]
    pub bias: bool,
}

impl ConvTranspose2dToSizeMeta for ConvTranspose2dToSizeConfig {
    fn in_channels(&self) -> usize {
        self.channels[0]
    }

    fn out_channels(&self) -> usize {
        self.channels[1]
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.kernel_size
    }

    fn stride(&self) -> [usize; 2] {
        self.stride
    }

    fn padding(&self) -> [usize; 2] {
        self.padding
    }

    fn dilation(&self) -> [usize; 2] {
        self.dilation
    }
}

impl ConvTranspose2dToSizeConfig {
    /// Initialize a [`ConvTranspose2dToSize`].
    ///
    /// Weights follow [`conv_initializer`]; the bias starts at zero.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> ConvTranspose2dToSize<B> {
        let [in_channels, out_channels] = self.channels;
        let shape = [
            in_channels,
            out_channels,
            self.kernel_size[0],
            self.kernel_size[1],
        ];

        ConvTranspose2dToSize {
            weight: conv_initializer(self.kernel_size, out_channels).init(shape, device),
            bias: if self.bias {
                Some(Initializer::Zeros.init([out_channels], device))
            } else {
                None
            },
            kernel_size: self.kernel_size,
            stride: self.stride,
            padding: self.padding,
            dilation: self.dilation,
        }
    }
}

/// Transposed convolution with a per-call target output size.
#[derive(Module, Debug)]
pub struct ConvTranspose2dToSize<B: Backend> {
    /// ``[in_channels, out_channels, kernel_height, kernel_width]``.
    pub weight: Param<Tensor<B, 4>>,

    /// ``[out_channels]``.
    pub bias: Option<Param<Tensor<B, 1>>>,

    /// Kernel size.
    pub kernel_size: [usize; 2],

    /// Stride.
    pub stride: [usize; 2],

    /// Padding.
    pub padding: [usize; 2],

    /// Dilation.
    pub dilation: [usize; 2],
}

impl<B: Backend> ConvTranspose2dToSizeMeta for ConvTranspose2dToSize<B> {
    fn in_channels(&self) -> usize {
        self.weight.shape().dims[0]
    }

    fn out_channels(&self) -> usize {
        self.weight.shape().dims[1]
    }

    fn kernel_size(&self) -> [usize; 2] {
        self.kernel_size
    }

    fn stride(&self) -> [usize; 2] {
        self.stride
    }

    fn padding(&self) -> [usize; 2] {
        self.padding
    }

    fn dilation(&self) -> [usize; 2] {
        self.dilation
    }
}

impl<B: Backend> ConvTranspose2dToSize<B> {
    /// Forward Pass, to an explicit output resolution.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    /// - `output_resolution`: ``[out_height, out_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If `output_resolution` is not reachable from the input resolution.
    pub fn forward_to_size(
        &self,
        input: Tensor<B, 4>,
        output_resolution: [usize; 2],
    ) -> Tensor<B, 4> {
        let [_, _, in_height, in_width] = input.dims();
        let padding_out = self.expect_padding_out([in_height, in_width], output_resolution);
        self.forward_with_padding_out(input, padding_out)
    }

    fn forward_with_padding_out(
        &self,
        input: Tensor<B, 4>,
        padding_out: [usize; 2],
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] =
            self.output_resolution([in_height, in_width], padding_out);

        let x = conv_transpose2d(
            input,
            self.weight.val(),
            self.bias.as_ref().map(|bias| bias.val()),
            ConvTransposeOptions::new(self.stride, self.padding, padding_out, self.dilation, 1),
        );

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
