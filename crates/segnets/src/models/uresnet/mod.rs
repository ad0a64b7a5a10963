//! # `UResNet`
//!
//! The residual `UResNet` segmentation model:
//! * [`uresnet_model::UResNet`] - the assembled model.
//! * [`bottleneck::Bottleneck`] - the residual unit.
//! * [`basic_block::BasicBlock`] - the lighter two-conv residual unit.
//! * [`double_resnet::DoubleResNet`] - strided encoder stage.
//! * [`conv_transpose_layer::ConvTransposeLayer`] - sized decoder stage.
//! * [`stems::ConvStem`] - input and output conv stacks.

pub mod basic_block;
pub mod bottleneck;
pub mod conv_transpose_layer;
pub mod double_resnet;
pub mod stems;
pub mod uresnet_model;

pub use uresnet_model::{UResNet, UResNetConfig, UResNetMeta};
