#![warn(missing_docs)]
//!# segnets - `UNet` and `UResNet` segmentation models for ``burn``
//!
//! ## Notable Components
//!
//! * [`compat`] - shape arithmetic not yet provided by ``burn``.
//!   * [`compat::conv_shape`] - conv, transposed conv, and padding size math.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::init`] - the ``sqrt(2/n)`` conv weight initializer.
//!   * [`layers::blocks`] - miscellaneous blocks.
//!     * [`layers::blocks::cna`] - ``Conv2d + BatchNorm2d + ReLU`` block.
//!     * [`layers::blocks::conv_norm`] - ``Conv2d + BatchNorm2d`` block.
//!     * [`layers::blocks::double_conv`] - two stacked 3x3 ``CNA2d`` blocks.
//!   * [`layers::conv`] - convolution layers.
//!     * [`layers::conv::conv_transpose_to_size`] - transposed conv with a target size.
//! * [`models`] - complete model families.
//!   * [`models::unet`] - `UNet`
//!   * [`models::uresnet`] - `UResNet`
//!   * [`models::segmentation`] - family wrapper config and module.
//!   * [`models::prefabs`] - well-known configs.
//! * [`utility`] - prefab tables.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;

#[cfg(test)]
pub(crate) mod testing;

pub mod layers;

pub mod models;
pub mod utility;
