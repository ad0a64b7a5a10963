//! # `UNet`
//!
//! The classic `UNet` segmentation model:
//! * [`unet_model::UNet`] - the assembled model.
//! * [`down::Down`] - max-pool encoder stage.
//! * [`up::Up`] - upsample/pad/concat decoder stage.

pub mod down;
pub mod unet_model;
pub mod up;

pub use unet_model::{UNet, UNetConfig, UNetMeta};
