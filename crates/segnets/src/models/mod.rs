//! # Segmentation Model Families

pub mod prefabs;
pub mod segmentation;
pub mod unet;
pub mod uresnet;

pub use segmentation::{SegmentationModel, SegmentationModelConfig};
