//! # Convolution Layers
pub mod conv_transpose_to_size;
