//! # Miscellaneous Blocks
pub mod cna;
pub mod conv_norm;
pub mod double_conv;
