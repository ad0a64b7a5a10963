//! # Compat
//!
//! Shape arithmetic which ``burn`` does not (yet) expose publicly.

pub mod conv_shape;
