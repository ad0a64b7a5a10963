//! # Utility Code

pub mod prefabs;
