//! Utility functions shared across mojiraster

pub mod color;

pub use color::{blend_pixel, parse_hex_color, to_hex};
