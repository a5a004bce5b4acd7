//! Building blocks of the SegFormer head.

mod conv_module;
mod mlp;

pub use conv_module::*;
pub use mlp::*;
