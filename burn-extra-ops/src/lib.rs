//! Additional operations for the Burn deep learning framework
//!
//! This crate provides operations that are commonly used in deep learning but are not
//! yet available in the core Burn framework: gradient reversal with a custom backward
//! rule, a differentiable bilinear resize without corner alignment, and channel-wise
//! dropout.

use burn::prelude::*;

mod dropout2d;
mod gradient_reversal;
mod resize;

// Convenient re-exports
pub use dropout2d::{Dropout2d, Dropout2dConfig};
pub use gradient_reversal::{
    gradient_reversal, GradientReversal, GradientReversalBackend, GradientReversalConfig,
};
pub use resize::{resize_bilinear, resize_bilinear_like};

/// Additional operations for Burn tensors
pub trait TensorExtraOps<B: GradientReversalBackend, const D: usize> {
    /// Identity in the forward pass; multiplies the gradient by `-alpha` in the backward pass.
    fn gradient_reversal(self, alpha: f32) -> Self;
}

impl<B: GradientReversalBackend, const D: usize> TensorExtraOps<B, D> for Tensor<B, D> {
    fn gradient_reversal(self, alpha: f32) -> Self {
        gradient_reversal(self, alpha)
    }
}

/// Resize operations for `[batch, channels, height, width]` tensors
pub trait TensorResizeOps<B: Backend> {
    /// Bilinear resize to `[height, width]` without corner alignment.
    fn resize_bilinear(self, size: [usize; 2]) -> Self;
}

impl<B: Backend> TensorResizeOps<B> for Tensor<B, 4> {
    fn resize_bilinear(self, size: [usize; 2]) -> Self {
        resize_bilinear(self, size)
    }
}
