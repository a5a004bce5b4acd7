//! Enumeration types for the SegFormer head configuration.

use burn::prelude::*;

/// Normalization applied after the fusion convolution.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum NormLayer {
    /// No normalization; the fusion convolution carries a bias instead.
    None,
    /// Batch normalization over the embedding channels.
    BatchNorm,
    /// Group normalization with the given number of groups.
    GroupNorm(usize),
}

/// Which tensor the domain discriminator classifies during a forward pass.
#[derive(Config, Debug, PartialEq, Eq)]
pub enum AdversarialInput {
    /// The fused feature map, after the fusion convolution and before dropout.
    Fused,
    /// The raw backbone feature map at the given absolute scale index.
    Scale(usize),
}
