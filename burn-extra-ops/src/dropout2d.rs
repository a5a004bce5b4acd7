//! # Channel-wise Dropout
//!
//! Implements `Dropout2d`: during training, entire feature maps are zeroed with
//! probability `prob`, and the surviving maps are scaled by `1 / (1 - prob)`.
//! The mask is drawn per (sample, channel) and broadcast over the spatial dimensions.
//!
//! Like Burn's own `Dropout`, the module is only active when the backend tracks
//! gradients; on inference backends it returns its input unchanged.

use burn::{prelude::*, tensor::Distribution};

/// Configuration for the [`Dropout2d`] module.
#[derive(Config, Debug)]
pub struct Dropout2dConfig {
    /// The probability of zeroing a feature map.
    pub prob: f64,
}

impl Dropout2dConfig {
    /// Initializes a new [`Dropout2d`] module.
    ///
    /// # Panics
    ///
    /// Panics if `prob` is outside `[0, 1)`.
    pub fn init(&self) -> Dropout2d {
        assert!(
            (0.0..1.0).contains(&self.prob),
            "dropout probability should be in [0, 1), got {}",
            self.prob
        );
        Dropout2d { prob: self.prob }
    }
}

/// Channel-wise dropout module.
#[derive(Module, Clone, Debug)]
pub struct Dropout2d {
    prob: f64,
}

impl Dropout2d {
    /// The probability of zeroing a feature map.
    pub const fn prob(&self) -> f64 {
        self.prob
    }

    /// Applies channel-wise dropout.
    ///
    /// # Shapes
    /// - input: `[batch_size, channels, height, width]`
    /// - output: `[batch_size, channels, height, width]`
    pub fn forward<B: Backend>(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        if !B::ad_enabled() || self.prob == 0.0 {
            return x;
        }
        let keep_prob = 1.0 - self.prob;
        let [batch_size, channels, _, _] = x.dims();

        let mask = Tensor::random(
            [batch_size, channels, 1, 1],
            Distribution::Bernoulli(keep_prob),
            &x.device(),
        );

        x * mask / keep_prob
    }
}
