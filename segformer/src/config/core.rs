//! Core configuration structures for the SegFormer head.
//!
//! These structs replace a registry lookup by name: a head is described entirely by a
//! [`SegFormerHeadConfig`], which can be built in code with the generated `with_*`
//! setters or loaded from JSON with [`Config::load`].

use std::collections::HashSet;

use burn::{nn::Initializer, prelude::*};

use super::enums::*;
use crate::error::{SegFormerError, SegFormerResult};

/// Configuration for the SegFormer decode head and its domain discriminator.
#[derive(Config, Debug)]
pub struct SegFormerHeadConfig {
    /// Channel depth of each selected backbone scale, aligned with `in_index`.
    pub in_channels: Vec<usize>,
    /// Absolute indices of the backbone outputs that feed the head.
    pub in_index: Vec<usize>,
    /// Number of segmentation classes.
    pub num_classes: usize,
    /// Embedding width and fusion kernel.
    #[config(default = "DecoderParams::new()")]
    pub decoder_params: DecoderParams,
    /// Domain discriminator built alongside the head.
    pub adv_discriminator: DomainDiscriminatorConfig,
    /// Normalization applied by the fusion convolution.
    #[config(default = "NormLayer::BatchNorm")]
    pub norm_cfg: NormLayer,
    /// Channel dropout before the classifier. `0.0` disables the dropout module.
    #[config(default = 0.1)]
    pub dropout_ratio: f64,
    /// Label value excluded from the segmentation loss and accuracy.
    #[config(default = 255)]
    pub ignore_index: usize,
    /// Tensor the discriminator classifies during a forward pass.
    #[config(default = "AdversarialInput::Fused")]
    pub adversarial_input: AdversarialInput,
    /// Weight of the segmentation loss.
    #[config(default = 1.0)]
    pub loss_weight: f32,
    /// Weight of the discriminator's own cross-entropy loss.
    #[config(default = 1.0)]
    pub adversarial_loss_weight: f32,
}

/// Decoder-specific parameters.
#[derive(Config, Debug)]
pub struct DecoderParams {
    /// Shared embedding width of every projected scale.
    #[config(default = 256)]
    pub embed_dim: usize,
    /// Kernel size of the fusion convolution.
    #[config(default = 1)]
    pub conv_kernel_size: usize,
}

/// Configuration for the adversarial domain discriminator.
#[derive(Config, Debug)]
pub struct DomainDiscriminatorConfig {
    /// Number of features per sample after flattening the input.
    pub in_features: usize,
    /// Width of the hidden layer.
    pub hidden_features: usize,
    /// Number of domains. Only 2 is meaningful with 0/1 domain labels.
    #[config(default = 2)]
    pub classes: usize,
    /// Gradient reversal scale.
    #[config(default = 1.0)]
    pub alpha: f64,
    /// Initializer for both linear layers. `None` keeps Burn's default.
    #[config(default = "None")]
    pub init_cfg: Option<Initializer>,
}

impl SegFormerHeadConfig {
    /// Number of channels entering the fusion convolution.
    #[must_use]
    pub fn fused_channels(&self) -> usize {
        self.decoder_params.embed_dim * self.in_index.len()
    }

    /// Validate the configuration and return appropriate errors for invalid settings.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegFormerError::InvalidConfiguration)` if any validation rule is violated.
    pub fn validate(&self) -> SegFormerResult<()> {
        // 1. At least one scale to concatenate
        if self.in_index.is_empty() {
            return Err(SegFormerError::InvalidConfiguration {
                reason: "in_index must select at least one backbone scale".to_string(),
            });
        }

        // 2. One channel count per selected scale
        if self.in_channels.len() != self.in_index.len() {
            return Err(SegFormerError::InvalidConfiguration {
                reason: format!(
                    "in_channels has {} entries but in_index selects {} scales",
                    self.in_channels.len(),
                    self.in_index.len()
                ),
            });
        }

        // 3. Scale indices key the projections, so they must be unique
        let mut seen = HashSet::with_capacity(self.in_index.len());
        if let Some(index) = self.in_index.iter().find(|&&index| !seen.insert(index)) {
            return Err(SegFormerError::InvalidConfiguration {
                reason: format!("Scale index {index} is selected more than once"),
            });
        }

        if let Some(position) = self.in_channels.iter().position(|&c| c == 0) {
            return Err(SegFormerError::InvalidConfiguration {
                reason: format!(
                    "Scale {} has zero input channels",
                    self.in_index[position]
                ),
            });
        }

        if self.num_classes == 0 {
            return Err(SegFormerError::InvalidConfiguration {
                reason: "num_classes must be positive".to_string(),
            });
        }

        if !(0.0..1.0).contains(&self.dropout_ratio) {
            return Err(SegFormerError::InvalidConfiguration {
                reason: format!("dropout_ratio must be in [0, 1), got {}", self.dropout_ratio),
            });
        }

        self.decoder_params.validate()?;

        if let NormLayer::GroupNorm(groups) = self.norm_cfg {
            if groups == 0 || self.decoder_params.embed_dim % groups != 0 {
                return Err(SegFormerError::InvalidConfiguration {
                    reason: format!(
                        "GroupNorm groups ({groups}) must divide embed_dim ({})",
                        self.decoder_params.embed_dim
                    ),
                });
            }
        }

        self.adv_discriminator.validate()
    }
}

impl DecoderParams {
    /// Padding that keeps the fused map at the target resolution.
    #[must_use]
    pub const fn padding(&self) -> usize {
        if self.conv_kernel_size == 1 {
            0
        } else {
            self.conv_kernel_size / 2
        }
    }

    /// Validate the decoder parameters.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegFormerError::InvalidConfiguration)` for a zero embedding width or a
    /// kernel size that cannot preserve the spatial size.
    pub fn validate(&self) -> SegFormerResult<()> {
        if self.embed_dim == 0 {
            return Err(SegFormerError::InvalidConfiguration {
                reason: "embed_dim must be positive".to_string(),
            });
        }

        // An even kernel with `k / 2` padding grows the map by one pixel.
        if self.conv_kernel_size == 0 || self.conv_kernel_size % 2 == 0 {
            return Err(SegFormerError::InvalidConfiguration {
                reason: format!(
                    "conv_kernel_size must be odd, got {}",
                    self.conv_kernel_size
                ),
            });
        }

        Ok(())
    }
}

impl DomainDiscriminatorConfig {
    /// Validate the discriminator configuration.
    ///
    /// Any positive `classes` is accepted. Domain labels only span {0, 1}, so with more
    /// than 2 classes the extra outputs are never targeted, and with 1 class a label of 1
    /// has no output to select; `train_step` is only meaningful with 2.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegFormerError::InvalidConfiguration)` for empty layers or zero classes.
    pub fn validate(&self) -> SegFormerResult<()> {
        if self.in_features == 0 || self.hidden_features == 0 {
            return Err(SegFormerError::InvalidConfiguration {
                reason: format!(
                    "Discriminator layers must be non-empty, got in_features={} hidden_features={}",
                    self.in_features, self.hidden_features
                ),
            });
        }

        if self.classes == 0 {
            return Err(SegFormerError::InvalidConfiguration {
                reason: "Discriminator needs at least one class".to_string(),
            });
        }

        Ok(())
    }
}
