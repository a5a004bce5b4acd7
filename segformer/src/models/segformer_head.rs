//! # SegFormer Decode Head
//!
//! The all-MLP decoder of SegFormer, extended with an adversarial domain discriminator.
//!
//! Every selected backbone scale is projected to a shared embedding width, reshaped back
//! into a feature map, resized to the resolution of the first backbone output and
//! concatenated along channels in `in_index` order. A fusion convolution reduces the
//! concatenation back to the embedding width, and a 1x1 convolution predicts the classes.
//!
//! The domain discriminator is evaluated in the same forward pass on the tensor selected
//! by [`AdversarialInput`]. Because its input goes through gradient reversal, its loss
//! trains the discriminator while pushing the upstream features towards domain
//! invariance.

use burn::{
    module::Ignored,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        PaddingConfig2d,
    },
    prelude::*,
    tensor::ElementConversion,
};
use burn_extra_ops::{resize_bilinear, Dropout2d, Dropout2dConfig, GradientReversalBackend};

use super::{
    discriminator::DomainDiscriminator,
    modules::{ConvModule, ConvModuleConfig, Mlp, MlpConfig},
};
use crate::{
    config::{AdversarialInput, SegFormerHeadConfig},
    error::{SegFormerError, SegFormerResult},
    losses::{seg_accuracy, seg_cross_entropy, LogVars},
};

impl SegFormerHeadConfig {
    /// Initializes a new [`SegFormerHead`].
    ///
    /// # Errors
    ///
    /// Returns `Err(SegFormerError::InvalidConfiguration)` if the configuration does not
    /// pass [`SegFormerHeadConfig::validate`].
    pub fn init<B: Backend>(&self, device: &B::Device) -> SegFormerResult<SegFormerHead<B>> {
        self.validate()?;

        let embed_dim = self.decoder_params.embed_dim;
        let fused_channels = self.fused_channels();
        tracing::debug!(
            in_index = ?self.in_index,
            in_channels = ?self.in_channels,
            embed_dim,
            fused_channels,
            "building SegFormer head"
        );

        let linear_c = self
            .in_channels
            .iter()
            .map(|&in_channels| {
                MlpConfig::new()
                    .with_input_dim(in_channels)
                    .with_embed_dim(embed_dim)
                    .init(device)
            })
            .collect();

        let linear_fuse = ConvModuleConfig::new(fused_channels, embed_dim)
            .with_kernel_size(self.decoder_params.conv_kernel_size)
            .with_norm(self.norm_cfg.clone())
            .init(device);

        let dropout = (self.dropout_ratio > 0.0)
            .then(|| Dropout2dConfig::new(self.dropout_ratio).init());

        let linear_pred = Conv2dConfig::new([embed_dim, self.num_classes], [1, 1])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Ok(SegFormerHead {
            in_index: Ignored(self.in_index.clone()),
            embed_dim,
            linear_c,
            linear_fuse,
            dropout,
            linear_pred,
            discriminator: self.adv_discriminator.init(device),
            adversarial_input: Ignored(self.adversarial_input.clone()),
            ignore_index: self.ignore_index,
            loss_weight: self.loss_weight,
            adversarial_loss_weight: self.adversarial_loss_weight,
        })
    }
}

/// Output of [`SegFormerHead::forward`].
#[derive(Debug, Clone)]
pub struct SegFormerOutput<B: Backend> {
    /// Per-pixel class logits at the resolution of the first backbone output.
    pub seg_logits: Tensor<B, 4>,
    /// Domain logits for every sample.
    pub domain_logits: Tensor<B, 2>,
    /// Fused feature map, before dropout.
    pub fused: Tensor<B, 4>,
}

/// Losses of [`SegFormerHead::forward_train`].
#[derive(Debug, Clone)]
pub struct HeadLosses<B: Backend> {
    /// Weighted segmentation cross-entropy.
    pub loss_seg: Tensor<B, 1>,
    /// Weighted domain cross-entropy.
    pub loss_adv: Tensor<B, 1>,
    /// `loss_seg`, `loss_adv`, `acc_seg` and `acc_domain` as plain numbers.
    pub log_vars: LogVars,
}

impl<B: Backend> HeadLosses<B> {
    /// Sum of the segmentation and adversarial losses, the value to backpropagate.
    pub fn total(&self) -> Tensor<B, 1> {
        self.loss_seg.clone() + self.loss_adv.clone()
    }
}

/// SegFormer decode head with an adversarial domain discriminator.
#[derive(Module, Debug)]
pub struct SegFormerHead<B: Backend> {
    in_index: Ignored<Vec<usize>>,
    embed_dim: usize,
    /// One projection per entry of `in_index`, in the same order.
    linear_c: Vec<Mlp<B>>,
    linear_fuse: ConvModule<B>,
    dropout: Option<Dropout2d>,
    linear_pred: Conv2d<B>,
    discriminator: DomainDiscriminator<B>,
    adversarial_input: Ignored<AdversarialInput>,
    ignore_index: usize,
    loss_weight: f32,
    adversarial_loss_weight: f32,
}

impl<B: Backend> SegFormerHead<B> {
    /// The absolute backbone scale indices this head consumes, in concatenation order.
    pub fn in_index(&self) -> &[usize] {
        &self.in_index.0
    }

    /// The projection built for the absolute scale index `scale`.
    pub fn projection(&self, scale: usize) -> Option<&Mlp<B>> {
        self.in_index
            .0
            .iter()
            .position(|&index| index == scale)
            .map(|position| &self.linear_c[position])
    }

    /// The domain discriminator owned by this head.
    pub const fn discriminator(&self) -> &DomainDiscriminator<B> {
        &self.discriminator
    }

    /// Picks the configured scales out of the backbone outputs, in `in_index` order.
    ///
    /// # Errors
    ///
    /// Returns `Err(SegFormerError::MissingScale)` if a configured index is out of range.
    pub fn select_inputs<'a>(
        &self,
        features: &'a [Tensor<B, 4>],
    ) -> SegFormerResult<Vec<&'a Tensor<B, 4>>> {
        self.in_index
            .0
            .iter()
            .map(|&index| {
                features.get(index).ok_or(SegFormerError::MissingScale {
                    index,
                    available: features.len(),
                })
            })
            .collect()
    }

    /// Projects, aligns and fuses the selected scales.
    ///
    /// The target resolution is that of `features[0]`.
    ///
    /// # Shapes
    /// - features: `[batch, in_channels[i], h_i, w_i]` per backbone scale
    /// - output: `[batch, embed_dim, h_0, w_0]`
    ///
    /// # Errors
    ///
    /// Returns `Err(SegFormerError::MissingScale)` for absent scales and
    /// `Err(SegFormerError::ChannelMismatch)` when a feature map's depth differs from its
    /// projection's input width.
    pub fn fuse(&self, features: &[Tensor<B, 4>]) -> SegFormerResult<Tensor<B, 4>> {
        let [_, _, height, width] = features
            .first()
            .ok_or(SegFormerError::MissingScale {
                index: 0,
                available: 0,
            })?
            .dims();
        let selected = self.select_inputs(features)?;

        let mut embeddings = Vec::with_capacity(selected.len());
        for ((&scale, feature), mlp) in self.in_index.0.iter().zip(selected).zip(&self.linear_c) {
            let [batch, channels, h, w] = feature.dims();
            if channels != mlp.input_dim() {
                return Err(SegFormerError::ChannelMismatch {
                    scale,
                    expected: mlp.input_dim(),
                    actual: channels,
                });
            }

            let embedding = mlp
                .forward(feature.clone())
                .swap_dims(1, 2)
                .reshape([batch, self.embed_dim, h, w]);
            embeddings.push(resize_bilinear(embedding, [height, width]));
        }

        Ok(self.linear_fuse.forward(Tensor::cat(embeddings, 1)))
    }

    /// Applies dropout (when configured) and the per-pixel classifier.
    pub fn cls_seg(&self, fused: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = match &self.dropout {
            Some(dropout) => dropout.forward(fused),
            None => fused,
        };
        self.linear_pred.forward(x)
    }

    /// Segmentation logits only; the discriminator is not evaluated.
    ///
    /// # Errors
    ///
    /// See [`SegFormerHead::fuse`].
    pub fn forward_test(&self, features: &[Tensor<B, 4>]) -> SegFormerResult<Tensor<B, 4>> {
        Ok(self.cls_seg(self.fuse(features)?))
    }

    /// Weighted segmentation cross-entropy, ignoring pixels labelled `ignore_index`.
    ///
    /// # Shapes
    /// - seg_logits: `[batch, num_classes, h, w]`
    /// - seg_label: `[batch, height, width]`
    pub fn seg_loss(&self, seg_logits: Tensor<B, 4>, seg_label: Tensor<B, 3, Int>) -> Tensor<B, 1> {
        seg_cross_entropy(seg_logits, seg_label, self.ignore_index) * self.loss_weight
    }

    fn adversarial_features(
        &self,
        features: &[Tensor<B, 4>],
        fused: &Tensor<B, 4>,
    ) -> SegFormerResult<Tensor<B, 4>> {
        match self.adversarial_input.0 {
            AdversarialInput::Fused => Ok(fused.clone()),
            AdversarialInput::Scale(index) => {
                features
                    .get(index)
                    .cloned()
                    .ok_or(SegFormerError::MissingScale {
                        index,
                        available: features.len(),
                    })
            }
        }
    }
}

impl<B: GradientReversalBackend> SegFormerHead<B> {
    /// Segmentation and domain logits in one pass.
    ///
    /// # Shapes
    /// - features: `[batch, in_channels[i], h_i, w_i]` per backbone scale
    /// - seg_logits: `[batch, num_classes, h_0, w_0]`
    /// - domain_logits: `[batch, classes]`
    ///
    /// # Errors
    ///
    /// See [`SegFormerHead::fuse`]; also `Err(SegFormerError::MissingScale)` when the
    /// discriminator reads a backbone scale that is absent.
    pub fn forward(&self, features: &[Tensor<B, 4>]) -> SegFormerResult<SegFormerOutput<B>> {
        let fused = self.fuse(features)?;
        let domain_logits = self
            .discriminator
            .classify(self.adversarial_features(features, &fused)?);
        let seg_logits = self.cls_seg(fused.clone());

        Ok(SegFormerOutput {
            seg_logits,
            domain_logits,
            fused,
        })
    }

    /// Forward pass with segmentation and adversarial losses.
    ///
    /// # Shapes
    /// - seg_label: `[batch, height, width]`, values in `0..num_classes` or `ignore_index`
    /// - domain_labels: `[batch]`, values 0 or 1
    ///
    /// # Errors
    ///
    /// See [`SegFormerHead::forward`]; also `Err(SegFormerError::InvalidTensorShape)` if the
    /// label batch differs from the feature batch.
    pub fn forward_train(
        &self,
        features: &[Tensor<B, 4>],
        seg_label: Tensor<B, 3, Int>,
        domain_labels: Tensor<B, 1, Int>,
    ) -> SegFormerResult<HeadLosses<B>> {
        let fused = self.fuse(features)?;
        let [batch, _, _, _] = fused.dims();
        let [label_batch, height, width] = seg_label.dims();
        if label_batch != batch {
            return Err(SegFormerError::InvalidTensorShape {
                expected: format!("[{batch}, H, W]"),
                actual: format!("[{label_batch}, {height}, {width}]"),
            });
        }

        let (loss_adv, _) = self.discriminator.train_step(
            self.adversarial_features(features, &fused)?,
            domain_labels.clone(),
        );
        let loss_adv = loss_adv * self.adversarial_loss_weight;
        let seg_logits = self.cls_seg(fused.clone());
        let loss_seg = self.seg_loss(seg_logits.clone(), seg_label.clone());

        let domain_logits = self
            .discriminator
            .classify(self.adversarial_features(features, &fused)?.detach());

        let mut log_vars = LogVars::new();
        log_vars.insert(
            "loss_seg".to_string(),
            loss_seg.clone().into_scalar().elem::<f64>(),
        );
        log_vars.insert(
            "loss_adv".to_string(),
            loss_adv.clone().into_scalar().elem::<f64>(),
        );
        log_vars.insert(
            "acc_seg".to_string(),
            seg_accuracy(seg_logits.detach(), seg_label, self.ignore_index),
        );
        log_vars.insert(
            "acc_domain".to_string(),
            DomainDiscriminator::accuracy(domain_logits.detach(), domain_labels),
        );

        Ok(HeadLosses {
            loss_seg,
            loss_adv,
            log_vars,
        })
    }
}
