//! # SegFormer-Burn
//!
//! The all-MLP SegFormer decode head, implemented with the Burn deep learning framework,
//! together with an adversarial domain discriminator for unsupervised domain adaptation.
//!
//! The head consumes the multi-scale feature maps of a hierarchical backbone, projects
//! each selected scale to a shared embedding width, aligns them to the finest resolution
//! and fuses them into per-pixel class logits. The discriminator classifies either the
//! fused map or a raw backbone scale; a gradient reversal layer sits between it and the
//! features so its training signal makes those features domain-invariant.
//!
//! ## Example
//!
//! ```no_run
//! use burn::backend::NdArray;
//! use segformer_burn::{DomainDiscriminatorConfig, SegFormerHeadConfig};
//!
//! let device = Default::default();
//! let config = SegFormerHeadConfig::new(
//!     vec![64, 128, 256, 512],
//!     vec![0, 1, 2, 3],
//!     19,
//!     DomainDiscriminatorConfig::new(256 * 64 * 64, 512),
//! );
//! let head = config.init::<NdArray>(&device)?;
//! # Ok::<(), segformer_burn::SegFormerError>(())
//! ```

mod config;
mod error;
pub mod losses;
pub mod models;

#[cfg(test)]
mod tests;

#[doc(inline)]
pub use config::*;
#[doc(inline)]
pub use error::{SegFormerError, SegFormerResult};
#[doc(inline)]
pub use losses::LogVars;
#[doc(inline)]
pub use models::{
    DomainDiscriminator, DomainDiscriminatorRecord, HeadLosses, SegFormerHead,
    SegFormerHeadRecord, SegFormerOutput,
};

pub use burn_extra_ops::GradientReversalBackend;
