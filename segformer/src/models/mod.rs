//! # Model Architectures
//!
//! This module aggregates the components of the SegFormer decode head:
//!
//! - `modules`: Building blocks, the per-scale MLP projection and the fusion `ConvModule`.
//! - `discriminator`: The domain classifier trained through gradient reversal.
//! - `segformer_head`: The decode head that wires projection, fusion, classification and
//!   the discriminator together.

pub mod discriminator;
pub mod modules;
pub mod segformer_head;

pub use discriminator::{DomainDiscriminator, DomainDiscriminatorRecord};
pub use segformer_head::{HeadLosses, SegFormerHead, SegFormerHeadRecord, SegFormerOutput};
