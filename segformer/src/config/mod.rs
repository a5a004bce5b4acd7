//! Configuration module for the SegFormer head.
//!
//! This module provides configuration structures and enums for the decode head.
//! It is organized into two main submodules:
//! - `core`: Contains the main configuration structures
//! - `enums`: Contains all enumeration types used in configurations

mod core;
mod enums;

// Re-export all configuration structures from core
pub use core::{DecoderParams, DomainDiscriminatorConfig, SegFormerHeadConfig};

// Re-export all enums from enums
pub use enums::{AdversarialInput, NormLayer};
