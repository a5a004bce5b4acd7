use thiserror::Error;

/// The error type for `SegFormer-Burn` operations.
///
/// Configuration problems are reported when a head is built; the structural
/// preconditions of a forward pass (which backbone scales exist, how many channels
/// they carry) are reported before any tensor work starts. Numerical shape errors
/// inside Burn kernels are not translated.
#[derive(Error, Debug)]
pub enum SegFormerError {
    /// Error for when an invalid head configuration is provided.
    /// This can happen if configuration parameters are logically inconsistent.
    #[error("Invalid head configuration: {reason}")]
    InvalidConfiguration {
        /// The reason why the configuration is invalid.
        reason: String,
    },

    /// Error for when a configured scale index has no matching backbone feature map.
    #[error("Scale index {index} is not present in the backbone features ({available} feature maps given)")]
    MissingScale {
        /// The requested scale index.
        index: usize,
        /// The number of feature maps that were provided.
        available: usize,
    },

    /// Error for when a feature map's channel depth does not match its projection.
    #[error("Channel mismatch at scale {scale}: expected {expected} channels, got {actual}")]
    ChannelMismatch {
        /// The scale index of the offending feature map.
        scale: usize,
        /// The input width the projection was built for.
        expected: usize,
        /// The channel depth of the feature map.
        actual: usize,
    },

    /// Error for when an input tensor has an invalid shape.
    #[error("Invalid input tensor shape: expected {expected}, got {actual}")]
    InvalidTensorShape {
        /// The expected tensor shape.
        expected: String,
        /// The actual tensor shape.
        actual: String,
    },
}

/// A specialized `Result` type for `SegFormer-Burn` operations.
pub type SegFormerResult<T> = Result<T, SegFormerError>;
