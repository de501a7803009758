//! Error types shared by every stage of the analysis/synthesis pipeline

use thiserror::Error;

/// Errors raised by window generation, framing and the STFT pipeline.
///
/// All of them are detected while validating parameters at call entry,
/// before any samples are touched.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StftError {
    /// Non-positive or mutually incompatible window/hop settings
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Input signal shorter than one analysis window
    #[error("Insufficient samples: need at least {needed}, got {available}")]
    InsufficientSamples { needed: usize, available: usize },

    /// Spectrogram or frame dimensions disagree with the declared layout
    #[error("Shape mismatch in {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

impl StftError {
    pub(crate) fn config(message: impl Into<String>) -> Self {
        StftError::InvalidConfiguration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, StftError>;
