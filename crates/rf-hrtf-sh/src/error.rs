//! Error types for HRTF spherical-harmonic processing
//!
//! Rank-deficient bases are not errors (they fall back to a minimum-norm fit)
//! and decoding with a head geometry that differs from the one used at encode
//! time cannot be detected; callers must pass matching parameters.

use thiserror::Error;

/// SH codec error types
#[derive(Error, Debug)]
pub enum ShError {
    /// Negative, non-integer or unsupported spherical-harmonic order
    #[error("Invalid SH order: {0}")]
    InvalidOrder(String),

    /// Array shape does not match what the operation expects
    #[error("Dimension mismatch for {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    /// Out-of-range numeric parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// FFT processing error
    #[error("FFT error: {0}")]
    Fft(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for SH codec operations
pub type ShResult<T> = Result<T, ShError>;

impl ShError {
    pub(crate) fn mismatch(what: &'static str, expected: usize, got: usize) -> Self {
        ShError::DimensionMismatch { what, expected, got }
    }
}

impl From<serde_json::Error> for ShError {
    fn from(e: serde_json::Error) -> Self {
        ShError::Serialization(e.to_string())
    }
}
