//! Error types for seqgra_core.

use thiserror::Error;

/// Result type alias using [`CoreError`].
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core errors shared by every seqgra crate.
#[derive(Error, Debug)]
pub enum CoreError {
    /// A tensor violates the rank, channel or height invariant of its layout.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape {
        /// Expected shape description.
        expected: String,
        /// Actual shape description.
        got: String,
    },

    /// Parallel inputs disagree (counts, annotation lengths, tensor widths).
    #[error("Data mismatch: {0}")]
    DataMismatch(String),

    /// Unknown alphabet, convention, task or identifier.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A sequence contains a symbol outside its alphabet.
    #[error("Invalid sequence: {0}")]
    InvalidSequence(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    /// Build an [`CoreError::InvalidShape`] from a description and the offending shape.
    pub fn shape(expected: impl Into<String>, got: &[usize]) -> Self {
        Self::InvalidShape {
            expected: expected.into(),
            got: format!("{got:?}"),
        }
    }

    /// Whether this is a shape error.
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::InvalidShape { .. })
    }
}
