//! Error types for seqgra_explain.

use thiserror::Error;

use seqgra_core::CoreError;

/// Result type alias using [`ExplainError`].
pub type Result<T> = std::result::Result<T, ExplainError>;

/// Errors raised while computing attributions.
#[derive(Error, Debug)]
pub enum ExplainError {
    /// Preconditions not met: model not in inference mode, input without
    /// gradient tracking, or a required strategy parameter missing.
    #[error("Invalid state: {0}")]
    State(String),

    /// Tensor contents could not be read back from the backend.
    #[error("Tensor data error: {0}")]
    TensorData(String),

    /// Shape, configuration or data errors.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),
}

impl ExplainError {
    /// Whether this is a shape error.
    pub fn is_shape_error(&self) -> bool {
        matches!(self, Self::Core(e) if e.is_shape_error())
    }
}
