//! Error types for seqgra_eval.

use thiserror::Error;

use seqgra_core::CoreError;
use seqgra_data::DataError;
use seqgra_explain::ExplainError;

/// Result type alias using [`EvalError`].
pub type Result<T> = std::result::Result<T, EvalError>;

/// Errors raised while evaluating an attribution strategy.
#[derive(Error, Debug)]
pub enum EvalError {
    /// Shape, configuration or data mismatch.
    #[error("Core error: {0}")]
    Core(#[from] CoreError),

    /// The examples could not be loaded.
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// The strategy failed.
    #[error("Attribution error: {0}")]
    Explain(#[from] ExplainError),

    /// Writing an artifact failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Writing the importance array failed.
    #[error("NPY error: {0}")]
    Npy(String),

    /// Writing the agreement table failed.
    #[error("Table error: {0}")]
    Table(#[from] csv::Error),

    /// Configuration file could not be parsed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl EvalError {
    /// Whether this is a shape error, wherever it was raised.
    pub fn is_shape_error(&self) -> bool {
        match self {
            Self::Core(e) => e.is_shape_error(),
            Self::Explain(e) => e.is_shape_error(),
            _ => false,
        }
    }
}
