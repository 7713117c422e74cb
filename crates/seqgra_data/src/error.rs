//! Error types for seqgra_data.

use thiserror::Error;

/// Result type alias using [`DataError`].
pub type Result<T> = std::result::Result<T, DataError>;

/// Errors that can occur while reading and checking example data.
#[derive(Error, Debug)]
pub enum DataError {
    /// A split was requested that the source does not have.
    #[error("Missing split: {0}")]
    MissingSplit(String),

    /// File format error.
    #[error("File format error: {0}")]
    FormatError(String),

    /// Invalid labels with validation set to fail.
    #[error("Invalid labels: {0}")]
    InvalidLabels(String),

    /// Delimited file error.
    #[error("TSV error: {0}")]
    Tsv(#[from] csv::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Core error.
    #[error("Core error: {0}")]
    CoreError(#[from] seqgra_core::CoreError),
}
