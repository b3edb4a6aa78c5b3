//! Error types for visbrain-rs.

use thiserror::Error;

/// The main error type for visbrain-rs operations.
#[derive(Error, Debug)]
pub enum VisbrainError {
    /// An object with the given name already exists in a combiner or subplot.
    #[error("object '{0}' already exists")]
    ObjectExists(String),

    /// An object with the given name was not found.
    #[error("object '{0}' not found")]
    ObjectNotFound(String),

    /// An integer index was outside of the valid range.
    #[error("index {index} out of range (len {len})")]
    IndexOutOfRange { index: usize, len: usize },

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// A value violates the contract of the operation.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// A label was requested that is not part of the label table.
    #[error("label {0} is not defined in the label table")]
    UnknownLabel(i32),

    /// An operation that needs at least one element received none.
    #[error("empty selection: {0}")]
    EmptySelection(String),

    /// A grid cell was requested that holds no subplot.
    #[error("no subplot at row {row}, col {col}")]
    SubplotNotFound { row: usize, col: usize },

    /// A long operation was cancelled through its cancellation predicate.
    #[error("operation cancelled")]
    Cancelled,

    /// A surface or ROI template could not be decoded.
    #[error("template error: {0}")]
    Template(String),

    /// Rendering error.
    #[error("render error: {0}")]
    RenderError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl VisbrainError {
    /// Shorthand for [`VisbrainError::InvalidValue`].
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidValue(msg.into())
    }
}

/// A specialized Result type for visbrain-rs operations.
pub type Result<T> = std::result::Result<T, VisbrainError>;

/// Returns a [`VisbrainError::SizeMismatch`] when `actual != expected`.
pub fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(VisbrainError::SizeMismatch { expected, actual })
    }
}
