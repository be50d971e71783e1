//! Vector store error types

use thiserror::Error;

/// Vector store specific errors
#[derive(Error, Debug)]
pub enum VectorError {
    #[error("Invalid vector dimension: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {reason}")]
    InvalidArgument { reason: String },

    #[error("Storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VectorError {
    pub(crate) fn storage(reason: impl Into<String>) -> Self {
        VectorError::StorageUnavailable {
            reason: reason.into(),
        }
    }

    /// Whether the caller passed bad arguments
    pub fn is_client_error(&self) -> bool {
        matches!(self, VectorError::InvalidArgument { .. })
    }

    /// Whether the durable collection cannot be served
    pub fn is_unavailable(&self) -> bool {
        matches!(self, VectorError::StorageUnavailable { .. } | VectorError::Io(_))
    }
}
