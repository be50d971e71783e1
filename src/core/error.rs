//! Error types for IP Lens
//!
//! Each subsystem owns its error enum; `LensError` aggregates them so callers
//! can map failures to user-facing responses through `kind()`.

use thiserror::Error;

use crate::asset::AssetError;
use crate::embeddings::EmbeddingError;
use crate::ingest::IngestError;
use crate::logging::LoggingError;
use crate::vector::VectorError;

use super::config::ConfigError;

/// Result type alias for IP Lens operations
pub type Result<T> = std::result::Result<T, LensError>;

/// Main error type for IP Lens
#[derive(Error, Debug)]
pub enum LensError {
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("Vector index error: {0}")]
    Vector(#[from] VectorError),

    #[error("Asset error: {0}")]
    Asset(#[from] AssetError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Logging error: {0}")]
    Logging(#[from] LoggingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse classification used to pick a response
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller sent something unusable
    InvalidInput,
    /// The requested resource does not exist
    NotFound,
    /// The model or the index cannot serve right now
    Unavailable,
    /// Anything else
    Internal,
}

impl LensError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            LensError::Embedding(e) if e.is_client_error() => ErrorKind::InvalidInput,
            LensError::Embedding(e) if e.is_unavailable() => ErrorKind::Unavailable,
            LensError::Vector(e) if e.is_client_error() => ErrorKind::InvalidInput,
            LensError::Vector(e) if e.is_unavailable() => ErrorKind::Unavailable,
            LensError::Asset(e) if e.is_client_error() => ErrorKind::InvalidInput,
            LensError::Asset(e) if e.is_not_found() => ErrorKind::NotFound,
            _ => ErrorKind::Internal,
        }
    }

    /// Check if the caller is at fault
    pub fn is_client_error(&self) -> bool {
        matches!(self.kind(), ErrorKind::InvalidInput | ErrorKind::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_error_kinds() {
        let err: LensError = EmbeddingError::UnsupportedImage {
            reason: "truncated".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);
        assert!(err.is_client_error());

        let err: LensError = EmbeddingError::ModelNotReady {
            state: "loading".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        let err: LensError = EmbeddingError::OutputDimensionMismatch {
            expected: 768,
            actual: 512,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
    }

    #[test]
    fn test_vector_error_kinds() {
        let err: LensError = VectorError::InvalidArgument {
            reason: "k must be positive".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: LensError = VectorError::StorageUnavailable {
            reason: "corrupt".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Unavailable);

        // Mismatched dimensions are a caller bug, not bad user input
        let err: LensError = VectorError::DimensionMismatch {
            expected: 768,
            actual: 3,
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_asset_error_kinds() {
        let err: LensError = AssetError::InvalidContentType {
            content_type: "text/plain".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::InvalidInput);

        let err: LensError = AssetError::NotFound {
            name: "missing.png".to_string(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_error_display() {
        let err: LensError = VectorError::DimensionMismatch {
            expected: 768,
            actual: 3,
        }
        .into();
        let message = err.to_string();
        assert!(message.contains("768"));
        assert!(message.contains("3"));
    }
}
