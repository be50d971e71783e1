//! Error types for the embedding engine

use thiserror::Error;

/// Result type for embedding operations
pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

/// Errors that can occur during embedding operations
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Model weights could not be found, fetched or deserialized
    #[error("Model loading failed: {reason}")]
    ModelLoadFailed { reason: String },

    /// Embed attempted while the model is not in the `Ready` state
    #[error("Model not ready: {state}")]
    ModelNotReady { state: String },

    /// Input could not be decoded or has no pixels
    #[error("Unsupported image: {reason}")]
    UnsupportedImage { reason: String },

    /// Model produced a vector of the wrong width
    #[error("Model output dimension mismatch: expected {expected}, got {actual}")]
    OutputDimensionMismatch { expected: usize, actual: usize },

    /// Inference failed
    #[error("Inference failed: {reason}")]
    InferenceFailed { reason: String },

    /// ONNX runtime error
    #[error("ONNX runtime error: {0}")]
    OnnxError(String),
}

impl From<ort::OrtError> for EmbeddingError {
    fn from(err: ort::OrtError) -> Self {
        EmbeddingError::OnnxError(err.to_string())
    }
}

impl EmbeddingError {
    /// Whether the caller sent bad input (as opposed to a server-side failure)
    pub fn is_client_error(&self) -> bool {
        matches!(self, EmbeddingError::UnsupportedImage { .. })
    }

    /// Whether the model is unavailable for serving
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            EmbeddingError::ModelLoadFailed { .. } | EmbeddingError::ModelNotReady { .. }
        )
    }
}
