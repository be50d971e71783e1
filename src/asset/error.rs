//! Asset server error types

use thiserror::Error;

/// Asset server error type
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Invalid file type '{content_type}'; expected image/jpeg, image/png or image/webp")]
    InvalidContentType { content_type: String },

    #[error("Missing multipart field '{field}'")]
    MissingField { field: String },

    #[error("Malformed multipart body: {reason}")]
    InvalidMultipart { reason: String },

    #[error("Invalid asset name '{name}'")]
    InvalidName { name: String },

    #[error("Asset not found: {name}")]
    NotFound { name: String },

    #[error("Server bind failed: {reason}")]
    BindFailed { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal server error: {reason}")]
    Internal { reason: String },
}

impl AssetError {
    /// Check if this error should result in a 400 Bad Request response
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AssetError::InvalidContentType { .. }
                | AssetError::MissingField { .. }
                | AssetError::InvalidMultipart { .. }
                | AssetError::InvalidName { .. }
        )
    }

    /// Check if this error should result in a 404 Not Found response
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssetError::NotFound { .. })
    }
}
