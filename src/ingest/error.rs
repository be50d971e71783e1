//! Error types for batch ingestion

use std::path::PathBuf;

use thiserror::Error;

/// Ingestion errors that abort a run
///
/// Failures of individual files are counted in the report instead.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("Image folder not found: {path:?}")]
    FolderNotFound { path: PathBuf },

    #[error("Could not connect to the server at {url}: {reason}")]
    ServerUnreachable { url: String, reason: String },

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for ingestion
pub type IngestResult<T> = Result<T, IngestError>;
