//! IP Lens - image similarity lookup for IP asset catalogues
//!
//! This crate provides:
//! - CLIP image embeddings through ONNX Runtime, loaded once per process
//! - A durable nearest-neighbor vector index with a write-ahead log
//! - An HTTP API for generating, adding and searching image vectors
//! - A batch client that uploads a folder of images to a running server

pub mod asset;
pub mod core;
pub mod embeddings;
pub mod ingest;
pub mod logging;
pub mod service;
pub mod vector;

// Re-export commonly used items
pub use asset::{AssetServerConfig, LensServer};
pub use crate::core::config::AppConfig;
pub use crate::core::error::{LensError, Result};
pub use embeddings::{EmbeddingConfig, EmbeddingVector, ImageEmbedder};
pub use ingest::{IngestConfig, IngestReport, Ingestor};
pub use logging::{LoggingConfig, LoggingSystem};
pub use service::LensService;
pub use vector::{Distance, InsertOutcome, VectorError, VectorStore, VectorStoreConfig};
