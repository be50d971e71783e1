//! Configuration module for IP Lens
//!
//! Settings are layered: built-in defaults, then an optional TOML/JSON file,
//! then `IP_LENS_*` environment variables (`__` separates nested keys, e.g.
//! `IP_LENS_SERVER__PORT=9000`).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::asset::AssetServerConfig;
use crate::embeddings::EmbeddingConfig;
use crate::ingest::IngestConfig;
use crate::logging::LoggingConfig;
use crate::vector::VectorStoreConfig;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "IP_LENS";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration result type
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Vision model settings
    pub embedding: EmbeddingConfig,

    /// Vector collection settings
    pub index: VectorStoreConfig,

    /// HTTP server settings
    pub server: AssetServerConfig,

    /// Batch ingestion client settings
    pub ingest: IngestConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from an optional file plus the environment
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = ::config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(::config::File::from(path).required(true));
        }

        builder = builder.add_source(
            ::config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-section consistency
    pub fn validate(&self) -> ConfigResult<()> {
        if self.embedding.embedding_dim == 0 {
            return Err(ConfigError::Invalid(
                "embedding.embedding_dim must be positive".to_string(),
            ));
        }
        if self.index.vector_size != self.embedding.embedding_dim {
            return Err(ConfigError::Invalid(format!(
                "index.vector_size ({}) must equal embedding.embedding_dim ({})",
                self.index.vector_size, self.embedding.embedding_dim
            )));
        }
        if self.embedding.image_size == 0 {
            return Err(ConfigError::Invalid(
                "embedding.image_size must be positive".to_string(),
            ));
        }
        if self.server.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be positive".to_string(),
            ));
        }
        if self.server.default_results == 0 {
            return Err(ConfigError::Invalid(
                "server.default_results must be positive".to_string(),
            ));
        }
        if self.ingest.concurrency == 0 {
            return Err(ConfigError::Invalid(
                "ingest.concurrency must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
