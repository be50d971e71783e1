//! Batch ingestion configuration

use serde::{Deserialize, Serialize};

/// Settings for the batch ingestion client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// Base URL of a running IP Lens server
    pub server_url: String,
    /// Uploads kept in flight at once
    pub concurrency: usize,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8000".to_string(),
            concurrency: 4,
            timeout_secs: 120,
        }
    }
}

impl IngestConfig {
    pub fn with_server_url(mut self, url: impl Into<String>) -> Self {
        self.server_url = url.into();
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Endpoint that receives each upload
    pub fn add_vector_url(&self) -> String {
        format!("{}/add-vector", self.server_url.trim_end_matches('/'))
    }
}
