//! Vector store configuration

use std::path::PathBuf;
use serde::{Deserialize, Serialize};

/// Distance metric for nearest-neighbor ordering
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Distance {
    /// Cosine distance: `1 - cos(a, b)`, in `[0, 2]`
    #[default]
    Cosine,
    /// Euclidean (L2) distance
    Euclidean,
}

impl Distance {
    /// Distance between two vectors given their precomputed norms
    pub fn between(&self, a: &[f32], a_norm: f32, b: &[f32], b_norm: f32) -> f32 {
        match self {
            Distance::Cosine => {
                if a_norm == 0.0 || b_norm == 0.0 {
                    return 1.0;
                }
                let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
                (1.0 - dot / (a_norm * b_norm)).max(0.0)
            }
            Distance::Euclidean => a
                .iter()
                .zip(b.iter())
                .map(|(x, y)| (x - y).powi(2))
                .sum::<f32>()
                .sqrt(),
        }
    }
}

impl std::fmt::Display for Distance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Distance::Cosine => write!(f, "cosine"),
            Distance::Euclidean => write!(f, "euclidean"),
        }
    }
}

/// Main configuration for the vector store
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorStoreConfig {
    /// Collection name recorded in the manifest
    pub collection_name: String,

    /// Vector dimension (must match embedding model output)
    pub vector_size: usize,

    /// Distance metric for similarity
    pub distance: Distance,

    /// Directory holding the manifest and write-ahead log
    pub storage_path: PathBuf,
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            collection_name: "ip_vector_collection".to_string(),
            vector_size: 768, // CLIP ViT-B-16 image tower
            distance: Distance::default(),
            storage_path: default_storage_path(),
        }
    }
}

impl VectorStoreConfig {
    /// Create a new config with custom collection name
    pub fn with_collection_name(mut self, name: impl Into<String>) -> Self {
        self.collection_name = name.into();
        self
    }

    /// Create a new config with custom vector size
    pub fn with_vector_size(mut self, size: usize) -> Self {
        self.vector_size = size;
        self
    }

    /// Create a new config with custom storage path
    pub fn with_storage_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage_path = path.into();
        self
    }

    /// Create a new config with custom distance metric
    pub fn with_distance(mut self, distance: Distance) -> Self {
        self.distance = distance;
        self
    }
}

fn default_storage_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ip-lens").join("index"))
        .unwrap_or_else(|| PathBuf::from("data/index"))
}
