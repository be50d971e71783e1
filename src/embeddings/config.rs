//! Configuration for the image embedder

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};

/// CLIP per-channel mean (RGB)
pub const CLIP_MEAN: [f32; 3] = [0.48145466, 0.4578275, 0.40821073];

/// CLIP per-channel standard deviation (RGB)
pub const CLIP_STD: [f32; 3] = [0.26862954, 0.26130258, 0.27577711];

/// Main configuration for the embedding engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// Directory containing ONNX model files
    pub models_dir: PathBuf,

    /// Model architecture identifier (e.g. "ViT-B-16")
    pub model_name: String,

    /// Pretrained weights identifier (e.g. "openai")
    pub weights: String,

    /// Input image size (width and height) expected by the model
    pub image_size: u32,

    /// Embedding dimension produced by the model
    pub embedding_dim: usize,

    /// Whether to use GPU acceleration
    pub use_gpu: bool,

    /// Intra-op threads for the ONNX session
    pub intra_threads: i16,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            model_name: "ViT-B-16".to_string(),
            weights: "openai".to_string(),
            image_size: 224,
            embedding_dim: 768,
            use_gpu: true,
            intra_threads: 4,
        }
    }
}

impl EmbeddingConfig {
    /// Set the models directory
    pub fn with_models_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.models_dir = dir.into();
        self
    }

    /// Set the model and weights identifiers
    pub fn with_model(mut self, model_name: impl Into<String>, weights: impl Into<String>) -> Self {
        self.model_name = model_name.into();
        self.weights = weights.into();
        self
    }

    /// Set the embedding dimension
    pub fn with_embedding_dim(mut self, dim: usize) -> Self {
        self.embedding_dim = dim;
        self
    }

    /// Set the model input size
    pub fn with_image_size(mut self, size: u32) -> Self {
        self.image_size = size;
        self
    }

    /// Enable or disable GPU execution
    pub fn with_gpu(mut self, use_gpu: bool) -> Self {
        self.use_gpu = use_gpu;
        self
    }

    /// File name of the exported model: `{model_name}-{weights}.onnx`
    pub fn model_filename(&self) -> String {
        format!("{}-{}.onnx", self.model_name, self.weights)
    }

    /// Full path of the exported model
    pub fn model_path(&self) -> PathBuf {
        self.models_dir.join(self.model_filename())
    }
}

fn default_models_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ip-lens").join("models"))
        .unwrap_or_else(|| Path::new("models").to_path_buf())
}
