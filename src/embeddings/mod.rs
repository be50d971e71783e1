//! Embedding Engine for IP Lens
//!
//! This module turns decoded images into unit-length feature vectors:
//! - CLIP preprocessing (resize-to-cover, center crop, mean/std normalization)
//! - ONNX Runtime inference behind the `VisionBackend` trait
//! - One-time model load with an explicit `Unloaded -> Loading -> Ready|Failed` barrier
//! - L2 normalization of every output

mod backend;
mod config;
mod error;
mod image_embedder;
mod model_manager;

#[cfg(test)]
mod tests;

pub use backend::{OnnxBackend, VisionBackend};
pub use self::config::{EmbeddingConfig, CLIP_MEAN, CLIP_STD};
pub use error::{EmbeddingError, EmbeddingResult};
pub use image_embedder::{decode_image, l2_normalize, preprocess, EmbeddingVector, ImageEmbedder};
pub use model_manager::{ModelHandle, ModelLoadingState, ModelManager};
