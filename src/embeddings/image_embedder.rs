//! Image Embedder using a CLIP vision model
//!
//! Applies the CLIP preprocessing contract, runs the shared backend on a
//! blocking thread and L2-normalizes the result, so cosine and Euclidean
//! distance give the same neighbor ordering downstream.

use std::sync::Arc;

use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;
use serde::Serialize;

use super::backend::{OnnxBackend, VisionBackend};
use super::config::{EmbeddingConfig, CLIP_MEAN, CLIP_STD};
use super::error::{EmbeddingError, EmbeddingResult};
use super::model_manager::{ModelHandle, ModelLoadingState, ModelManager};

/// Unit-length feature vector produced by the embedder
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Normalize a raw model output into an embedding
    pub(crate) fn from_raw(raw: Vec<f32>) -> EmbeddingResult<Self> {
        l2_normalize(raw).map(Self)
    }

    /// Borrow the components
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the vector has no components
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Euclidean norm (1.0 within float tolerance)
    pub fn norm(&self) -> f32 {
        self.0.iter().map(|x| x * x).sum::<f32>().sqrt()
    }

    /// Take ownership of the components
    pub fn into_inner(self) -> Vec<f32> {
        self.0
    }
}

/// Scale a vector to unit Euclidean length
pub fn l2_normalize(mut raw: Vec<f32>) -> EmbeddingResult<Vec<f32>> {
    if raw.iter().any(|x| !x.is_finite()) {
        return Err(EmbeddingError::InferenceFailed {
            reason: "model output contains non-finite values".to_string(),
        });
    }

    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 1e-12 {
        return Err(EmbeddingError::InferenceFailed {
            reason: "model output has zero norm".to_string(),
        });
    }

    for x in raw.iter_mut() {
        *x /= norm;
    }
    Ok(raw)
}

/// Image embedder backed by a single process-wide model
pub struct ImageEmbedder {
    manager: ModelManager,
    config: EmbeddingConfig,
}

impl ImageEmbedder {
    /// Create an embedder; no model is loaded until `load` is called
    pub fn new(config: EmbeddingConfig) -> Self {
        Self {
            manager: ModelManager::new(),
            config,
        }
    }

    /// Load the ONNX model named by the configuration
    pub async fn load(&self) -> EmbeddingResult<Arc<ModelHandle>> {
        let config = self.config.clone();
        self.load_with_backend(move || {
            let backend: Arc<dyn VisionBackend> = Arc::new(OnnxBackend::from_config(&config)?);
            Ok(backend)
        })
        .await
    }

    /// Load with a caller-supplied backend constructor
    pub async fn load_with_backend<F>(&self, loader: F) -> EmbeddingResult<Arc<ModelHandle>>
    where
        F: FnOnce() -> EmbeddingResult<Arc<dyn VisionBackend>> + Send + 'static,
    {
        self.manager
            .load_with(&self.config.model_name, &self.config.weights, loader)
            .await
    }

    /// Current model state
    pub fn state(&self) -> ModelLoadingState {
        self.manager.state()
    }

    /// Embed a decoded image
    pub async fn embed(&self, image: &DynamicImage) -> EmbeddingResult<EmbeddingVector> {
        let handle = self.manager.handle()?;
        let pixels = preprocess(image, self.config.image_size)?;

        let raw = tokio::task::spawn_blocking(move || handle.backend().infer(pixels))
            .await
            .map_err(|e| EmbeddingError::InferenceFailed {
                reason: format!("Task join error: {}", e),
            })??;

        if raw.len() != self.config.embedding_dim {
            return Err(EmbeddingError::OutputDimensionMismatch {
                expected: self.config.embedding_dim,
                actual: raw.len(),
            });
        }

        EmbeddingVector::from_raw(raw)
    }

    /// Decode and embed raw image bytes
    pub async fn embed_bytes(&self, image_data: &[u8]) -> EmbeddingResult<EmbeddingVector> {
        let image = decode_image(image_data)?;
        self.embed(&image).await
    }

    /// Get the embedding dimension
    pub fn embedding_dim(&self) -> usize {
        self.config.embedding_dim
    }

    /// Get the expected input image size
    pub fn image_size(&self) -> u32 {
        self.config.image_size
    }

    /// Get the configuration
    pub fn config(&self) -> &EmbeddingConfig {
        &self.config
    }
}

/// Decode JPEG/PNG/WEBP (or any format `image` understands) into a raster
pub fn decode_image(image_data: &[u8]) -> EmbeddingResult<DynamicImage> {
    let image = image::load_from_memory(image_data).map_err(|e| EmbeddingError::UnsupportedImage {
        reason: format!("Failed to decode image: {}", e),
    })?;

    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EmbeddingError::UnsupportedImage {
            reason: "image has no pixels".to_string(),
        });
    }

    Ok(image)
}

/// CLIP preprocessing: resize-to-cover, center crop, scale and normalize into NCHW
pub fn preprocess(image: &DynamicImage, target_size: u32) -> EmbeddingResult<Array4<f32>> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(EmbeddingError::UnsupportedImage {
            reason: format!("image is {}x{}", width, height),
        });
    }

    let rgb = DynamicImage::ImageRgb8(image.to_rgb8())
        .resize_to_fill(target_size, target_size, FilterType::CatmullRom)
        .to_rgb8();

    let size = target_size as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            let value = pixel[c] as f32 / 255.0;
            tensor[[0, c, y as usize, x as usize]] = (value - CLIP_MEAN[c]) / CLIP_STD[c];
        }
    }

    Ok(tensor)
}
