//! Test fixtures shared by the service and HTTP tests

use std::io::Cursor;
use std::sync::Arc;

use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use tempfile::TempDir;

use super::LensService;
use crate::embeddings::{EmbeddingConfig, EmbeddingResult, ImageEmbedder, VisionBackend};
use crate::vector::{VectorStore, VectorStoreConfig};

pub(crate) const TEST_DIM: usize = 16;

/// Deterministic backend: folds the pixel tensor into `dim` buckets
pub(crate) struct FoldBackend {
    pub dim: usize,
}

impl VisionBackend for FoldBackend {
    fn infer(&self, pixels: Array4<f32>) -> EmbeddingResult<Vec<f32>> {
        let mut out = vec![0.0f32; self.dim];
        for (i, value) in pixels.iter().enumerate() {
            out[(i * 31) % self.dim] += value * ((i % 7) as f32 + 1.0);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "fold"
    }
}

pub(crate) fn embedding_config() -> EmbeddingConfig {
    EmbeddingConfig::default()
        .with_embedding_dim(TEST_DIM)
        .with_image_size(32)
        .with_gpu(false)
}

/// Embedder in the `Ready` state
pub(crate) async fn ready_embedder() -> Arc<ImageEmbedder> {
    let embedder = ImageEmbedder::new(embedding_config());
    embedder
        .load_with_backend(|| {
            let backend: Arc<dyn VisionBackend> = Arc::new(FoldBackend { dim: TEST_DIM });
            Ok(backend)
        })
        .await
        .expect("load should succeed");
    Arc::new(embedder)
}

pub(crate) async fn open_store(dir: &std::path::Path) -> Arc<VectorStore> {
    let config = VectorStoreConfig::default()
        .with_storage_path(dir)
        .with_vector_size(TEST_DIM);
    Arc::new(VectorStore::open(config).await.expect("open store"))
}

/// Service over a ready embedder and an empty collection in a temp dir
pub(crate) async fn test_service() -> (LensService, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = open_store(&temp_dir.path().join("index")).await;
    let service = LensService::new(ready_embedder().await, store).expect("dimensions match");
    (service, temp_dir)
}

pub(crate) fn sample_image(seed: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(40, 30, |x, y| {
        image::Rgb([
            (x as u8).wrapping_mul(seed.wrapping_add(3)),
            (y as u8).wrapping_mul(5).wrapping_add(seed),
            seed.wrapping_mul(37),
        ])
    }))
}

pub(crate) fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}
