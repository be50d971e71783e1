//! Tests for the embedding engine

use super::*;
use image::{DynamicImage, RgbImage};
use ndarray::Array4;
use proptest::prelude::*;
use std::io::Cursor;
use std::sync::Arc;

/// Deterministic backend: folds the pixel tensor into `dim` buckets
struct BucketBackend {
    dim: usize,
}

impl VisionBackend for BucketBackend {
    fn infer(&self, pixels: Array4<f32>) -> EmbeddingResult<Vec<f32>> {
        let mut out = vec![0.0f32; self.dim];
        for (i, value) in pixels.iter().enumerate() {
            out[(i * 31) % self.dim] += value * ((i % 7) as f32 + 1.0);
        }
        Ok(out)
    }

    fn name(&self) -> &str {
        "bucket"
    }
}

/// Backend that always returns a zero vector
struct ZeroBackend;

impl VisionBackend for ZeroBackend {
    fn infer(&self, _pixels: Array4<f32>) -> EmbeddingResult<Vec<f32>> {
        Ok(vec![0.0; 16])
    }

    fn name(&self) -> &str {
        "zero"
    }
}

fn test_config(dim: usize) -> EmbeddingConfig {
    EmbeddingConfig::default()
        .with_embedding_dim(dim)
        .with_image_size(32)
        .with_gpu(false)
}

async fn ready_embedder(dim: usize) -> ImageEmbedder {
    let embedder = ImageEmbedder::new(test_config(dim));
    embedder
        .load_with_backend(move || {
            let backend: Arc<dyn VisionBackend> = Arc::new(BucketBackend { dim });
            Ok(backend)
        })
        .await
        .expect("load should succeed");
    embedder
}

fn gradient_image(width: u32, height: u32, seed: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x as u8).wrapping_mul(3).wrapping_add(seed),
            (y as u8).wrapping_mul(5),
            seed.wrapping_mul(7),
        ])
    }))
}

fn png_bytes(image: &DynamicImage) -> Vec<u8> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), image::ImageOutputFormat::Png)
        .expect("encode png");
    bytes
}

mod config_tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EmbeddingConfig::default();
        assert_eq!(config.model_name, "ViT-B-16");
        assert_eq!(config.weights, "openai");
        assert_eq!(config.embedding_dim, 768);
        assert_eq!(config.image_size, 224);
    }

    #[test]
    fn test_model_path() {
        let config = EmbeddingConfig::default().with_models_dir("/opt/models");
        assert_eq!(config.model_filename(), "ViT-B-16-openai.onnx");
        assert_eq!(
            config.model_path(),
            std::path::PathBuf::from("/opt/models/ViT-B-16-openai.onnx")
        );
    }
}

mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_embed_before_load_fails_fast() {
        let embedder = ImageEmbedder::new(test_config(16));
        assert_eq!(embedder.state(), ModelLoadingState::Unloaded);

        let result = embedder.embed(&gradient_image(8, 8, 1)).await;
        assert!(matches!(result, Err(EmbeddingError::ModelNotReady { .. })));
    }

    #[tokio::test]
    async fn test_load_transitions_to_ready() {
        let embedder = ready_embedder(16).await;
        assert!(embedder.state().is_ready());
    }

    #[tokio::test]
    async fn test_second_load_returns_same_handle() {
        let embedder = ImageEmbedder::new(test_config(16));
        let first = embedder
            .load_with_backend(|| Ok(Arc::new(BucketBackend { dim: 16 }) as Arc<dyn VisionBackend>))
            .await
            .unwrap();
        let second = embedder
            .load_with_backend(|| Ok(Arc::new(ZeroBackend) as Arc<dyn VisionBackend>))
            .await
            .unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test]
    async fn test_failed_load_is_terminal() {
        let embedder = ImageEmbedder::new(test_config(16));
        let result = embedder
            .load_with_backend(|| {
                Err(EmbeddingError::ModelLoadFailed {
                    reason: "weights missing".to_string(),
                })
            })
            .await;
        assert!(matches!(result, Err(EmbeddingError::ModelLoadFailed { .. })));
        assert!(embedder.state().is_failed());

        let embed = embedder.embed(&gradient_image(8, 8, 1)).await;
        assert!(matches!(embed, Err(EmbeddingError::ModelNotReady { .. })));

        let reload = embedder
            .load_with_backend(|| Ok(Arc::new(BucketBackend { dim: 16 }) as Arc<dyn VisionBackend>))
            .await;
        assert!(matches!(reload, Err(EmbeddingError::ModelNotReady { .. })));
    }

    #[tokio::test]
    async fn test_cancelled_load_moves_to_failed() {
        let embedder = ImageEmbedder::new(test_config(16));
        let slow_load = embedder.load_with_backend(|| {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(Arc::new(BucketBackend { dim: 16 }) as Arc<dyn VisionBackend>)
        });

        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(20), slow_load).await;
        assert!(timed_out.is_err());
        assert_eq!(
            embedder.state(),
            ModelLoadingState::Failed {
                reason: "load cancelled".to_string()
            }
        );

        let reload = embedder
            .load_with_backend(|| Ok(Arc::new(BucketBackend { dim: 16 }) as Arc<dyn VisionBackend>))
            .await;
        assert!(matches!(reload, Err(EmbeddingError::ModelNotReady { .. })));
    }

    #[tokio::test]
    async fn test_missing_onnx_file_fails_load() {
        let dir = tempfile::TempDir::new().unwrap();
        let embedder = ImageEmbedder::new(test_config(16).with_models_dir(dir.path()));

        let result = embedder.load().await;
        match result {
            Err(EmbeddingError::ModelLoadFailed { reason }) => {
                assert!(reason.contains("not found"));
            }
            other => panic!("Expected ModelLoadFailed, got {:?}", other),
        }
        assert!(embedder.state().is_failed());
    }
}

mod embed_tests {
    use super::*;

    #[tokio::test]
    async fn test_embedding_has_configured_dimension_and_unit_norm() {
        let embedder = ready_embedder(64).await;
        let vector = embedder.embed(&gradient_image(40, 20, 3)).await.unwrap();

        assert_eq!(vector.len(), 64);
        assert!((vector.norm() - 1.0).abs() < 1e-5);
    }

    #[tokio::test]
    async fn test_embedding_is_deterministic() {
        let embedder = ready_embedder(32).await;
        let image = gradient_image(50, 30, 9);

        let a = embedder.embed(&image).await.unwrap();
        let b = embedder.embed(&image).await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_concurrent_embeds_share_handle() {
        let embedder = Arc::new(ready_embedder(32).await);
        let image = gradient_image(24, 24, 5);
        let expected = embedder.embed(&image).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let embedder = embedder.clone();
            let image = image.clone();
            tasks.push(tokio::spawn(async move { embedder.embed(&image).await }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_embed_bytes_decodes_png() {
        let embedder = ready_embedder(16).await;
        let image = gradient_image(16, 16, 2);

        let from_bytes = embedder.embed_bytes(&png_bytes(&image)).await.unwrap();
        let direct = embedder.embed(&image).await.unwrap();
        assert_eq!(from_bytes, direct);
    }

    #[tokio::test]
    async fn test_garbage_bytes_are_unsupported() {
        let embedder = ready_embedder(16).await;
        let result = embedder.embed_bytes(b"definitely not an image").await;
        assert!(matches!(result, Err(EmbeddingError::UnsupportedImage { .. })));
    }

    #[tokio::test]
    async fn test_zero_sized_image_is_unsupported() {
        let embedder = ready_embedder(16).await;
        let result = embedder.embed(&DynamicImage::new_rgb8(0, 0)).await;
        assert!(matches!(result, Err(EmbeddingError::UnsupportedImage { .. })));
    }

    #[tokio::test]
    async fn test_wrong_output_width_is_reported() {
        let embedder = ImageEmbedder::new(test_config(8));
        embedder
            .load_with_backend(|| Ok(Arc::new(BucketBackend { dim: 12 }) as Arc<dyn VisionBackend>))
            .await
            .unwrap();

        let result = embedder.embed(&gradient_image(8, 8, 1)).await;
        match result {
            Err(EmbeddingError::OutputDimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 8);
                assert_eq!(actual, 12);
            }
            other => panic!("Expected OutputDimensionMismatch, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_output_cannot_be_normalized() {
        let embedder = ImageEmbedder::new(test_config(16));
        embedder
            .load_with_backend(|| Ok(Arc::new(ZeroBackend) as Arc<dyn VisionBackend>))
            .await
            .unwrap();

        let result = embedder.embed(&gradient_image(8, 8, 1)).await;
        assert!(matches!(result, Err(EmbeddingError::InferenceFailed { .. })));
    }
}

mod preprocess_tests {
    use super::*;

    #[test]
    fn test_preprocess_shape() {
        let tensor = preprocess(&gradient_image(300, 120, 0), 32).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_preprocess_normalizes_with_clip_statistics() {
        let white = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, image::Rgb([255, 255, 255])));
        let tensor = preprocess(&white, 4).unwrap();

        for c in 0..3 {
            let expected = (1.0 - CLIP_MEAN[c]) / CLIP_STD[c];
            assert!((tensor[[0, c, 2, 2]] - expected).abs() < 1e-4);
        }
    }

    #[test]
    fn test_preprocess_handles_grayscale_and_alpha() {
        let gray = DynamicImage::new_luma8(20, 20);
        let rgba = DynamicImage::new_rgba8(20, 20);
        assert_eq!(preprocess(&gray, 8).unwrap().shape(), &[1, 3, 8, 8]);
        assert_eq!(preprocess(&rgba, 8).unwrap().shape(), &[1, 3, 8, 8]);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Any finite, non-zero vector normalizes to unit length
    #[test]
    fn prop_l2_normalize_unit_norm(
        values in proptest::collection::vec(-100.0f32..100.0f32, 1..128),
    ) {
        prop_assume!(values.iter().any(|v| v.abs() > 1e-3));
        let normalized = l2_normalize(values.clone()).unwrap();
        let norm: f32 = normalized.iter().map(|x| x * x).sum::<f32>().sqrt();
        prop_assert_eq!(normalized.len(), values.len());
        prop_assert!((norm - 1.0).abs() < 1e-5, "norm was {}", norm);
    }

    /// Embeddings of arbitrary images are unit length with the configured width
    #[test]
    fn prop_embedding_unit_norm(
        width in 1u32..64,
        height in 1u32..64,
        seed in any::<u8>(),
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let embedder = ready_embedder(24).await;
            let vector = embedder.embed(&gradient_image(width, height, seed)).await.unwrap();
            prop_assert_eq!(vector.len(), 24);
            prop_assert!((vector.norm() - 1.0).abs() < 1e-5);
            Ok(())
        })?;
    }
}
