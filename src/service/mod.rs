//! Lens Service
//!
//! The three operations the request layer consumes: generate a vector for an
//! image, add an image to the collection, and search the collection with an
//! image. Wraps one shared `ImageEmbedder` and one shared `VectorStore`.

#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;

use image::DynamicImage;
use tracing::{debug, info};

use crate::core::config::ConfigError;
use crate::core::error::Result;
use crate::embeddings::{EmbeddingVector, ImageEmbedder, ModelLoadingState};
use crate::vector::{InsertOutcome, Metadata, QueryResult, VectorError, VectorStore};

pub use crate::embeddings::decode_image;

/// Image similarity service
#[derive(Clone)]
pub struct LensService {
    embedder: Arc<ImageEmbedder>,
    store: Arc<VectorStore>,
}

impl LensService {
    /// Pair an embedder with a collection of the same dimension
    pub fn new(embedder: Arc<ImageEmbedder>, store: Arc<VectorStore>) -> Result<Self> {
        if embedder.embedding_dim() != store.dimension() {
            return Err(ConfigError::Invalid(format!(
                "embedder produces {}-dimensional vectors but the collection stores {}",
                embedder.embedding_dim(),
                store.dimension()
            ))
            .into());
        }

        Ok(Self { embedder, store })
    }

    /// Embed an image
    pub async fn generate_vector(&self, image: &DynamicImage) -> Result<EmbeddingVector> {
        Ok(self.embedder.embed(image).await?)
    }

    /// Embed an image and index it under `id`
    ///
    /// An id that is already indexed is reported as `AlreadyExists` without
    /// running the model.
    pub async fn add_vector(
        &self,
        id: &str,
        image: &DynamicImage,
        metadata: Metadata,
    ) -> Result<InsertOutcome> {
        if self.store.contains(id).await {
            debug!("'{}' already indexed, skipping embedding", id);
            return Ok(InsertOutcome::AlreadyExists {
                total: self.store.count().await,
            });
        }

        let vector = self.embedder.embed(image).await?;
        let outcome = self.store.insert(id, vector.into_inner(), metadata).await?;

        if outcome.was_inserted() {
            info!("Indexed '{}' ({} record(s) total)", id, outcome.total());
        }
        Ok(outcome)
    }

    /// Find the `k` indexed images nearest to `image`
    pub async fn search_vector(&self, image: &DynamicImage, k: usize) -> Result<QueryResult> {
        if k == 0 {
            return Err(VectorError::InvalidArgument {
                reason: "n_results must be positive".to_string(),
            }
            .into());
        }

        let vector = self.embedder.embed(image).await?;
        let results = self.store.query(vector.as_slice(), k).await?;
        debug!("Search returned {} of {} requested result(s)", results.len(), k);
        Ok(results)
    }

    /// Whether `id` is indexed
    pub async fn contains(&self, id: &str) -> bool {
        self.store.contains(id).await
    }

    /// Number of indexed records
    pub async fn count(&self) -> usize {
        self.store.count().await
    }

    /// Current model state
    pub fn model_state(&self) -> ModelLoadingState {
        self.embedder.state()
    }

    pub fn embedder(&self) -> &Arc<ImageEmbedder> {
        &self.embedder
    }

    pub fn store(&self) -> &Arc<VectorStore> {
        &self.store
    }
}
