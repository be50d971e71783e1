//! Model Manager for the one-time model load
//!
//! Implements the load barrier as a small state machine:
//! `Unloaded -> Loading -> Ready` or `Unloaded -> Loading -> Failed`.
//! Both `Ready` and `Failed` are terminal.

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use super::backend::VisionBackend;
use super::error::{EmbeddingError, EmbeddingResult};

/// State of the model in the loading pipeline
#[derive(Debug, Clone, PartialEq)]
pub enum ModelLoadingState {
    /// `load` has not been called yet
    Unloaded,

    /// Weights are being loaded into memory
    Loading,

    /// Model is ready for inference
    Ready,

    /// Model loading failed; no embed call will ever succeed
    Failed { reason: String },
}

impl ModelLoadingState {
    /// Check if the model is ready for inference
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelLoadingState::Ready)
    }

    /// Check if the model is being loaded
    pub fn is_loading(&self) -> bool {
        matches!(self, ModelLoadingState::Loading)
    }

    /// Check if the model failed to load
    pub fn is_failed(&self) -> bool {
        matches!(self, ModelLoadingState::Failed { .. })
    }
}

impl std::fmt::Display for ModelLoadingState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelLoadingState::Unloaded => write!(f, "unloaded"),
            ModelLoadingState::Loading => write!(f, "loading"),
            ModelLoadingState::Ready => write!(f, "ready"),
            ModelLoadingState::Failed { reason } => write!(f, "failed ({})", reason),
        }
    }
}

/// Handle to a loaded model
///
/// Immutable once created; shared by every embed call.
pub struct ModelHandle {
    backend: Arc<dyn VisionBackend>,
    model_name: String,
    weights: String,
    loaded_at: Instant,
}

impl ModelHandle {
    /// The inference backend
    pub fn backend(&self) -> &Arc<dyn VisionBackend> {
        &self.backend
    }

    /// Model architecture identifier
    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Pretrained weights identifier
    pub fn weights(&self) -> &str {
        &self.weights
    }

    /// When the model finished loading
    pub fn loaded_at(&self) -> Instant {
        self.loaded_at
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("backend", &self.backend.name())
            .field("model_name", &self.model_name)
            .field("weights", &self.weights)
            .finish()
    }
}

enum ModelSlot {
    Unloaded,
    Loading,
    Ready(Arc<ModelHandle>),
    Failed(String),
}

impl ModelSlot {
    fn label(&self) -> String {
        match self {
            ModelSlot::Unloaded => "unloaded".to_string(),
            ModelSlot::Loading => "loading".to_string(),
            ModelSlot::Ready(_) => "ready".to_string(),
            ModelSlot::Failed(reason) => format!("failed ({})", reason),
        }
    }
}

/// Owns the model slot and guards its transitions
pub struct ModelManager {
    slot: RwLock<ModelSlot>,
}

impl ModelManager {
    /// Create a manager in the `Unloaded` state
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(ModelSlot::Unloaded),
        }
    }

    /// Get the current state of the model
    pub fn state(&self) -> ModelLoadingState {
        match &*self.slot.read() {
            ModelSlot::Unloaded => ModelLoadingState::Unloaded,
            ModelSlot::Loading => ModelLoadingState::Loading,
            ModelSlot::Ready(_) => ModelLoadingState::Ready,
            ModelSlot::Failed(reason) => ModelLoadingState::Failed {
                reason: reason.clone(),
            },
        }
    }

    /// Get the loaded handle, failing fast unless the model is `Ready`
    pub fn handle(&self) -> EmbeddingResult<Arc<ModelHandle>> {
        let slot = self.slot.read();
        match &*slot {
            ModelSlot::Ready(handle) => Ok(handle.clone()),
            other => Err(EmbeddingError::ModelNotReady {
                state: other.label(),
            }),
        }
    }

    /// Run `loader` once on a blocking thread and move to `Ready` or `Failed`
    ///
    /// Calling again after `Ready` returns the same handle. Calling while
    /// `Loading` or after `Failed` returns `ModelNotReady`.
    pub async fn load_with<F>(
        &self,
        model_name: &str,
        weights: &str,
        loader: F,
    ) -> EmbeddingResult<Arc<ModelHandle>>
    where
        F: FnOnce() -> EmbeddingResult<Arc<dyn VisionBackend>> + Send + 'static,
    {
        {
            let mut slot = self.slot.write();
            match &*slot {
                ModelSlot::Unloaded => {}
                ModelSlot::Ready(handle) => return Ok(handle.clone()),
                other => {
                    return Err(EmbeddingError::ModelNotReady {
                        state: other.label(),
                    })
                }
            }
            *slot = ModelSlot::Loading;
        }
        let guard = LoadingGuard {
            slot: &self.slot,
            armed: true,
        };

        tracing::info!("Loading model {}/{}", model_name, weights);
        let started = Instant::now();

        let result = match tokio::task::spawn_blocking(loader).await {
            Ok(result) => result,
            Err(e) => Err(EmbeddingError::ModelLoadFailed {
                reason: format!("Task join error: {}", e),
            }),
        };

        guard.disarm();

        match result {
            Ok(backend) => {
                let handle = Arc::new(ModelHandle {
                    backend,
                    model_name: model_name.to_string(),
                    weights: weights.to_string(),
                    loaded_at: Instant::now(),
                });
                *self.slot.write() = ModelSlot::Ready(handle.clone());
                tracing::info!(
                    backend = handle.backend.name(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Loaded model {}/{}",
                    model_name,
                    weights
                );
                Ok(handle)
            }
            Err(e) => {
                let reason = match e {
                    EmbeddingError::ModelLoadFailed { reason } => reason,
                    other => other.to_string(),
                };
                *self.slot.write() = ModelSlot::Failed(reason.clone());
                tracing::error!("Failed to load model {}/{}: {}", model_name, weights, reason);
                Err(EmbeddingError::ModelLoadFailed { reason })
            }
        }
    }
}

/// Moves a slot left in `Loading` to `Failed` if the load future is dropped
struct LoadingGuard<'a> {
    slot: &'a RwLock<ModelSlot>,
    armed: bool,
}

impl LoadingGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut slot = self.slot.write();
        if matches!(*slot, ModelSlot::Loading) {
            tracing::error!("Model load was cancelled before it finished");
            *slot = ModelSlot::Failed("load cancelled".to_string());
        }
    }
}

impl Default for ModelManager {
    fn default() -> Self {
        Self::new()
    }
}
