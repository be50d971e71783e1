//! Inference backends
//!
//! A backend turns a preprocessed `[1, 3, H, W]` tensor into a raw feature
//! vector. The production backend runs an exported CLIP vision tower through
//! ONNX Runtime; the trait keeps the embedder independent of that runtime.

use std::path::Path;
use std::sync::Arc;

use ndarray::{Array4, CowArray};
use ort::tensor::OrtOwnedTensor;
use ort::{Environment, ExecutionProvider, GraphOptimizationLevel, Session, SessionBuilder, Value};

use super::config::EmbeddingConfig;
use super::error::{EmbeddingError, EmbeddingResult};

/// Read-only inference backend shared by all embed calls
pub trait VisionBackend: Send + Sync {
    /// Run the model on a preprocessed NCHW tensor and return the raw features
    fn infer(&self, pixels: Array4<f32>) -> EmbeddingResult<Vec<f32>>;

    /// Human-readable backend name for logs
    fn name(&self) -> &str;
}

/// ONNX Runtime backend
pub struct OnnxBackend {
    session: Session,
    _environment: Arc<Environment>,
}

impl OnnxBackend {
    /// Create an ONNX session for the model described by `config`
    pub fn from_config(config: &EmbeddingConfig) -> EmbeddingResult<Self> {
        let model_path = config.model_path();
        Self::from_file(&model_path, config.use_gpu, config.intra_threads)
    }

    /// Create an ONNX session from an explicit model file
    pub fn from_file(model_path: &Path, use_gpu: bool, intra_threads: i16) -> EmbeddingResult<Self> {
        if !model_path.exists() {
            return Err(EmbeddingError::ModelLoadFailed {
                reason: format!("model file not found: {}", model_path.display()),
            });
        }

        let mut providers = Vec::new();
        if cfg!(feature = "cuda") && use_gpu {
            providers.push(ExecutionProvider::CUDA(Default::default()));
        }
        providers.push(ExecutionProvider::CPU(Default::default()));

        let environment = Environment::builder()
            .with_name("ip-lens")
            .with_execution_providers(providers)
            .build()?
            .into_arc();

        let session = SessionBuilder::new(&environment)?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(intra_threads)?
            .with_model_from_file(model_path)?;

        tracing::debug!(
            inputs = session.inputs.len(),
            outputs = session.outputs.len(),
            "Created ONNX session from {:?}",
            model_path
        );

        Ok(Self {
            session,
            _environment: environment,
        })
    }
}

impl VisionBackend for OnnxBackend {
    fn infer(&self, pixels: Array4<f32>) -> EmbeddingResult<Vec<f32>> {
        let input = CowArray::from(pixels.into_dyn());
        let value = Value::from_array(self.session.allocator(), &input)?;

        let outputs = self.session.run(vec![value])?;
        let output = outputs.first().ok_or_else(|| EmbeddingError::InferenceFailed {
            reason: "model produced no outputs".to_string(),
        })?;

        let tensor: OrtOwnedTensor<f32, _> = output.try_extract()?;
        let view = tensor.view();
        let shape = view.shape().to_vec();

        // Accept [D] or [1, D]; anything else is not an image embedding.
        match shape.as_slice() {
            [_] | [1, _] => Ok(view.iter().copied().collect()),
            other => Err(EmbeddingError::InferenceFailed {
                reason: format!("unexpected output shape {:?}", other),
            }),
        }
    }

    fn name(&self) -> &str {
        "onnx"
    }
}
