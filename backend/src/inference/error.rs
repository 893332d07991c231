use thiserror::Error;

/// Per-request failures of the preprocess + classify pipeline.
///
/// Every variant is terminal for the request that produced it.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Image could not be decoded: {0}")]
    Decode(String),
    #[error("Unsupported color mode: {0}")]
    UnsupportedMode(String),
    #[error("Tensor shape {actual:?} does not match model input {expected:?}")]
    ShapeMismatch {
        expected: [usize; 4],
        actual: Vec<usize>,
    },
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),
    #[error("Inference failed: {0}")]
    Inference(String),
}

impl PipelineError {
    /// Whether the failure was caused by the submitted input rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PipelineError::Decode(_)
                | PipelineError::UnsupportedMode(_)
                | PipelineError::ShapeMismatch { .. }
        )
    }
}

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Failed to load model from {path}: {reason}")]
    Load { path: String, reason: String },
    #[error("Model backend not compiled in: {0}")]
    BackendDisabled(String),
    #[error("Forward pass failed: {0}")]
    Forward(String),
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Forward(msg) => PipelineError::Inference(msg),
            other => PipelineError::ModelUnavailable(other.to_string()),
        }
    }
}
