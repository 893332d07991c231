use std::sync::Arc;

use super::classifier::Classifier;
use super::error::PipelineError;
use super::preprocess::Preprocessor;
use super::tensor::PredictionResult;

/// Host-facing entry point: raw image bytes in, top-1 prediction out.
///
/// Cloning is cheap; all clones share the same read-only classifier.
#[derive(Clone)]
pub struct InferenceService {
    preprocessor: Preprocessor,
    classifier: Result<Arc<Classifier>, String>,
}

impl InferenceService {
    pub fn new(preprocessor: Preprocessor, classifier: Arc<Classifier>) -> Self {
        Self {
            preprocessor,
            classifier: Ok(classifier),
        }
    }

    /// A service whose model failed to load. Every prediction reports `ModelUnavailable`.
    pub fn unavailable(preprocessor: Preprocessor, reason: impl Into<String>) -> Self {
        Self {
            preprocessor,
            classifier: Err(reason.into()),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.classifier.is_ok()
    }

    pub fn labels(&self) -> Vec<String> {
        match &self.classifier {
            Ok(classifier) => classifier.labels().to_vec(),
            Err(_) => Vec::new(),
        }
    }

    pub fn predict(&self, raw: &[u8]) -> Result<PredictionResult, PipelineError> {
        let classifier = self
            .classifier
            .as_ref()
            .map_err(|reason| PipelineError::ModelUnavailable(reason.clone()))?;

        let tensor = self.preprocessor.preprocess(raw)?;
        classifier.classify(&tensor)
    }
}
