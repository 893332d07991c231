use std::sync::Arc;

use log::{debug, info};

use super::error::PipelineError;
use super::labels::LabelSet;
use super::model::ForwardPass;
use super::tensor::{ImageTensor, InputSize, PredictionResult};
use crate::config::ConfigError;

/// Scores tensors against a shared model and applies the top-1 decision rule.
pub struct Classifier {
    model: Arc<dyn ForwardPass>,
    labels: LabelSet,
    input: InputSize,
}

impl Classifier {
    /// Binds a model to its label set.
    ///
    /// Runs one forward pass on a zero tensor so a label list that does not
    /// match the model's output width is rejected before any request is served.
    pub fn new(
        model: Arc<dyn ForwardPass>,
        labels: LabelSet,
        input: InputSize,
    ) -> Result<Self, ConfigError> {
        let sample = ImageTensor::zeros(input);
        let width = model
            .forward(sample.array())
            .map_err(|e| ConfigError::ModelCheck(e.to_string()))?
            .len();

        if width != labels.len() {
            return Err(ConfigError::LabelWidthMismatch {
                labels: labels.len(),
                outputs: width,
            });
        }

        info!(
            "Classifier ready: model={} input={}x{} classes={}",
            model.name(),
            input.width,
            input.height,
            labels.len()
        );

        Ok(Self {
            model,
            labels,
            input,
        })
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }

    pub fn input_size(&self) -> InputSize {
        self.input
    }

    /// Raw output vector for a tensor, after shape and sanity checks.
    pub fn scores(&self, tensor: &ImageTensor) -> Result<Vec<f32>, PipelineError> {
        let expected = self.input.tensor_shape();
        if tensor.shape() != expected.as_slice() {
            return Err(PipelineError::ShapeMismatch {
                expected,
                actual: tensor.shape().to_vec(),
            });
        }

        let scores = self.model.forward(tensor.array())?;

        if scores.len() != self.labels.len() {
            return Err(PipelineError::Inference(format!(
                "model returned {} scores for {} labels",
                scores.len(),
                self.labels.len()
            )));
        }
        if let Some(bad) = scores
            .iter()
            .find(|s| !s.is_finite() || !(0.0..=1.0).contains(*s))
        {
            return Err(PipelineError::Inference(format!(
                "model output {} is not a probability",
                bad
            )));
        }
        Ok(scores)
    }

    pub fn classify(&self, tensor: &ImageTensor) -> Result<PredictionResult, PipelineError> {
        let scores = self.scores(tensor)?;
        debug!("Class scores: {:?}", scores);

        let (index, confidence) = top1(&scores)
            .ok_or_else(|| PipelineError::Inference("model returned no scores".into()))?;
        let label = self
            .labels
            .get(index)
            .ok_or_else(|| PipelineError::Inference(format!("no label for index {}", index)))?;

        Ok(PredictionResult {
            label: label.to_string(),
            confidence,
        })
    }
}

/// Argmax over `scores`; ties resolve to the lowest index.
pub fn top1(scores: &[f32]) -> Option<(usize, f32)> {
    scores
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, s)| match best {
            Some((_, b)) if s <= b => best,
            _ => Some((i, s)),
        })
}
