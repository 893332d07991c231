use std::io::Cursor;
use std::sync::Mutex;

use image::{DynamicImage, ImageFormat};
use ndarray::Array4;

use super::error::ModelError;
use super::model::ForwardPass;

pub(crate) fn encode_png(image: DynamicImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    image.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

/// Model stand-in that returns a configurable score vector.
pub(crate) struct FixedModel {
    scores: Mutex<Vec<f32>>,
    failure: Mutex<Option<String>>,
}

impl FixedModel {
    pub(crate) fn new(scores: Vec<f32>) -> Self {
        Self {
            scores: Mutex::new(scores),
            failure: Mutex::new(None),
        }
    }

    pub(crate) fn set_scores(&self, scores: Vec<f32>) {
        *self.scores.lock().unwrap() = scores;
    }

    pub(crate) fn fail_next(&self, reason: &str) {
        *self.failure.lock().unwrap() = Some(reason.to_string());
    }
}

impl ForwardPass for FixedModel {
    fn name(&self) -> &str {
        "fixed"
    }

    fn forward(&self, _input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        if let Some(reason) = self.failure.lock().unwrap().take() {
            return Err(ModelError::Forward(reason));
        }
        Ok(self.scores.lock().unwrap().clone())
    }
}
