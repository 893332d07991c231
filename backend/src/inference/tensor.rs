use ndarray::Array4;
use serde::{Deserialize, Serialize};

/// Spatial input size expected by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSize {
    pub width: u32,
    pub height: u32,
}

impl InputSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Tensor shape for a single image: (1, H, W, 3).
    pub fn tensor_shape(&self) -> [usize; 4] {
        [1, self.height as usize, self.width as usize, 3]
    }
}

impl Default for InputSize {
    fn default() -> Self {
        Self::new(224, 224)
    }
}

/// Normalized image batch in NHWC layout, RGB channel order, values in [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Array4<f32>,
}

impl ImageTensor {
    /// Wraps an arbitrary 4-D array. The shape is checked by the classifier, not here.
    pub fn from_array(data: Array4<f32>) -> Self {
        Self { data }
    }

    pub fn zeros(size: InputSize) -> Self {
        Self::from_array(Array4::zeros(size.tensor_shape()))
    }

    pub fn shape(&self) -> &[usize] {
        self.data.shape()
    }

    pub fn array(&self) -> &Array4<f32> {
        &self.data
    }

    pub fn into_array(self) -> Array4<f32> {
        self.data
    }
}

/// Top-1 outcome of one inference call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: String,
    pub confidence: f32,
}

impl From<PredictionResult> for shared::PredictionResponse {
    fn from(result: PredictionResult) -> Self {
        shared::PredictionResponse {
            predicted_class: result.label,
            confidence_score: result.confidence,
        }
    }
}
