pub mod classifier;
pub mod error;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod service;
pub mod tensor;
#[cfg(feature = "torch")]
pub mod torch;

#[cfg(test)]
pub(crate) mod fixtures;

pub use classifier::Classifier;
pub use error::{ModelError, PipelineError};
pub use labels::LabelSet;
pub use model::{ForwardPass, ModelConfig, load_model};
pub use preprocess::{Preprocessor, ResizeFilter};
pub use service::InferenceService;
pub use tensor::{ImageTensor, InputSize, PredictionResult};
