use std::sync::Arc;

use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::error::ModelError;

/// A loaded, read-only model that maps one NHWC batch to a score vector.
///
/// Implementations must tolerate concurrent calls from several worker threads,
/// either because the backend is reentrant or by serializing internally.
pub trait ForwardPass: Send + Sync {
    fn name(&self) -> &str;

    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError>;
}

/// Memory layout the exported model expects for its input tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputLayout {
    #[default]
    Nhwc,
    Nchw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Cpu,
    Cuda,
    #[default]
    Auto,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub path: String,
    pub device: DeviceKind,
    pub input_layout: InputLayout,
    pub apply_softmax: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: "model/rice_classifier.pt".to_string(),
            device: DeviceKind::Auto,
            input_layout: InputLayout::Nhwc,
            apply_softmax: false,
        }
    }
}

/// Loads the configured model backend once at startup.
#[cfg(feature = "torch")]
pub fn load_model(config: &ModelConfig) -> Result<Arc<dyn ForwardPass>, ModelError> {
    let model = super::torch::TorchModel::load(config)?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "torch"))]
pub fn load_model(config: &ModelConfig) -> Result<Arc<dyn ForwardPass>, ModelError> {
    Err(ModelError::BackendDisabled(format!(
        "cannot load {}: rebuild with `--features torch`",
        config.path
    )))
}

/// Startup warning for builds that cannot serve predictions.
pub fn backend_hint() -> Option<&'static str> {
    if cfg!(feature = "torch") {
        None
    } else {
        Some("built without a model backend; run with `cargo run --features torch` (needs libtorch)")
    }
}

/// Numerically stable softmax over a score vector.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
