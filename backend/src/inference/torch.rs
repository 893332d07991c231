use std::sync::Mutex;

use log::info;
use ndarray::Array4;
use tch::{CModule, Device, Kind, Tensor};

use super::error::ModelError;
use super::model::{DeviceKind, ForwardPass, InputLayout, ModelConfig};

/// TorchScript model executed through libtorch.
///
/// `CModule` is not `Sync`, so forward passes are serialized behind a mutex.
pub struct TorchModel {
    name: String,
    module: Mutex<CModule>,
    device: Device,
    layout: InputLayout,
    apply_softmax: bool,
}

impl TorchModel {
    pub fn load(config: &ModelConfig) -> Result<Self, ModelError> {
        let device = match config.device {
            DeviceKind::Cpu => Device::Cpu,
            DeviceKind::Cuda => Device::Cuda(0),
            DeviceKind::Auto => Device::cuda_if_available(),
        };

        let mut module =
            CModule::load_on_device(&config.path, device).map_err(|e| ModelError::Load {
                path: config.path.clone(),
                reason: e.to_string(),
            })?;
        module.set_eval();

        info!("Loaded TorchScript model {} on {:?}", config.path, device);

        Ok(Self {
            name: config.path.clone(),
            module: Mutex::new(module),
            device,
            layout: config.input_layout,
            apply_softmax: config.apply_softmax,
        })
    }

    fn to_input_tensor(&self, input: &Array4<f32>) -> Tensor {
        let values: Vec<f32> = input.iter().copied().collect();
        let dims: Vec<i64> = input.shape().iter().map(|&d| d as i64).collect();
        let tensor = Tensor::from_slice(&values).view(dims.as_slice());
        let tensor = match self.layout {
            InputLayout::Nhwc => tensor,
            InputLayout::Nchw => tensor.permute([0, 3, 1, 2]).contiguous(),
        };
        tensor.to_device(self.device)
    }
}

impl ForwardPass for TorchModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&self, input: &Array4<f32>) -> Result<Vec<f32>, ModelError> {
        let tensor = self.to_input_tensor(input);

        let output = {
            let module = self
                .module
                .lock()
                .map_err(|_| ModelError::Forward("model lock poisoned".into()))?;
            tch::no_grad(|| module.forward_ts(&[tensor]))
                .map_err(|e| ModelError::Forward(e.to_string()))?
        };

        let output = if self.apply_softmax {
            output.softmax(-1, Kind::Float)
        } else {
            output.to_kind(Kind::Float)
        };
        let flat = output.to_device(Device::Cpu).view([-1]);
        Vec::<f32>::try_from(&flat).map_err(|e| ModelError::Forward(e.to_string()))
    }
}
