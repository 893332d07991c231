use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::inference::model::{DeviceKind, ModelConfig};
use crate::inference::{InputSize, ResizeFilter};

pub const CONFIG_PATH_ENV: &str = "RICEGRAIN_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/classifier.yaml";
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("Label set has {labels} entries but the model produces {outputs} scores")]
    LabelWidthMismatch { labels: usize, outputs: usize },
    #[error("Model check failed: {0}")]
    ModelCheck(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub version: u32,
    pub model: ModelConfig,
    pub labels: Vec<String>,
    pub image: ImageConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    /// `[width, height]`
    pub size: Vec<u32>,
    pub resize_filter: ResizeFilter,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    pub analysed_dir: PathBuf,
    pub static_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
    pub persist_uploads: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            model: ModelConfig::default(),
            labels: shared::RiceVariety::default_labels(),
            image: ImageConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            size: vec![224, 224],
            resize_filter: ResizeFilter::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            upload_dir: PathBuf::from("uploads"),
            analysed_dir: PathBuf::from("analysed"),
            static_dir: None,
            max_upload_bytes: 10 * 1024 * 1024,
            persist_uploads: true,
        }
    }
}

impl AppConfig {
    /// Reads the YAML file named by `RICEGRAIN_CONFIG` (or the default path),
    /// then applies environment overrides. A missing file means built-in defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = if Path::new(&path).exists() {
            log::info!("Loading configuration from {}", path);
            Self::from_file(&path)?
        } else {
            log::warn!("Config file {} not found, using defaults", path);
            Self::default()
        };
        config.apply_env_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml(&config_str)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn apply_env_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("PORT").and_then(|p| p.parse().ok()) {
            self.server.port = port;
        }
        if let Some(host) = lookup("HOST") {
            self.server.host = host;
        }
        if let Some(path) = lookup("MODEL_PATH") {
            self.model.path = path;
        }
        if let Some(device) = lookup("MODEL_DEVICE") {
            match serde_yaml::from_str::<DeviceKind>(&device) {
                Ok(device) => self.model.device = device,
                Err(_) => log::warn!("Ignoring unknown MODEL_DEVICE value '{}'", device),
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}, expected {}",
                self.version, CONFIG_VERSION
            )));
        }
        self.input_size()?;
        crate::inference::LabelSet::new(self.labels.clone())?;
        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_upload_bytes must be positive".into(),
            ));
        }
        Ok(())
    }

    pub fn input_size(&self) -> Result<InputSize, ConfigError> {
        match self.image.size.as_slice() {
            [width, height] if *width > 0 && *height > 0 => Ok(InputSize::new(*width, *height)),
            other => Err(ConfigError::Invalid(format!(
                "image.size must be [width, height] with positive values, got {:?}",
                other
            ))),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
