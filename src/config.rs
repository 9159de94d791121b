//! YAML configuration for the scorer.
//!
//! One file names the device, the regression head checkpoint, and the
//! embedding backend. Every field except the paths has a default.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "laion-aesthetic-v2"
//! device: "cpu"
//!
//! regressor:
//!   weights_path: "./models/sac+logos+ava1-l14-linearMSE.pth"
//!   input_dim: 768
//!
//! embedder:
//!   backend: "onnx"
//!   model_path: "./models/clip-vit-large-patch14/vision_model.onnx"
//!   image_size: 224
//!   embedding_dim: 768
//!   intra_threads: 4
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::device::Device;
use crate::regressor::EMBEDDING_DIM;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level scorer configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AestheticConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Placement for both the regressor and the embedder.
    #[serde(default)]
    pub device: Device,

    pub regressor: RegressorConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,
}

impl AestheticConfig {
    /// Configuration with defaults for everything but the checkpoint path.
    pub fn new(weights_path: impl Into<PathBuf>) -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            device: Device::Cpu,
            regressor: RegressorConfig {
                weights_path: weights_path.into(),
                input_dim: EMBEDDING_DIM,
            },
            embedder: EmbedderConfig::default(),
        }
    }

    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: AestheticConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.regressor.validate()?;
        self.embedder.validate()?;

        if self.embedder.embedding_dim != self.regressor.input_dim {
            return Err(ConfigLoadError::Validation(format!(
                "embedder.embedding_dim ({}) must equal regressor.input_dim ({})",
                self.embedder.embedding_dim, self.regressor.input_dim
            )));
        }
        Ok(())
    }
}

/// Regression head checkpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressorConfig {
    /// Safetensors or `.pth` checkpoint holding `layers.{0,2,4,6,7}.{weight,bias}`.
    pub weights_path: PathBuf,

    /// Embedding width the head consumes. The topology is fixed, so only 768
    /// is accepted; the field exists so a mismatched file fails loudly.
    #[serde(default = "default_embedding_dim")]
    pub input_dim: usize,
}

impl RegressorConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.weights_path.as_os_str().is_empty() {
            return Err(ConfigLoadError::Validation(
                "regressor.weights_path must not be empty".to_string(),
            ));
        }
        if self.input_dim != EMBEDDING_DIM {
            return Err(ConfigLoadError::Validation(format!(
                "regressor.input_dim must be {EMBEDDING_DIM}, got {}",
                self.input_dim
            )));
        }
        Ok(())
    }
}

/// Which embedding service to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderBackend {
    /// CLIP vision tower exported to ONNX.
    #[default]
    Onnx,
    /// Deterministic hash-derived vectors; no model file needed.
    Stub,
}

/// Embedding service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedderConfig {
    #[serde(default)]
    pub backend: EmbedderBackend,

    /// ONNX file; required for the `onnx` backend.
    #[serde(default)]
    pub model_path: Option<PathBuf>,

    /// Side of the square crop fed to the vision tower.
    #[serde(default = "default_image_size")]
    pub image_size: u32,

    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,

    /// Graph input name; defaults to the model's first input.
    #[serde(default)]
    pub input_name: Option<String>,

    /// Graph output name; defaults to `image_embeds`, then the first output.
    #[serde(default)]
    pub output_name: Option<String>,

    /// ONNX Runtime intra-op threads.
    #[serde(default = "default_intra_threads")]
    pub intra_threads: usize,
}

impl EmbedderConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.image_size == 0 {
            return Err(ConfigLoadError::Validation(
                "embedder.image_size must be >= 1".to_string(),
            ));
        }
        if self.intra_threads == 0 {
            return Err(ConfigLoadError::Validation(
                "embedder.intra_threads must be >= 1".to_string(),
            ));
        }
        if self.backend == EmbedderBackend::Onnx && self.model_path.is_none() {
            return Err(ConfigLoadError::Validation(
                "embedder.model_path is required when backend is 'onnx'".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            backend: EmbedderBackend::Onnx,
            model_path: Some(PathBuf::from(
                "./models/clip-vit-large-patch14/vision_model.onnx",
            )),
            image_size: default_image_size(),
            embedding_dim: default_embedding_dim(),
            input_name: None,
            output_name: None,
            intra_threads: default_intra_threads(),
        }
    }
}

// Helper functions for serde defaults
fn default_embedding_dim() -> usize {
    EMBEDDING_DIM
}
fn default_image_size() -> u32 {
    224
}
fn default_intra_threads() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_minimal_yaml() {
        let yaml = r#"
version: "1.0"
regressor:
  weights_path: "./head.safetensors"
"#;

        let config = AestheticConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.device, Device::Cpu);
        assert_eq!(config.regressor.input_dim, 768);
        assert_eq!(config.embedder.backend, EmbedderBackend::Onnx);
        assert_eq!(config.embedder.image_size, 224);
        assert_eq!(config.embedder.intra_threads, 1);
        assert!(config.embedder.model_path.is_some());
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1"
device: "cuda:1"
regressor:
  weights_path: "/models/head.safetensors"
embedder:
  backend: "stub"
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = AestheticConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.device, Device::Cuda(1));
        assert_eq!(config.embedder.backend, EmbedderBackend::Stub);
    }

    #[test]
    fn test_full_yaml() {
        let yaml = r#"
version: "1.0"
name: "production"
device: "cpu"
regressor:
  weights_path: "./models/head.safetensors"
  input_dim: 768
embedder:
  backend: "onnx"
  model_path: "./models/vision.onnx"
  image_size: 336
  embedding_dim: 768
  input_name: "pixel_values"
  output_name: "image_embeds"
  intra_threads: 4
"#;

        let config = AestheticConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.name.as_deref(), Some("production"));
        assert_eq!(
            config.embedder.model_path,
            Some(PathBuf::from("./models/vision.onnx"))
        );
        assert_eq!(config.embedder.image_size, 336);
        assert_eq!(config.embedder.input_name.as_deref(), Some("pixel_values"));
        assert_eq!(config.embedder.intra_threads, 4);
    }

    #[test]
    fn test_unsupported_version() {
        let yaml = r#"
version: "2.0"
regressor:
  weights_path: "./head.safetensors"
"#;
        let err = AestheticConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(ref v) if v == "2.0"));
    }

    #[test]
    fn test_input_dim_validation() {
        let yaml = r#"
version: "1.0"
regressor:
  weights_path: "./head.safetensors"
  input_dim: 512
"#;
        let err = AestheticConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("input_dim must be 768"));
    }

    #[test]
    fn test_embedding_dim_must_match_regressor() {
        let yaml = r#"
version: "1.0"
regressor:
  weights_path: "./head.safetensors"
embedder:
  backend: "stub"
  embedding_dim: 1024
"#;
        let err = AestheticConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("embedding_dim"));
    }

    #[test]
    fn test_onnx_backend_requires_model_path() {
        let yaml = r#"
version: "1.0"
regressor:
  weights_path: "./head.safetensors"
embedder:
  backend: "onnx"
  model_path: null
"#;
        let err = AestheticConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("model_path is required"));
    }

    #[test]
    fn test_zero_threads_rejected() {
        let yaml = r#"
version: "1.0"
regressor:
  weights_path: "./head.safetensors"
embedder:
  intra_threads: 0
"#;
        assert!(AestheticConfig::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_bad_device_is_parse_error() {
        let yaml = r#"
version: "1.0"
device: "tpu"
regressor:
  weights_path: "./head.safetensors"
"#;
        let err = AestheticConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigLoadError::YamlParse(_)));
    }

    #[test]
    fn test_missing_regressor_section() {
        let err = AestheticConfig::from_yaml("version: \"1.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::YamlParse(_)));
    }

    #[test]
    fn test_new_is_valid() {
        let config = AestheticConfig::new("./head.safetensors");
        assert!(config.validate().is_ok());
        let yaml = serde_yaml::to_string(&config).unwrap();
        assert_eq!(AestheticConfig::from_yaml(&yaml).unwrap(), config);
    }
}
