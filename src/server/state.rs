//! Application state for the upload server
//!
//! Holds the loaded predictor and the directories the handlers touch.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::inference::{PredictionResult, Predictor};
use crate::utils::error::{LeafError, Result};

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Directory served under `/static`; uploads go to its `uploads/` child
    pub static_dir: PathBuf,
    /// Path stem of the trained model artifact
    pub artifact: PathBuf,
    /// Training root the class labels are derived from
    pub train_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            static_dir: PathBuf::from(crate::STATIC_DIR),
            artifact: PathBuf::from(crate::MODEL_ARTIFACT),
            train_dir: PathBuf::from(crate::TRAIN_DIR),
        }
    }
}

impl ServerConfig {
    /// Where uploads are written
    pub fn upload_dir(&self) -> PathBuf {
        self.static_dir.join("uploads")
    }

    /// `host:port` to bind
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Shared application state
pub struct AppState<B: Backend> {
    pub config: ServerConfig,
    labels: Vec<String>,
    predictor: Mutex<Predictor<B>>,
}

impl<B: Backend> AppState<B> {
    /// Wrap an already constructed predictor
    pub fn new(config: ServerConfig, predictor: Predictor<B>) -> Self {
        Self {
            config,
            labels: predictor.labels().to_vec(),
            predictor: Mutex::new(predictor),
        }
    }

    /// Run the startup sequence: create the upload directory, then load the
    /// artifact and derive the labels from the training root.
    pub fn load(config: ServerConfig, device: B::Device) -> Result<Self> {
        std::fs::create_dir_all(config.upload_dir())?;

        let predictor = Predictor::<B>::from_artifact(&config.artifact, &config.train_dir, device)?;
        info!("Class names: {:?}", predictor.labels());

        Ok(Self::new(config, predictor))
    }

    /// Class labels, index = model output
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Classify an image file with the shared model
    pub fn predict(&self, path: &Path) -> Result<PredictionResult> {
        let predictor = self
            .predictor
            .lock()
            .map_err(|_| LeafError::Inference("predictor lock poisoned".into()))?;
        predictor.predict_path(path)
    }
}

/// Type alias for shared state
pub type SharedState<B> = Arc<AppState<B>>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{save_artifact, LeafClassifierConfig};
    use burn::backend::NdArray;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr(), "127.0.0.1:5000");
        assert_eq!(config.upload_dir(), PathBuf::from(crate::UPLOAD_DIR));
    }

    #[test]
    fn test_load_without_model_creates_upload_dir_then_fails() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            static_dir: dir.path().join("static"),
            artifact: dir.path().join("banana_leaf_model"),
            train_dir: dir.path().join("dataset/train"),
            ..ServerConfig::default()
        };

        let result = AppState::<NdArray>::load(config.clone(), Default::default());
        assert!(matches!(result, Err(LeafError::PathNotFound(_))));
        assert!(config.upload_dir().is_dir());
    }

    #[test]
    fn test_load_without_training_root_fails() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            static_dir: dir.path().join("static"),
            artifact: dir.path().join("banana_leaf_model"),
            train_dir: dir.path().join("dataset/train"),
            ..ServerConfig::default()
        };

        let device = Default::default();
        let model_config = LeafClassifierConfig::new(2)
            .with_input_size(16)
            .with_conv_filters(vec![4])
            .with_hidden_units(8);
        let model = model_config.init::<NdArray>(&device).unwrap();
        let classes = vec!["Cordana".to_string(), "Healthy".to_string()];
        save_artifact(&model, &model_config, &classes, &config.artifact).unwrap();

        let result = AppState::<NdArray>::load(config.clone(), device);
        match result {
            Err(LeafError::PathNotFound(path)) => assert_eq!(path, config.train_dir),
            Err(other) => panic!("expected PathNotFound, got {}", other),
            Ok(_) => panic!("startup must fail without a training root"),
        }
    }

    #[test]
    fn test_load_takes_labels_from_training_root() {
        let dir = TempDir::new().unwrap();
        let config = ServerConfig {
            static_dir: dir.path().join("static"),
            artifact: dir.path().join("banana_leaf_model"),
            train_dir: dir.path().join("dataset/train"),
            ..ServerConfig::default()
        };
        for class in ["Healthy", "Cordana"] {
            std::fs::create_dir_all(config.train_dir.join(class)).unwrap();
        }

        let device = Default::default();
        let model_config = LeafClassifierConfig::new(2)
            .with_input_size(16)
            .with_conv_filters(vec![4])
            .with_hidden_units(8);
        let model = model_config.init::<NdArray>(&device).unwrap();
        let classes = vec!["Cordana".to_string(), "Healthy".to_string()];
        save_artifact(&model, &model_config, &classes, &config.artifact).unwrap();

        let state = AppState::<NdArray>::load(config, device).unwrap();
        assert_eq!(state.labels(), classes.as_slice());
    }
}
