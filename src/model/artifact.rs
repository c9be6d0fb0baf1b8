//! On-disk model artifact.
//!
//! An artifact is two files sharing one path stem:
//! - `<stem>.mpk`: learned weights written by Burn's `CompactRecorder`
//! - `<stem>.json`: [`ArtifactMetadata`], enough to rebuild the network

use std::fs;
use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::cnn::{LeafClassifier, LeafClassifierConfig};
use crate::utils::error::{LeafError, Result};

/// Architecture and provenance stored next to the weights
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMetadata {
    /// Network architecture
    pub config: LeafClassifierConfig,
    /// Class names seen at training time, index = label
    pub class_names: Vec<String>,
    /// RFC 3339 timestamp of when the artifact was written
    pub created_at: String,
    /// Crate version that wrote the artifact
    pub version: String,
}

/// Path of the weights file for an artifact stem (Burn appends `.mpk`)
pub fn weights_path(stem: &Path) -> PathBuf {
    stem.with_extension("mpk")
}

/// Path of the metadata sidecar for an artifact stem
pub fn metadata_path(stem: &Path) -> PathBuf {
    stem.with_extension("json")
}

/// Check whether the weights file of an artifact exists
pub fn artifact_exists<P: AsRef<Path>>(stem: P) -> bool {
    weights_path(stem.as_ref()).is_file()
}

/// Save the model weights and its metadata
pub fn save_artifact<B: Backend, P: AsRef<Path>>(
    model: &LeafClassifier<B>,
    config: &LeafClassifierConfig,
    class_names: &[String],
    stem: P,
) -> Result<()> {
    let stem = stem.as_ref();
    if let Some(parent) = stem.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let recorder = CompactRecorder::new();
    model
        .clone()
        .save_file(stem.to_path_buf(), &recorder)
        .map_err(|e| LeafError::Model(format!("Failed to save weights: {:?}", e)))?;

    let metadata = ArtifactMetadata {
        config: config.clone(),
        class_names: class_names.to_vec(),
        created_at: chrono::Utc::now().to_rfc3339(),
        version: crate::VERSION.to_string(),
    };
    fs::write(metadata_path(stem), serde_json::to_string_pretty(&metadata)?)?;

    info!("Model artifact saved to {:?}", weights_path(stem));
    Ok(())
}

/// Read only the metadata sidecar
pub fn load_metadata<P: AsRef<Path>>(stem: P) -> Result<ArtifactMetadata> {
    let path = metadata_path(stem.as_ref());
    if !path.is_file() {
        return Err(LeafError::PathNotFound(path));
    }
    let json = fs::read_to_string(&path)?;
    Ok(serde_json::from_str(&json)?)
}

/// Rebuild the network from the sidecar and load the weights into it
pub fn load_artifact<B: Backend, P: AsRef<Path>>(
    stem: P,
    device: &B::Device,
) -> Result<(LeafClassifier<B>, ArtifactMetadata)> {
    let stem = stem.as_ref();
    if !artifact_exists(stem) {
        return Err(LeafError::PathNotFound(weights_path(stem)));
    }

    let metadata = load_metadata(stem)?;
    let recorder = CompactRecorder::new();
    let model = metadata
        .config
        .init::<B>(device)?
        .load_file(stem.to_path_buf(), &recorder, device)
        .map_err(|e| LeafError::Model(format!("Failed to load weights: {:?}", e)))?;

    info!(
        "Loaded model artifact {:?} ({} classes)",
        weights_path(stem),
        metadata.config.num_classes
    );
    Ok((model, metadata))
}
