//! Error Handling Module
//!
//! Defines the error type shared by the trainer, the predictor and the server.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for banana leaf operations
#[derive(Error, Debug)]
pub enum LeafError {
    /// A required file or directory is missing
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),

    /// Error loading or decoding an image
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error with dataset operations
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Error with model construction, saving or loading
    #[error("Model error: {0}")]
    Model(String),

    /// Error with training
    #[error("Training error: {0}")]
    Training(String),

    /// Error with inference
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for LeafError {
    fn from(err: serde_json::Error) -> Self {
        LeafError::Serialization(err.to_string())
    }
}

/// Convenience Result type for banana leaf operations
pub type Result<T> = std::result::Result<T, LeafError>;

/// Extension trait for attaching a path to image decoding failures
pub trait ImageResultExt<T> {
    /// Map any error into [`LeafError::ImageLoad`] for the given path
    fn for_image(self, path: &std::path::Path) -> Result<T>;
}

impl<T, E: std::fmt::Display> ImageResultExt<T> for std::result::Result<T, E> {
    fn for_image(self, path: &std::path::Path) -> Result<T> {
        self.map_err(|e| LeafError::ImageLoad(path.to_path_buf(), e.to_string()))
    }
}
