//! Model module for the CNN architecture using the Burn framework
//!
//! This module provides:
//! - The fixed banana leaf CNN and its configuration
//! - Saving and loading the trained model artifact

pub mod artifact;
pub mod cnn;

// Re-export main types for convenience
pub use artifact::{artifact_exists, load_artifact, save_artifact, ArtifactMetadata};
pub use cnn::{LeafClassifier, LeafClassifierConfig};
