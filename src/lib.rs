//! # Banana Leaf Disease Classification
//!
//! A small Rust library for training and serving a banana leaf disease
//! classifier with the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: Class discovery, train/validation split, augmentation and Burn batching
//! - `model`: The fixed CNN architecture and the on-disk model artifact
//! - `training`: The supervised training loop
//! - `inference`: Preprocessing and single-image prediction
//! - `server`: The upload-form HTTP server
//! - `utils`: Logging, metrics and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use banana_leaf::backend::{default_device, DefaultBackend, TrainingBackend};
//! use banana_leaf::training::{run_training, TrainingConfig};
//! use banana_leaf::inference::Predictor;
//!
//! // Train and write the artifact
//! let history = run_training::<TrainingBackend>(&TrainingConfig::default())?;
//!
//! // Load it back and classify an image
//! let predictor = Predictor::<DefaultBackend>::from_artifact(
//!     banana_leaf::MODEL_ARTIFACT,
//!     banana_leaf::TRAIN_DIR,
//!     default_device(),
//! )?;
//! let result = predictor.predict_path("leaf.jpg".as_ref())?;
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod server;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::{discover_class_names, DatasetSplit, LeafDataset};
pub use inference::{PredictionResult, Predictor};
pub use model::{LeafClassifier, LeafClassifierConfig};
pub use training::{run_training, TrainingConfig, TrainingHistory};
pub use utils::error::{LeafError, Result};

/// Root of the labeled training images (one subdirectory per class)
pub const TRAIN_DIR: &str = "dataset/train";

/// Path stem of the trained model artifact (weights `.mpk` + architecture `.json`)
pub const MODEL_ARTIFACT: &str = "banana_leaf_model";

/// Directory where the server stores uploaded images
pub const UPLOAD_DIR: &str = "static/uploads";

/// Directory served under `/static`
pub const STATIC_DIR: &str = "static";

/// Square input size fed to the network
pub const IMAGE_SIZE: usize = 128;

/// Number of samples per training batch
pub const BATCH_SIZE: usize = 32;

/// Number of passes over the training subset
pub const EPOCHS: usize = 30;

/// Fraction of every class held out for validation
pub const VALIDATION_FRACTION: f64 = 0.2;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
