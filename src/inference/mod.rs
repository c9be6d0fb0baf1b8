//! Inference module for single-image prediction
//!
//! Preprocessing here is identical to training: nearest-neighbour resize to
//! the network input size, then `pixel / 255` in CHW layout.

pub mod predictor;

// Re-export main types for convenience
pub use predictor::{preprocess_image, PredictionResult, Predictor, RankedClass, TOP_K};
