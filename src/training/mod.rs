//! Training module
//!
//! Fits the CNN on the training subset with Adam and cross-entropy loss,
//! evaluates on the validation subset after every epoch, and writes the
//! model artifact plus a JSON history of the per-epoch metrics.

pub mod supervised;

// Re-export main types for convenience
pub use crate::utils::metrics::EpochMetrics;
pub use supervised::{run_training, TrainingConfig, TrainingHistory};
