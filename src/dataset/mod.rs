//! Dataset module for banana leaf image handling
//!
//! This module provides functionality for:
//! - Discovering the class folders and their images
//! - The deterministic per-class training/validation split
//! - Geometric data augmentation for training robustness
//! - Burn `Dataset` / `Batcher` implementations

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;
pub mod split;

// Re-export main types for convenience
pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{
    AugmentingBatcher, LeafBatch, LeafBatcher, LeafBurnDataset, LeafItem, RawLeafDataset,
    RawLeafItem,
};
pub use loader::{
    discover_class_names, load_image, resize_for_model, to_chw_tensor_data, DatasetStats,
    ImageSample, LeafDataset, IMAGE_EXTENSIONS,
};
pub use split::DatasetSplit;
