//! Training / validation split
//!
//! Every class contributes its first `floor(n * fraction)` samples (in
//! listing order) to validation and the rest to training. The split is fully
//! deterministic, no shuffling happens here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::loader::ImageSample;
use crate::utils::error::{LeafError, Result};

/// Deterministic per-class split of a dataset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetSplit {
    /// Samples used for gradient updates
    pub train: Vec<ImageSample>,
    /// Held-out samples used for per-epoch evaluation
    pub validation: Vec<ImageSample>,
}

impl DatasetSplit {
    /// Split `samples` per class.
    ///
    /// `samples` must be grouped by class and sorted within a class, as
    /// produced by [`LeafDataset::new`](super::LeafDataset::new).
    pub fn from_samples(
        samples: &[ImageSample],
        num_classes: usize,
        validation_fraction: f64,
    ) -> Result<Self> {
        if !(0.0..1.0).contains(&validation_fraction) {
            return Err(LeafError::Config(format!(
                "validation fraction must be in [0, 1), got {}",
                validation_fraction
            )));
        }

        let mut per_class: Vec<Vec<&ImageSample>> = vec![Vec::new(); num_classes];
        for sample in samples {
            let bucket = per_class.get_mut(sample.label).ok_or_else(|| {
                LeafError::Dataset(format!(
                    "sample {:?} has label {} but only {} classes exist",
                    sample.path, sample.label, num_classes
                ))
            })?;
            bucket.push(sample);
        }

        let mut split = DatasetSplit::default();
        for class_samples in per_class {
            let n_val = (class_samples.len() as f64 * validation_fraction).floor() as usize;
            let (val, train) = class_samples.split_at(n_val);
            split.validation.extend(val.iter().map(|s| (*s).clone()));
            split.train.extend(train.iter().map(|s| (*s).clone()));
        }

        Ok(split)
    }

    /// (path, label) pairs of the training subset
    pub fn train_pairs(&self) -> Vec<(PathBuf, usize)> {
        to_pairs(&self.train)
    }

    /// (path, label) pairs of the validation subset
    pub fn validation_pairs(&self) -> Vec<(PathBuf, usize)> {
        to_pairs(&self.validation)
    }
}

fn to_pairs(samples: &[ImageSample]) -> Vec<(PathBuf, usize)> {
    samples.iter().map(|s| (s.path.clone(), s.label)).collect()
}
