//! Burn Dataset Integration for banana leaf images
//!
//! This module implements Burn's Dataset trait and Batcher for efficient
//! data loading and batching during training.
//!
//! ## Augmentation Support
//!
//! - `LeafBatcher`: Standard batcher without augmentation (for validation)
//! - `AugmentingBatcher`: Applies on-the-fly augmentation (for training)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::augmentation::Augmenter;
use super::loader::{load_image, to_chw_tensor_data};
use crate::utils::error::Result;

/// A single preprocessed item ready for Burn
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LeafItem {
    /// Image data as flattened CHW float array [3 * H * W]
    pub image: Vec<f32>,
    /// Class label
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl LeafItem {
    /// Create a new item by loading and preprocessing an image
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let rgb = load_image(path, image_size)?;

        Ok(Self {
            image: to_chw_tensor_data(&rgb),
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// A resized but otherwise untouched image
/// Used for on-the-fly augmentation during training
#[derive(Clone)]
pub struct RawLeafItem {
    /// Resized RGB image (not augmented, not normalized)
    pub image: RgbImage,
    /// Class label
    pub label: usize,
    /// Image path (for debugging/logging)
    pub path: String,
}

impl RawLeafItem {
    /// Load and resize an image without converting it to tensor data
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        Ok(Self {
            image: load_image(path, image_size)?,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

impl std::fmt::Debug for RawLeafItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawLeafItem")
            .field("label", &self.label)
            .field("path", &self.path)
            .field(
                "image_size",
                &format!("{}x{}", self.image.width(), self.image.height()),
            )
            .finish()
    }
}

fn progress_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Load every sample in parallel, failing on the first unreadable image
fn load_parallel<T, F>(samples: &[(PathBuf, usize)], load: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(&Path, usize) -> Result<T> + Sync,
{
    let pb = progress_bar(samples.len());
    let loaded = AtomicUsize::new(0);

    let items = samples
        .par_iter()
        .map(|(path, label)| -> Result<T> {
            let item = load(path, *label)?;
            let count = loaded.fetch_add(1, Ordering::Relaxed);
            if count % 100 == 0 {
                pb.set_position(count as u64);
            }
            Ok(item)
        })
        .collect::<Result<Vec<T>>>();

    pb.finish_and_clear();
    items
}

/// Dataset that stores resized images for on-the-fly augmentation
#[derive(Clone)]
pub struct RawLeafDataset {
    /// Cached raw images
    items: Vec<RawLeafItem>,
}

impl std::fmt::Debug for RawLeafDataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawLeafDataset")
            .field("len", &self.items.len())
            .finish()
    }
}

impl RawLeafDataset {
    /// Load all images into memory (resized, un-augmented)
    ///
    /// Fails with [`LeafError::ImageLoad`](crate::LeafError::ImageLoad) if
    /// any file cannot be decoded.
    pub fn new_cached(samples: &[(PathBuf, usize)], image_size: usize) -> Result<Self> {
        info!("Pre-loading {} raw images for augmentation", samples.len());

        let items = load_parallel(samples, |path, label| {
            RawLeafItem::from_path(path, label, image_size)
        })?;

        info!("Loaded {} raw images", items.len());
        Ok(Self { items })
    }
}

impl Dataset<RawLeafItem> for RawLeafDataset {
    fn get(&self, index: usize) -> Option<RawLeafItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// Preprocessed banana leaf images implementing Burn's Dataset trait
#[derive(Debug, Clone)]
pub struct LeafBurnDataset {
    items: Vec<LeafItem>,
}

impl LeafBurnDataset {
    /// Preprocess every image into memory
    ///
    /// Fails with [`LeafError::ImageLoad`](crate::LeafError::ImageLoad) if
    /// any file cannot be decoded.
    pub fn new_cached(samples: &[(PathBuf, usize)], image_size: usize) -> Result<Self> {
        info!("Pre-loading {} images into memory (parallel)", samples.len());

        let items = load_parallel(samples, |path, label| {
            LeafItem::from_path(path, label, image_size)
        })?;

        info!("Loaded {} images", items.len());
        Ok(Self { items })
    }

    /// Get samples per class count
    pub fn class_distribution(&self, num_classes: usize) -> Vec<usize> {
        let mut counts = vec![0usize; num_classes];
        for item in &self.items {
            if let Some(count) = counts.get_mut(item.label) {
                *count += 1;
            }
        }
        counts
    }
}

impl Dataset<LeafItem> for LeafBurnDataset {
    fn get(&self, index: usize) -> Option<LeafItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of banana leaf images
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

fn build_batch<B: Backend>(
    images_data: Vec<f32>,
    targets_data: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> LeafBatch<B> {
    let batch_size = targets_data.len();

    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(images_data, [batch_size, 3, image_size, image_size]),
        device,
    );
    let targets =
        Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

    LeafBatch { images, targets }
}

/// Batcher for preprocessed items (validation)
#[derive(Clone, Debug)]
pub struct LeafBatcher {
    image_size: usize,
}

impl LeafBatcher {
    /// Create a batcher for the given input size
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let images_data: Vec<f32> = items.into_iter().flat_map(|item| item.image).collect();

        build_batch(images_data, targets_data, self.image_size, device)
    }
}

/// Batcher that applies on-the-fly augmentation to raw images
///
/// Every batch gets its own RNG derived from the base seed and a running
/// batch counter, so a run with the same seed sees the same augmentations.
#[derive(Clone, Debug)]
pub struct AugmentingBatcher {
    image_size: usize,
    augmenter: Augmenter,
    seed: u64,
    batches_seen: Arc<AtomicU64>,
}

impl AugmentingBatcher {
    /// Create a new augmenting batcher with the default augmentation
    pub fn new(image_size: usize, seed: u64) -> Self {
        Self {
            image_size,
            augmenter: Augmenter::with_defaults(),
            seed,
            batches_seen: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_rng(&self) -> ChaCha8Rng {
        let batch = self.batches_seen.fetch_add(1, Ordering::Relaxed);
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        rng.set_stream(batch);
        rng
    }
}

impl<B: Backend> Batcher<B, RawLeafItem, LeafBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<RawLeafItem>, device: &B::Device) -> LeafBatch<B> {
        let mut rng = self.next_rng();

        let mut images_data = Vec::with_capacity(items.len() * 3 * self.image_size * self.image_size);
        let mut targets_data = Vec::with_capacity(items.len());

        for item in items {
            images_data.extend(self.augmenter.preprocess(&item.image, Some(&mut rng)));
            targets_data.push(item.label as i64);
        }

        build_batch(images_data, targets_data, self.image_size, device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::LeafError;
    use burn::backend::NdArray;
    use image::Rgb;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn raw_item(label: usize, value: u8) -> RawLeafItem {
        RawLeafItem {
            image: RgbImage::from_pixel(8, 8, Rgb([value, value, value])),
            label,
            path: format!("item{}.png", label),
        }
    }

    #[test]
    fn test_leaf_batcher_shapes() {
        let device = Default::default();
        let items = vec![
            LeafItem {
                image: vec![0.5; 3 * 8 * 8],
                label: 1,
                path: "a.png".into(),
            },
            LeafItem {
                image: vec![0.25; 3 * 8 * 8],
                label: 0,
                path: "b.png".into(),
            },
        ];

        let batch: LeafBatch<TestBackend> = LeafBatcher::new(8).batch(items, &device);
        assert_eq!(batch.images.dims(), [2, 3, 8, 8]);
        assert_eq!(batch.targets.dims(), [2]);

        let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![1, 0]);
    }

    #[test]
    fn test_augmenting_batcher_keeps_labels_and_range() {
        let device = Default::default();
        let batcher = AugmentingBatcher::new(8, 42);
        let items = vec![raw_item(2, 10), raw_item(0, 200), raw_item(1, 90)];

        let batch: LeafBatch<TestBackend> = batcher.batch(items, &device);
        assert_eq!(batch.images.dims(), [3, 3, 8, 8]);

        let targets = batch.targets.into_data().to_vec::<i64>().unwrap();
        assert_eq!(targets, vec![2, 0, 1]);

        // Uniform images stay uniform under any geometric transform
        let values = batch.images.into_data().to_vec::<f32>().unwrap();
        let first = &values[..3 * 64];
        assert!(first.iter().all(|v| (v - 10.0 / 255.0).abs() < 1e-6));
    }

    #[test]
    fn test_augmenting_batcher_seeded_sequence_repeats() {
        let device = Default::default();
        let mut img = RgbImage::new(8, 8);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 30) as u8, (y * 30) as u8, 0]);
        }
        let item = RawLeafItem {
            image: img,
            label: 0,
            path: "grad.png".into(),
        };

        let run = || {
            let batcher = AugmentingBatcher::new(8, 7);
            (0..3)
                .map(|_| {
                    let batch: LeafBatch<TestBackend> = batcher.batch(vec![item.clone()], &device);
                    batch.images.into_data().to_vec::<f32>().unwrap()
                })
                .collect::<Vec<_>>()
        };

        assert_eq!(run(), run());
    }

    #[test]
    fn test_cached_datasets_load_every_image() {
        let dir = TempDir::new().unwrap();
        let red = dir.path().join("red.png");
        let blue = dir.path().join("blue.png");
        RgbImage::from_pixel(4, 4, Rgb([255, 0, 0])).save(&red).unwrap();
        RgbImage::from_pixel(4, 4, Rgb([0, 0, 255])).save(&blue).unwrap();

        let samples = vec![(red, 0), (blue, 2)];
        let dataset = LeafBurnDataset::new_cached(&samples, 16).unwrap();
        assert_eq!(dataset.len(), 2);
        let first = dataset.get(0).unwrap();
        assert_eq!(first.image.len(), 3 * 16 * 16);
        assert_eq!(first.image[0], 1.0);
        assert_eq!(dataset.get(1).unwrap().label, 2);
        assert!(dataset.get(2).is_none());
        assert_eq!(dataset.class_distribution(3), vec![1, 0, 1]);

        let raw = RawLeafDataset::new_cached(&samples, 16).unwrap();
        assert_eq!(raw.len(), 2);
        assert_eq!(raw.get(0).unwrap().image.dimensions(), (16, 16));
    }

    #[test]
    fn test_cached_datasets_fail_on_unreadable_file() {
        let dir = TempDir::new().unwrap();
        let good = dir.path().join("good.png");
        let bad = dir.path().join("bad.png");
        RgbImage::from_pixel(4, 4, Rgb([1, 2, 3])).save(&good).unwrap();
        std::fs::write(&bad, b"nope").unwrap();

        let samples = vec![(good, 0), (bad.clone(), 1)];
        match LeafBurnDataset::new_cached(&samples, 16) {
            Err(LeafError::ImageLoad(path, _)) => assert_eq!(path, bad),
            other => panic!("expected ImageLoad error, got {:?}", other),
        }
        assert!(matches!(
            RawLeafDataset::new_cached(&samples, 16),
            Err(LeafError::ImageLoad(_, _))
        ));
    }
}
