//! Supervised Training Implementation
//!
//! A custom training loop on Burn's optimizer API: seeded shuffling,
//! augmented training batches, and a gradient-free validation pass after
//! every epoch.

use std::path::{Path, PathBuf};

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use colored::Colorize;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::dataset::{
    AugmentingBatcher, LeafBatch, LeafBatcher, LeafBurnDataset, LeafDataset, RawLeafDataset,
};
use crate::model::{artifact, LeafClassifier, LeafClassifierConfig};
use crate::utils::error::{LeafError, Result};
use crate::utils::logging::TrainingLogger;
use crate::utils::metrics::{AccuracyTracker, EpochMetrics, RunningAverage};

/// Training hyperparameters and paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Root of the labeled images, one subdirectory per class
    pub data_dir: PathBuf,
    /// Path stem of the artifact to write
    pub artifact: PathBuf,
    /// Square input size
    pub image_size: usize,
    /// Samples per batch
    pub batch_size: usize,
    /// Passes over the training subset
    pub epochs: usize,
    /// Adam learning rate
    pub learning_rate: f64,
    /// Fraction of each class held out for validation
    pub validation_fraction: f64,
    /// Seed for shuffling and augmentation
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(crate::TRAIN_DIR),
            artifact: PathBuf::from(crate::MODEL_ARTIFACT),
            image_size: crate::IMAGE_SIZE,
            batch_size: crate::BATCH_SIZE,
            epochs: crate::EPOCHS,
            learning_rate: 1e-3,
            validation_fraction: crate::VALIDATION_FRACTION,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Reject values the loop cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(LeafError::Config("batch_size must be at least 1".into()));
        }
        if self.epochs == 0 {
            return Err(LeafError::Config("epochs must be at least 1".into()));
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0.0 {
            return Err(LeafError::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        Ok(())
    }

    /// Where the per-epoch history is written
    pub fn history_path(&self) -> PathBuf {
        self.artifact.with_extension("history.json")
    }
}

/// Per-epoch metrics of one training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrainingHistory {
    /// Class names in label order
    pub class_names: Vec<String>,
    /// Size of the training subset
    pub train_samples: usize,
    /// Size of the validation subset
    pub validation_samples: usize,
    /// One entry per completed epoch
    pub epochs: Vec<EpochMetrics>,
}

impl TrainingHistory {
    /// Training accuracy of the final epoch
    pub fn last_train_accuracy(&self) -> Option<f64> {
        self.epochs.last().map(|m| m.accuracy)
    }

    /// Validation accuracy of the final epoch
    pub fn last_val_accuracy(&self) -> Option<f64> {
        self.epochs.last().map(|m| m.val_accuracy)
    }

    /// Write the history as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Read a history previously written with [`TrainingHistory::save`]
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

/// Run training with the given configuration
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
///
/// Fails if the data directory is missing, holds no class folders or no
/// images. On success the artifact and the history file are on disk.
pub fn run_training<B>(config: &TrainingConfig) -> Result<TrainingHistory>
where
    B: AutodiffBackend,
{
    config.validate()?;
    println!("{}", "Initializing Training...".green().bold());

    let device = B::Device::default();
    info!("Device: {:?}", device);

    // Load the dataset
    println!("{}", "Loading Dataset...".cyan());
    let dataset = LeafDataset::new(&config.data_dir)?;
    if dataset.num_classes() == 0 {
        return Err(LeafError::Dataset(format!(
            "no class subdirectories found in {:?}",
            config.data_dir
        )));
    }
    if dataset.is_empty() {
        return Err(LeafError::Dataset(format!(
            "no images found under {:?}",
            config.data_dir
        )));
    }

    let class_map = dataset
        .class_names
        .iter()
        .enumerate()
        .map(|(idx, name)| format!("'{}': {}", name, idx))
        .collect::<Vec<_>>()
        .join(", ");
    info!("Detected classes: {{{}}}", class_map);
    dataset.stats().print();

    let split = dataset.split(config.validation_fraction)?;
    info!(
        "Split: {} training / {} validation samples",
        split.train.len(),
        split.validation.len()
    );

    // Create model
    println!();
    println!("{}", "Creating Model...".cyan());
    let model_config =
        LeafClassifierConfig::new(dataset.num_classes()).with_input_size(config.image_size);
    let mut model: LeafClassifier<B> = model_config.init(&device)?;
    info!("Model summary:\n{}", model);
    info!("Total parameters: {}", model.num_params());

    println!();
    println!("{}", "Pre-loading Training Data...".cyan().bold());
    let train_dataset = RawLeafDataset::new_cached(&split.train_pairs(), config.image_size)?;

    println!("{}", "Pre-loading Validation Data...".cyan().bold());
    let val_dataset = LeafBurnDataset::new_cached(&split.validation_pairs(), config.image_size)?;
    if val_dataset.is_empty() {
        warn!("Validation subset is empty; validation metrics will read 0");
    } else {
        debug!(
            "Validation samples per class: {:?}",
            val_dataset.class_distribution(dataset.num_classes())
        );
    }

    let batcher = AugmentingBatcher::new(config.image_size, config.seed);
    let mut optimizer = AdamConfig::new().init();
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  🏷️  Training samples:   {}", train_dataset.len());
    println!("  ✅ Validation samples: {}", val_dataset.len());
    println!("  🔄 Epochs:             {}", config.epochs);
    println!("  📦 Batch size:         {}", config.batch_size);
    println!("  📈 Learning rate:      {}", config.learning_rate);
    println!();
    println!("{}", "Starting Training...".green().bold());

    let mut history = TrainingHistory {
        class_names: dataset.class_names.clone(),
        train_samples: train_dataset.len(),
        validation_samples: val_dataset.len(),
        epochs: Vec::with_capacity(config.epochs),
    };
    let mut logger = TrainingLogger::new(config.epochs);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);

        let mut loss_avg = RunningAverage::new();
        let mut accuracy = AccuracyTracker::new();

        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);
        let num_batches = indices.len().div_ceil(config.batch_size);

        for (batch_idx, chunk) in indices.chunks(config.batch_size).enumerate() {
            let items: Vec<_> = chunk.iter().filter_map(|&i| train_dataset.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch: LeafBatch<B> = batcher.batch(items, &device);
            let output = model.forward(batch.images);
            let loss = loss_fn.forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                return Err(LeafError::Training(format!(
                    "loss diverged to {} at epoch {}, batch {}",
                    loss_value,
                    epoch + 1,
                    batch_idx + 1
                )));
            }
            loss_avg.add(loss_value);
            let (correct, total) = count_correct(output, batch.targets);
            accuracy.add_counts(correct, total);

            // Backward pass and update
            let grads = GradientsParams::from_grads(loss.backward(), &model);
            model = optimizer.step(config.learning_rate, model, grads);

            debug!(
                "Batch {:>4}/{}: loss = {:.4}, running acc = {:.2}%",
                batch_idx + 1,
                num_batches,
                loss_value,
                accuracy.accuracy() * 100.0
            );
        }

        let (val_loss, val_accuracy) =
            evaluate::<B>(&model, &val_dataset, config.batch_size, config.image_size);

        let metrics = EpochMetrics {
            epoch,
            loss: loss_avg.average(),
            accuracy: accuracy.accuracy(),
            val_loss,
            val_accuracy,
        };
        logger.end_epoch(
            metrics.loss,
            metrics.accuracy,
            metrics.val_loss,
            metrics.val_accuracy,
        );
        history.epochs.push(metrics);
    }

    println!();
    println!("{}", "Saving Model...".cyan());
    artifact::save_artifact(&model, &model_config, &dataset.class_names, &config.artifact)?;
    history.save(&config.history_path())?;
    println!("  💾 Saved to: {:?}", artifact::weights_path(&config.artifact));

    let train_acc = history.last_train_accuracy().unwrap_or(0.0);
    let val_acc = history.last_val_accuracy().unwrap_or(0.0);
    logger.log_complete(train_acc, val_acc);

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  🎯 Final training accuracy:   {:.2}%", train_acc * 100.0);
    println!("  🎉 Final validation accuracy: {:.2}%", val_acc * 100.0);

    Ok(history)
}

/// Number of rows whose argmax matches the target
fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> (usize, usize) {
    let [batch_size, _] = output.dims();
    let predictions = output.argmax(1).reshape([batch_size]);
    let correct: i64 = predictions
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem();
    (correct as usize, batch_size)
}

/// Evaluate the model on a dataset without augmentation or gradients
///
/// Returns `(mean loss, accuracy)`; both are zero for an empty dataset.
fn evaluate<B: AutodiffBackend>(
    model: &LeafClassifier<B>,
    dataset: &LeafBurnDataset,
    batch_size: usize,
    image_size: usize,
) -> (f64, f64) {
    let device = <B::InnerBackend as Backend>::Device::default();
    let batcher = LeafBatcher::new(image_size);
    let loss_fn = CrossEntropyLossConfig::new().init(&device);

    let inner_model = model.valid();
    let mut loss_avg = RunningAverage::new();
    let mut accuracy = AccuracyTracker::new();

    let len = dataset.len();
    for start in (0..len).step_by(batch_size) {
        let end = (start + batch_size).min(len);
        let items: Vec<_> = (start..end).filter_map(|i| dataset.get(i)).collect();
        if items.is_empty() {
            continue;
        }

        let batch: LeafBatch<B::InnerBackend> = batcher.batch(items, &device);
        let output = inner_model.forward(batch.images);
        let loss = loss_fn.forward(output.clone(), batch.targets.clone());
        loss_avg.add(loss.into_scalar().elem());

        let (correct, total) = count_correct(output, batch.targets);
        accuracy.add_counts(correct, total);
    }

    (loss_avg.average(), accuracy.accuracy())
}
