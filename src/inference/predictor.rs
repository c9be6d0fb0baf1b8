//! Inference Predictor Module
//!
//! Loads a trained artifact and classifies single images with exactly the
//! preprocessing used during training.

use std::path::Path;
use std::time::{Duration, Instant};

use burn::tensor::{backend::Backend, Tensor, TensorData};
use image::{DynamicImage, ImageReader};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::{discover_class_names, resize_for_model, to_chw_tensor_data};
use crate::model::{artifact, LeafClassifier};
use crate::utils::error::{ImageResultExt, LeafError, Result};

/// Number of ranked classes kept in a [`PredictionResult`]
pub const TOP_K: usize = 5;

/// Resize to the network input and convert to CHW `[0, 1]` floats
pub fn preprocess_image(img: &DynamicImage, image_size: usize) -> Vec<f32> {
    to_chw_tensor_data(&resize_for_model(img, image_size))
}

/// One entry of the ranked class list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedClass {
    pub index: usize,
    pub label: String,
    pub probability: f32,
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted class index
    pub predicted_class: usize,

    /// Predicted class name
    pub label: String,

    /// Probability of the predicted class
    pub confidence: f32,

    /// Full probability distribution over all classes
    pub probabilities: Vec<f32>,

    /// Highest-probability classes, best first
    pub top_k: Vec<RankedClass>,

    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Create a new prediction result
    ///
    /// The predicted class is the argmax of `probabilities`; on ties the
    /// lowest index wins. `labels` must have one entry per probability.
    pub fn new(probabilities: Vec<f32>, labels: &[String], inference_time: Duration) -> Self {
        let mut predicted_class = 0;
        let mut confidence = f32::NEG_INFINITY;
        for (idx, &p) in probabilities.iter().enumerate() {
            if p > confidence {
                predicted_class = idx;
                confidence = p;
            }
        }
        if !confidence.is_finite() {
            confidence = 0.0;
        }

        let label_of = |idx: usize| {
            labels
                .get(idx)
                .cloned()
                .unwrap_or_else(|| format!("class {}", idx))
        };

        // Stable sort keeps lower indices first among equal probabilities
        let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

        let top_k = indexed
            .into_iter()
            .take(TOP_K)
            .map(|(index, probability)| RankedClass {
                index,
                label: label_of(index),
                probability,
            })
            .collect();

        Self {
            predicted_class,
            label: label_of(predicted_class),
            confidence,
            probabilities,
            top_k,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        }
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        output.push_str(&format!(
            "Prediction: {} (class {})\n",
            self.label, self.predicted_class
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str(&format!("\nTop-{} predictions:\n", self.top_k.len()));
        for (i, ranked) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (class {}) - {:.2}%\n",
                i + 1,
                ranked.label,
                ranked.index,
                ranked.probability * 100.0
            ));
        }

        output
    }
}

/// Predictor for running inference with a trained model
pub struct Predictor<B: Backend> {
    model: LeafClassifier<B>,
    labels: Vec<String>,
    image_size: usize,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Wrap a model with its label list
    ///
    /// Fails when the label count differs from the model's output size.
    pub fn new(
        model: LeafClassifier<B>,
        labels: Vec<String>,
        image_size: usize,
        device: B::Device,
    ) -> Result<Self> {
        if labels.len() != model.num_classes() {
            return Err(LeafError::Config(format!(
                "found {} class folders but the model predicts {} classes; retrain the model",
                labels.len(),
                model.num_classes()
            )));
        }

        Ok(Self {
            model,
            labels,
            image_size,
            device,
        })
    }

    /// Load the artifact at `stem` and take the labels from `train_dir`
    ///
    /// Labels are recomputed from the directory listing rather than read
    /// from the artifact. A different list than the one the model was
    /// trained with only produces a warning.
    pub fn from_artifact<P: AsRef<Path>, Q: AsRef<Path>>(
        stem: P,
        train_dir: Q,
        device: B::Device,
    ) -> Result<Self> {
        let (model, metadata) = artifact::load_artifact::<B, _>(stem.as_ref(), &device)?;
        let labels = discover_class_names(train_dir.as_ref())?;

        if labels != metadata.class_names {
            warn!(
                "Class folders {:?} differ from the classes the model was trained with {:?}",
                labels, metadata.class_names
            );
        }
        info!("Loaded {} class labels", labels.len());

        Self::new(model, labels, metadata.config.input_size, device)
    }

    /// Class labels, index = model output
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// Input side length the model expects
    pub fn image_size(&self) -> usize {
        self.image_size
    }

    /// Classify a decoded image
    pub fn predict_image(&self, img: &DynamicImage) -> Result<PredictionResult> {
        let start = Instant::now();

        let data = preprocess_image(img, self.image_size);
        let input = Tensor::<B, 4>::from_floats(
            TensorData::new(data, [1, 3, self.image_size, self.image_size]),
            &self.device,
        );

        let probabilities = self
            .model
            .forward_softmax(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| LeafError::Inference(format!("{:?}", e)))?;

        Ok(PredictionResult::new(
            probabilities,
            &self.labels,
            start.elapsed(),
        ))
    }

    /// Decode an image file and classify it
    pub fn predict_path(&self, path: &Path) -> Result<PredictionResult> {
        let img = ImageReader::open(path)?
            .with_guessed_format()?
            .decode()
            .for_image(path)?;

        self.predict_image(&img)
    }
}
