//! CNN Model Architecture for Banana Leaf Disease Classification
//!
//! A plain convolutional classifier: three `Conv -> ReLU -> MaxPool` stages
//! with valid padding, then a flattened dense head with dropout.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        Dropout, DropoutConfig, Linear, LinearConfig, PaddingConfig2d, Relu,
    },
    tensor::{backend::Backend, Tensor},
};

use crate::utils::error::LeafError;

/// Configuration for the LeafClassifier CNN model
#[derive(Config, Debug)]
pub struct LeafClassifierConfig {
    /// Number of output classes (one per training subdirectory)
    pub num_classes: usize,

    /// Input image size (square images)
    #[config(default = "128")]
    pub input_size: usize,

    /// Number of input channels (3 for RGB)
    #[config(default = "3")]
    pub in_channels: usize,

    /// Output channels of each convolutional stage
    #[config(default = "vec![32, 64, 128]")]
    pub conv_filters: Vec<usize>,

    /// Square convolution kernel size
    #[config(default = "3")]
    pub kernel_size: usize,

    /// Width of the hidden dense layer
    #[config(default = "256")]
    pub hidden_units: usize,

    /// Dropout rate applied after the hidden dense layer
    #[config(default = "0.5")]
    pub dropout: f64,
}

impl LeafClassifierConfig {
    /// Spatial side length after every conv stage, or `None` if it collapses
    pub fn output_side(&self) -> Option<usize> {
        let mut side = self.input_size;
        for _ in &self.conv_filters {
            // valid convolution, then 2x2 pooling with stride 2
            side = side.checked_sub(self.kernel_size.checked_sub(1)?)?;
            side /= 2;
            if side == 0 {
                return None;
            }
        }
        Some(side)
    }

    /// Number of features entering the dense head
    ///
    /// For the default 128x128 input this is `14 * 14 * 128 = 25088`.
    pub fn flattened_features(&self) -> usize {
        let side = self.output_side().unwrap_or(0);
        let channels = self.conv_filters.last().copied().unwrap_or(self.in_channels);
        side * side * channels
    }

    /// Check that the configuration describes a buildable network
    pub fn validate(&self) -> crate::utils::error::Result<()> {
        if self.num_classes == 0 {
            return Err(LeafError::Config("num_classes must be at least 1".into()));
        }
        if self.in_channels == 0 {
            return Err(LeafError::Config("in_channels must be at least 1".into()));
        }
        if self.conv_filters.is_empty() || self.conv_filters.contains(&0) {
            return Err(LeafError::Config(format!(
                "conv_filters must be non-empty and positive, got {:?}",
                self.conv_filters
            )));
        }
        if self.kernel_size == 0 || self.kernel_size % 2 == 0 {
            return Err(LeafError::Config(format!(
                "kernel_size must be odd and positive, got {}",
                self.kernel_size
            )));
        }
        if self.hidden_units == 0 {
            return Err(LeafError::Config("hidden_units must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.dropout) {
            return Err(LeafError::Config(format!(
                "dropout must be in [0, 1), got {}",
                self.dropout
            )));
        }
        if self.output_side().is_none() {
            return Err(LeafError::Config(format!(
                "input size {} is too small for {} conv stages",
                self.input_size,
                self.conv_filters.len()
            )));
        }
        Ok(())
    }

    /// Validate and build the model
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> crate::utils::error::Result<LeafClassifier<B>> {
        self.validate()?;
        Ok(LeafClassifier::new(self, device))
    }
}

/// A CNN block with Conv2d (valid padding), ReLU and MaxPool
#[derive(Module, Debug)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub relu: Relu,
    pub pool: MaxPool2d,
}

impl<B: Backend> ConvBlock<B> {
    /// Create a new convolutional block
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel_size: usize,
        device: &B::Device,
    ) -> Self {
        let conv = Conv2dConfig::new([in_channels, out_channels], [kernel_size, kernel_size])
            .with_padding(PaddingConfig2d::Valid)
            .init(device);

        Self {
            conv,
            relu: Relu::new(),
            pool: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
        }
    }

    /// Forward pass through the block
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let x = self.conv.forward(x);
        let x = self.relu.forward(x);
        self.pool.forward(x)
    }
}

/// Banana Leaf Disease Classifier CNN
///
/// Architecture (defaults):
/// - Conv 32 -> ReLU -> MaxPool   (128 -> 126 -> 63)
/// - Conv 64 -> ReLU -> MaxPool   (63 -> 61 -> 30)
/// - Conv 128 -> ReLU -> MaxPool  (30 -> 28 -> 14)
/// - Flatten (25088) -> Dense 256 -> ReLU -> Dropout 0.5 -> Dense num_classes
#[derive(Module, Debug)]
pub struct LeafClassifier<B: Backend> {
    pub blocks: Vec<ConvBlock<B>>,
    pub fc1: Linear<B>,
    pub relu: Relu,
    pub dropout: Dropout,
    pub fc2: Linear<B>,

    num_classes: usize,
}

impl<B: Backend> LeafClassifier<B> {
    /// Create a new LeafClassifier from configuration
    ///
    /// Prefer [`LeafClassifierConfig::init`], which validates first.
    pub fn new(config: &LeafClassifierConfig, device: &B::Device) -> Self {
        let mut blocks = Vec::with_capacity(config.conv_filters.len());
        let mut in_channels = config.in_channels;
        for &out_channels in &config.conv_filters {
            blocks.push(ConvBlock::new(
                in_channels,
                out_channels,
                config.kernel_size,
                device,
            ));
            in_channels = out_channels;
        }

        let fc1 = LinearConfig::new(config.flattened_features(), config.hidden_units).init(device);
        let dropout = DropoutConfig::new(config.dropout).init();
        let fc2 = LinearConfig::new(config.hidden_units, config.num_classes).init(device);

        Self {
            blocks,
            fc1,
            relu: Relu::new(),
            dropout,
            fc2,
            num_classes: config.num_classes,
        }
    }

    /// Forward pass through the network
    ///
    /// # Arguments
    /// * `x` - Input tensor of shape [batch_size, channels, height, width]
    ///
    /// # Returns
    /// * Logits tensor of shape [batch_size, num_classes]
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let mut x = x;
        for block in &self.blocks {
            x = block.forward(x);
        }

        // Flatten: [B, C, H, W] -> [B, C * H * W]
        let [batch_size, channels, height, width] = x.dims();
        let x = x.reshape([batch_size, channels * height * width]);

        let x = self.fc1.forward(x);
        let x = self.relu.forward(x);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Forward pass with softmax for inference
    pub fn forward_softmax(&self, x: Tensor<B, 4>) -> Tensor<B, 2> {
        let logits = self.forward(x);
        burn::tensor::activation::softmax(logits, 1)
    }

    /// Get the number of output classes
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_default_flattened_features() {
        let config = LeafClassifierConfig::new(4);
        assert_eq!(config.output_side(), Some(14));
        assert_eq!(config.flattened_features(), 25088);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_configs() {
        assert!(LeafClassifierConfig::new(0).validate().is_err());
        assert!(LeafClassifierConfig::new(3).with_dropout(1.0).validate().is_err());
        assert!(LeafClassifierConfig::new(3).with_kernel_size(4).validate().is_err());
        assert!(LeafClassifierConfig::new(3).with_kernel_size(0).validate().is_err());
        assert!(LeafClassifierConfig::new(3).with_input_size(10).validate().is_err());
        assert!(LeafClassifierConfig::new(3)
            .with_conv_filters(vec![])
            .validate()
            .is_err());
    }

    #[test]
    fn test_config_json_roundtrip_keeps_defaults() {
        let config = LeafClassifierConfig::new(4).with_hidden_units(64);
        let json = serde_json::to_string(&config).unwrap();
        let restored: LeafClassifierConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.num_classes, 4);
        assert_eq!(restored.hidden_units, 64);
        assert_eq!(restored.conv_filters, vec![32, 64, 128]);
        assert_eq!(restored.flattened_features(), 25088);
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_leaf_classifier_output_shape() {
        let device = Default::default();
        let config = LeafClassifierConfig::new(4)
            .with_input_size(32)
            .with_conv_filters(vec![4, 8])
            .with_hidden_units(16);
        let model = config.init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::zeros([2, 3, 32, 32], &device);
        let output = model.forward(input);

        assert_eq!(output.dims(), [2, 4]);
        assert_eq!(model.num_classes(), 4);
    }

    #[test]
    fn test_full_size_forward() {
        let device = Default::default();
        let model = LeafClassifierConfig::new(4)
            .init::<TestBackend>(&device)
            .unwrap();

        let input = Tensor::<TestBackend, 4>::ones([1, 3, 128, 128], &device);
        assert_eq!(model.forward(input).dims(), [1, 4]);
    }

    #[test]
    fn test_softmax_rows_sum_to_one() {
        let device = Default::default();
        let config = LeafClassifierConfig::new(3)
            .with_input_size(16)
            .with_conv_filters(vec![4])
            .with_hidden_units(8);
        let model = config.init::<TestBackend>(&device).unwrap();

        let input = Tensor::<TestBackend, 4>::random(
            [3, 3, 16, 16],
            burn::tensor::Distribution::Uniform(0.0, 1.0),
            &device,
        );
        let probs = model.forward_softmax(input).into_data().to_vec::<f32>().unwrap();

        for row in probs.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
            assert!(row.iter().all(|p| *p >= 0.0));
        }
    }
}
