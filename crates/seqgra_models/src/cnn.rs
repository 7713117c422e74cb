//! Convolutional sequence classifier.
//!
//! A single convolution over one-hot encoded sequences followed by max
//! pooling and one or two dense layers. The model consumes `(N, C, 1, W)`
//! tensors and exposes itself to attribution methods as named stages:
//!
//! `conv1 -> relu1 -> pool1 -> flatten [-> dense1 -> relu2] -> output`

use burn::nn::{
    conv::{Conv2d, Conv2dConfig},
    Linear, LinearConfig, PaddingConfig2d,
};
use burn::prelude::*;
use burn::tensor::ops::ConvOptions;
use serde::{Deserialize, Serialize};

use seqgra_core::{SequenceModel, Stage, StageOp};

/// Configuration for [`SequenceCnn`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceCnnConfig {
    /// Alphabet size (4 for DNA, 20 for protein).
    pub n_channels: usize,
    /// Sequence length.
    pub seq_len: usize,
    /// Number of output labels.
    pub n_classes: usize,
    /// Number of convolution filters.
    pub n_filters: usize,
    /// Convolution width in positions; odd widths keep the sequence length.
    pub kernel_size: usize,
    /// Max-pool width and stride.
    pub pool_size: usize,
    /// Width of the optional hidden dense layer.
    pub hidden: Option<usize>,
}

impl Default for SequenceCnnConfig {
    fn default() -> Self {
        Self {
            n_channels: 4,
            seq_len: 150,
            n_classes: 2,
            n_filters: 10,
            kernel_size: 21,
            pool_size: 4,
            hidden: None,
        }
    }
}

impl SequenceCnnConfig {
    /// Create a new config with specified dimensions.
    pub fn new(n_channels: usize, seq_len: usize, n_classes: usize) -> Self {
        Self {
            n_channels,
            seq_len,
            n_classes,
            ..Default::default()
        }
    }

    /// Set the number of convolution filters.
    #[must_use]
    pub fn with_filters(mut self, n_filters: usize) -> Self {
        self.n_filters = n_filters;
        self
    }

    /// Set the convolution width.
    #[must_use]
    pub fn with_kernel_size(mut self, kernel_size: usize) -> Self {
        self.kernel_size = kernel_size;
        self
    }

    /// Set the pooling width.
    #[must_use]
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    /// Add a hidden dense layer of `width` units.
    #[must_use]
    pub fn with_hidden(mut self, width: usize) -> Self {
        self.hidden = Some(width);
        self
    }

    /// Number of positions after the convolution.
    pub fn conv_len(&self) -> usize {
        self.seq_len + 2 * (self.kernel_size / 2) + 1 - self.kernel_size
    }

    /// Number of positions after pooling.
    pub fn pooled_len(&self) -> usize {
        self.conv_len() / self.pool_size.max(1)
    }

    /// Initialize the model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceCnn<B> {
        SequenceCnn::new(self, device)
    }
}

/// Convolutional classifier for one-hot encoded sequences.
///
/// Architecture:
/// - Conv2d(C, F, kernel=[1, k], padding=[0, k/2]) -> ReLU
/// - MaxPool2d([1, p])
/// - Flatten
/// - optionally Linear(F * W', H) -> ReLU
/// - Linear(.., n_classes)
#[derive(Module, Debug)]
pub struct SequenceCnn<B: Backend> {
    conv: Conv2d<B>,
    hidden: Option<Linear<B>>,
    output: Linear<B>,
    kernel_size: usize,
    pool_size: usize,
    n_classes: usize,
}

impl<B: Backend> SequenceCnn<B> {
    /// Create a new model with freshly initialized weights.
    pub fn new(config: &SequenceCnnConfig, device: &B::Device) -> Self {
        let pool_size = config.pool_size.max(1);
        let conv = Conv2dConfig::new([config.n_channels, config.n_filters], [1, config.kernel_size])
            .with_padding(PaddingConfig2d::Explicit(0, config.kernel_size / 2))
            .init(device);

        let flat = config.n_filters * config.pooled_len();
        let (hidden, output_in) = match config.hidden {
            Some(width) => (Some(LinearConfig::new(flat, width).init(device)), width),
            None => (None, flat),
        };
        let output = LinearConfig::new(output_in, config.n_classes).init(device);

        Self {
            conv,
            hidden,
            output,
            kernel_size: config.kernel_size,
            pool_size,
            n_classes: config.n_classes,
        }
    }
}

fn linear_stage<B: Backend>(name: &str, layer: &Linear<B>) -> Stage<B> {
    Stage::new(
        name,
        StageOp::Linear {
            weight: layer.weight.val(),
            bias: layer.bias.as_ref().map(|b| b.val()),
        },
    )
}

impl<B: Backend> SequenceModel<B> for SequenceCnn<B> {
    fn stages(&self) -> Vec<Stage<B>> {
        let mut stages = vec![
            Stage::new(
                "conv1",
                StageOp::Conv2d {
                    weight: self.conv.weight.val(),
                    bias: self.conv.bias.as_ref().map(|b| b.val()),
                    options: ConvOptions::new([1, 1], [0, self.kernel_size / 2], [1, 1], 1),
                },
            ),
            Stage::new("relu1", StageOp::Relu),
            Stage::new(
                "pool1",
                StageOp::MaxPool2d {
                    kernel: [1, self.pool_size],
                    stride: [1, self.pool_size],
                },
            ),
            Stage::new("flatten", StageOp::Flatten),
        ];
        if let Some(hidden) = &self.hidden {
            stages.push(linear_stage("dense1", hidden));
            stages.push(Stage::new("relu2", StageOp::Relu));
        }
        stages.push(linear_stage("output", &self.output));
        stages
    }

    fn n_classes(&self) -> usize {
        self.n_classes
    }
}
