//! Model traits for attribution.
//!
//! Attribution methods need more than a black-box forward pass: Grad-CAM
//! reads an internal stage, DeepLIFT rewrites the non-linearities and
//! excitation backprop walks the network top-down. Models therefore describe
//! themselves as an ordered list of named [`Stage`]s built from a small set of
//! operations, and [`forward_stages`] runs any slice of that list.

use std::fmt;

use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::module::{conv2d, max_pool2d};
use burn::tensor::ops::ConvOptions;

use crate::error::{CoreError, Result};

/// Intermediate value flowing between stages.
#[derive(Debug, Clone)]
pub enum Activation<B: Backend> {
    /// `(N, channels, 1, W)` feature maps.
    Spatial(Tensor<B, 4>),
    /// `(N, features)` vectors.
    Flat(Tensor<B, 2>),
}

impl<B: Backend> Activation<B> {
    /// Dimensions of the wrapped tensor.
    pub fn dims(&self) -> Vec<usize> {
        match self {
            Self::Spatial(t) => t.dims().to_vec(),
            Self::Flat(t) => t.dims().to_vec(),
        }
    }

    /// Unwrap a spatial activation.
    pub fn into_spatial(self) -> Result<Tensor<B, 4>> {
        match self {
            Self::Spatial(t) => Ok(t),
            Self::Flat(t) => Err(CoreError::shape("spatial (N, K, 1, W) activation", &t.dims())),
        }
    }

    /// Unwrap a flat activation.
    pub fn into_flat(self) -> Result<Tensor<B, 2>> {
        match self {
            Self::Flat(t) => Ok(t),
            Self::Spatial(t) => Err(CoreError::shape("flat (N, F) activation", &t.dims())),
        }
    }
}

/// A single operation of a layered model.
#[derive(Debug, Clone)]
pub enum StageOp<B: Backend> {
    /// 2-D convolution over `(N, C, 1, W)`, kernel `[1, k]`.
    Conv2d {
        /// Weight `[out, in, 1, k]`.
        weight: Tensor<B, 4>,
        /// Bias `[out]`.
        bias: Option<Tensor<B, 1>>,
        /// Stride, padding, dilation and groups.
        options: ConvOptions<2>,
    },
    /// Element-wise rectifier.
    Relu,
    /// Max pooling without padding.
    MaxPool2d {
        /// Pooling window.
        kernel: [usize; 2],
        /// Pooling stride.
        stride: [usize; 2],
    },
    /// `(N, C, 1, W)` to `(N, C * W)`.
    Flatten,
    /// Dense layer, `x · weight + bias`.
    Linear {
        /// Weight `[in, out]`.
        weight: Tensor<B, 2>,
        /// Bias `[out]`.
        bias: Option<Tensor<B, 1>>,
    },
}

impl<B: Backend> StageOp<B> {
    /// Apply the operation.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidShape`] when the activation kind does not fit the
    /// operation (e.g. a convolution fed a flat vector).
    pub fn apply(&self, input: Activation<B>) -> Result<Activation<B>> {
        match (self, input) {
            (Self::Conv2d { weight, bias, options }, Activation::Spatial(x)) => Ok(
                Activation::Spatial(conv2d(x, weight.clone(), bias.clone(), options.clone())),
            ),
            (Self::Relu, Activation::Spatial(x)) => Ok(Activation::Spatial(relu(x))),
            (Self::Relu, Activation::Flat(x)) => Ok(Activation::Flat(relu(x))),
            (Self::MaxPool2d { kernel, stride }, Activation::Spatial(x)) => Ok(Activation::Spatial(
                max_pool2d(x, *kernel, *stride, [0, 0], [1, 1]),
            )),
            (Self::Flatten, Activation::Spatial(x)) => {
                let [n, c, h, w] = x.dims();
                Ok(Activation::Flat(x.reshape([n, c * h * w])))
            }
            (Self::Linear { weight, bias }, Activation::Flat(x)) => {
                let out = x.matmul(weight.clone());
                Ok(Activation::Flat(match bias {
                    Some(b) => out + b.clone().unsqueeze::<2>(),
                    None => out,
                }))
            }
            (op, input) => Err(CoreError::shape(
                format!("{} input for {op} stage", op.input_kind()),
                &input.dims(),
            )),
        }
    }

    /// Whether the stage carries weights.
    pub fn is_weighted(&self) -> bool {
        matches!(self, Self::Conv2d { .. } | Self::Linear { .. })
    }

    fn input_kind(&self) -> &'static str {
        match self {
            Self::Conv2d { .. } | Self::MaxPool2d { .. } | Self::Flatten => "spatial",
            Self::Linear { .. } => "flat",
            Self::Relu => "any",
        }
    }
}

impl<B: Backend> fmt::Display for StageOp<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Conv2d { .. } => "conv2d",
            Self::Relu => "relu",
            Self::MaxPool2d { .. } => "max-pool",
            Self::Flatten => "flatten",
            Self::Linear { .. } => "linear",
        };
        f.write_str(name)
    }
}

/// A named operation.
#[derive(Debug, Clone)]
pub struct Stage<B: Backend> {
    /// Stage name, unique within a model.
    pub name: String,
    /// The operation.
    pub op: StageOp<B>,
}

impl<B: Backend> Stage<B> {
    /// Create a named stage.
    pub fn new(name: impl Into<String>, op: StageOp<B>) -> Self {
        Self {
            name: name.into(),
            op,
        }
    }
}

/// Run `stages` in order, starting from `input`.
pub fn forward_stages<B: Backend>(stages: &[Stage<B>], input: Activation<B>) -> Result<Activation<B>> {
    stages
        .iter()
        .try_fold(input, |activation, stage| stage.op.apply(activation))
}

/// Trait for sequence classifiers that can be explained.
///
/// Input is `(N, C, 1, W)`; output is `(N, K)` logits.
pub trait SequenceModel<B: Backend> {
    /// The model as an ordered list of stages, ending in `(N, K)` logits.
    fn stages(&self) -> Vec<Stage<B>>;

    /// Number of output labels.
    fn n_classes(&self) -> usize;

    /// Forward pass returning logits.
    fn forward(&self, x: Tensor<B, 4>) -> Result<Tensor<B, 2>> {
        forward_stages(&self.stages(), Activation::Spatial(x))?.into_flat()
    }

    /// Index of the stage called `name`.
    fn stage_index(&self, name: &str) -> Option<usize> {
        self.stages().iter().position(|s| s.name == name)
    }
}
