//! Attribution strategies and the maps they produce.
//!
//! Every strategy shares one contract, [`AttributionStrategy::explain`]: a
//! bound model in inference mode, an `(N, C, 1, W)` input that tracks
//! gradients, and `(N, K)` integer target indicators in; an importance map
//! of the input's shape out. Model parameters are lowered to the inner
//! backend and lifted back as constants before any pass, so they never
//! accumulate gradients.

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use seqgra_core::{CoreError, SequenceModel};

use crate::bound::BoundModel;
use crate::deeplift::rescale;
use crate::error::{ExplainError, Result};
use crate::excitation::{check_contrast_class, contrastive_excitation_backprop, excitation_backprop, Contrast};
use crate::gradcam::{grad_cam, spatial_stage};
use crate::gradient::{
    gradient_x_input, integrated_gradients, path_integrated_gradients, saliency, vanilla, InterpolationPath,
};
use crate::propagate::{constant_stages, inner_stages};
use crate::reference::Reference;

/// Default number of interpolation steps for the path methods.
pub const DEFAULT_STEPS: usize = 50;

/// Identifier of an attribution strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    /// Vanilla gradient.
    Gradient,
    /// Gradient ⊙ input.
    GradientXInput,
    /// Absolute gradient.
    Saliency,
    /// Integrated gradients on a straight path.
    IntegratedGradients,
    /// Integrated gradients on a caller-supplied path.
    NonlinearIntegratedGradients,
    /// DeepLIFT, rescale rule.
    DeepLift,
    /// Gradient-weighted class activation mapping.
    GradCam,
    /// Excitation backprop.
    ExcitationBackprop,
    /// Contrastive excitation backprop.
    ContrastiveExcitationBackprop,
}

impl StrategyKind {
    /// All strategies, in listing order.
    pub const ALL: [StrategyKind; 9] = [
        Self::Gradient,
        Self::GradientXInput,
        Self::Saliency,
        Self::IntegratedGradients,
        Self::NonlinearIntegratedGradients,
        Self::DeepLift,
        Self::GradCam,
        Self::ExcitationBackprop,
        Self::ContrastiveExcitationBackprop,
    ];

    /// Identifier used on the command line and as the results directory name.
    pub fn id(&self) -> &'static str {
        match self {
            Self::Gradient => "gradient",
            Self::GradientXInput => "gradient-x-input",
            Self::Saliency => "saliency",
            Self::IntegratedGradients => "integrated-gradients",
            Self::NonlinearIntegratedGradients => "nonlinear-integrated-gradients",
            Self::DeepLift => "deep-lift",
            Self::GradCam => "grad-cam",
            Self::ExcitationBackprop => "excitation-backprop",
            Self::ContrastiveExcitationBackprop => "contrastive-excitation-backprop",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Gradient => "Vanilla gradient saliency",
            Self::GradientXInput => "Gradient times input",
            Self::Saliency => "Absolute gradient saliency",
            Self::IntegratedGradients => "Integrated gradients",
            Self::NonlinearIntegratedGradients => "Nonlinear integrated gradients",
            Self::DeepLift => "DeepLIFT (rescale rule)",
            Self::GradCam => "Grad-CAM",
            Self::ExcitationBackprop => "Excitation backprop",
            Self::ContrastiveExcitationBackprop => "Contrastive excitation backprop",
        }
    }

    /// Build the strategy from its configuration.
    ///
    /// Nonlinear integrated gradients still needs a path, see
    /// [`AttributionStrategy::with_path`].
    pub fn build<B: AutodiffBackend>(&self, config: &StrategyConfig) -> AttributionStrategy<B> {
        match self {
            Self::Gradient => AttributionStrategy::Gradient,
            Self::GradientXInput => AttributionStrategy::GradientXInput,
            Self::Saliency => AttributionStrategy::Saliency,
            Self::IntegratedGradients => AttributionStrategy::IntegratedGradients {
                reference: config.reference.unwrap_or_default(),
                steps: config.steps,
            },
            Self::NonlinearIntegratedGradients => AttributionStrategy::NonlinearIntegratedGradients {
                reference: config.reference.unwrap_or_default(),
                steps: config.steps,
                path: None,
            },
            Self::DeepLift => AttributionStrategy::DeepLift {
                reference: config.reference,
            },
            Self::GradCam => AttributionStrategy::GradCam {
                layer: config.layer.clone(),
            },
            Self::ExcitationBackprop => AttributionStrategy::ExcitationBackprop,
            Self::ContrastiveExcitationBackprop => AttributionStrategy::ContrastiveExcitationBackprop {
                contrast: config.contrast,
            },
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.id() == s)
            .ok_or_else(|| CoreError::Configuration(format!("unknown evaluator '{s}'")))
    }
}

/// Per-strategy parameters, as read from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Interpolation steps of the path methods.
    pub steps: usize,
    /// Reference input. Integrated gradients falls back to zeros; DeepLIFT
    /// requires it.
    pub reference: Option<Reference>,
    /// Grad-CAM stage.
    pub layer: Option<String>,
    /// What contrastive excitation backprop subtracts.
    pub contrast: Contrast,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            steps: DEFAULT_STEPS,
            reference: None,
            layer: None,
            contrast: Contrast::default(),
        }
    }
}

impl StrategyConfig {
    /// Set the number of interpolation steps.
    #[must_use]
    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Set the reference input.
    #[must_use]
    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Set the Grad-CAM stage.
    #[must_use]
    pub fn with_layer(mut self, layer: impl Into<String>) -> Self {
        self.layer = Some(layer.into());
        self
    }

    /// Set the contrast.
    #[must_use]
    pub fn with_contrast(mut self, contrast: Contrast) -> Self {
        self.contrast = contrast;
        self
    }
}

/// Importance scores shaped like the explained input.
#[derive(Debug, Clone)]
pub struct AttributionMap<B: Backend> {
    /// `(N, C, 1, W)` scores.
    pub values: Tensor<B, 4>,
    /// The strategy that produced them.
    pub method: StrategyKind,
}

impl<B: Backend> AttributionMap<B> {
    /// Create a new attribution map.
    pub fn new(values: Tensor<B, 4>, method: StrategyKind) -> Self {
        Self { values, method }
    }

    /// Get the shape of the attribution map.
    pub fn shape(&self) -> [usize; 4] {
        self.values.dims()
    }

    /// Copy the scores to the host in row-major order.
    pub fn into_vec(self) -> Result<Vec<f32>> {
        self.values
            .into_data()
            .convert::<f32>()
            .to_vec::<f32>()
            .map_err(|e| ExplainError::TensorData(format!("{e:?}")))
    }
}

/// An attribution algorithm with its parameters.
#[derive(Debug, Clone)]
pub enum AttributionStrategy<B: AutodiffBackend> {
    /// ∂ score / ∂ input.
    Gradient,
    /// Gradient ⊙ input.
    GradientXInput,
    /// |gradient|.
    Saliency,
    /// `(input - reference) ⊙` the mean gradient along the straight path.
    IntegratedGradients {
        /// Path start.
        reference: Reference,
        /// Number of interpolation points.
        steps: usize,
    },
    /// Path integral of the gradient along `path`.
    NonlinearIntegratedGradients {
        /// Path start.
        reference: Reference,
        /// Number of interpolation points.
        steps: usize,
        /// The path; required.
        path: Option<InterpolationPath<B::InnerBackend>>,
    },
    /// Rescale-rule multipliers ⊙ `(input - reference)`.
    DeepLift {
        /// Reference input; required.
        reference: Option<Reference>,
    },
    /// Class activation map of a spatial stage.
    GradCam {
        /// Stage name; required.
        layer: Option<String>,
    },
    /// Top-down marginal winning probability.
    ExcitationBackprop,
    /// Target excitation minus contrast excitation.
    ContrastiveExcitationBackprop {
        /// The contrast.
        contrast: Contrast,
    },
}

impl<B: AutodiffBackend> AttributionStrategy<B> {
    /// The strategy identifier.
    pub fn kind(&self) -> StrategyKind {
        match self {
            Self::Gradient => StrategyKind::Gradient,
            Self::GradientXInput => StrategyKind::GradientXInput,
            Self::Saliency => StrategyKind::Saliency,
            Self::IntegratedGradients { .. } => StrategyKind::IntegratedGradients,
            Self::NonlinearIntegratedGradients { .. } => StrategyKind::NonlinearIntegratedGradients,
            Self::DeepLift { .. } => StrategyKind::DeepLift,
            Self::GradCam { .. } => StrategyKind::GradCam,
            Self::ExcitationBackprop => StrategyKind::ExcitationBackprop,
            Self::ContrastiveExcitationBackprop { .. } => StrategyKind::ContrastiveExcitationBackprop,
        }
    }

    /// Supply the path of nonlinear integrated gradients.
    ///
    /// Other strategies are returned unchanged.
    #[must_use]
    pub fn with_path(self, path: InterpolationPath<B::InnerBackend>) -> Self {
        match self {
            Self::NonlinearIntegratedGradients { reference, steps, .. } => Self::NonlinearIntegratedGradients {
                reference,
                steps,
                path: Some(path),
            },
            other => other,
        }
    }

    /// Check the parameters that depend on the model: the Grad-CAM stage
    /// exists and is spatial, the contrast class is a model label.
    ///
    /// # Errors
    ///
    /// [`CoreError::Configuration`] on any mismatch.
    pub fn check_model<M: SequenceModel<B>>(&self, model: &M) -> std::result::Result<(), CoreError> {
        match self {
            Self::GradCam { layer: Some(layer) } => spatial_stage(&model.stages(), layer).map(|_| ()),
            Self::ContrastiveExcitationBackprop {
                contrast: Contrast::Class(class),
            } => check_contrast_class(*class, model.n_classes()),
            _ => Ok(()),
        }
    }

    /// Compute the attribution map of `input` for `targets`.
    ///
    /// # Arguments
    ///
    /// * `model` - Bound model, in inference mode
    /// * `input` - `(N, C, 1, W)` encoded sequences with gradient tracking
    /// * `targets` - `(N, K)` label indicators seeding the backward pass
    ///
    /// # Errors
    ///
    /// - [`ExplainError::State`] when a precondition or required parameter is missing
    /// - [`CoreError::DataMismatch`] when input and targets disagree on `N`
    /// - [`CoreError::InvalidShape`] when `K` is not the model's label count
    pub fn explain<M: SequenceModel<B>>(
        &self,
        model: &BoundModel<B, M>,
        input: Tensor<B, 4>,
        targets: Tensor<B, 2, Int>,
    ) -> Result<AttributionMap<B::InnerBackend>> {
        model.ensure_ready(&input)?;
        self.check_parameters()?;

        let dims = input.dims();
        let [n, k] = targets.dims();
        if n != dims[0] {
            return Err(CoreError::DataMismatch(format!(
                "{} examples but {} target rows",
                dims[0], n
            ))
            .into());
        }
        let n_classes = model.model().n_classes();
        if k != n_classes {
            return Err(CoreError::shape(format!("targets over {n_classes} labels"), &[n, k]).into());
        }

        let inner = inner_stages(&model.model().stages());
        let stages = constant_stages::<B>(&inner);
        let x = input.inner();
        let seed = targets.float().inner();
        tracing::debug!("{} on input {:?}, targets {:?}", self.kind(), dims, [n, k]);

        let values = match self {
            Self::Gradient => vanilla::<B>(&stages, x, seed)?,
            Self::GradientXInput => gradient_x_input::<B>(&stages, x, seed)?,
            Self::Saliency => saliency::<B>(&stages, x, seed)?,
            Self::IntegratedGradients { reference, steps } => {
                let r = reference.build(&x)?;
                integrated_gradients::<B>(&stages, x, r, seed, *steps)?
            }
            Self::NonlinearIntegratedGradients {
                reference,
                steps,
                path: Some(path),
            } => {
                let r = reference.build(&x)?;
                path_integrated_gradients::<B>(&stages, x, r, seed, *steps, path)?
            }
            Self::DeepLift {
                reference: Some(reference),
            } => {
                let r = reference.build(&x)?;
                rescale::<B>(&stages, x, r, seed)?
            }
            Self::GradCam { layer: Some(layer) } => grad_cam::<B>(&stages, layer, x, seed)?,
            Self::ExcitationBackprop => excitation_backprop::<B>(&inner, x, seed)?,
            Self::ContrastiveExcitationBackprop { contrast } => {
                contrastive_excitation_backprop::<B>(&inner, x, seed, *contrast)?
            }
            Self::NonlinearIntegratedGradients { path: None, .. }
            | Self::DeepLift { reference: None }
            | Self::GradCam { layer: None } => {
                return Err(ExplainError::State(format!(
                    "{} is missing a required parameter",
                    self.kind().name()
                )))
            }
        };

        if values.dims() != dims {
            return Err(CoreError::shape(format!("attribution shaped like the input {dims:?}"), &values.dims()).into());
        }
        Ok(AttributionMap::new(values, self.kind()))
    }

    fn check_parameters(&self) -> Result<()> {
        let missing = match self {
            Self::IntegratedGradients { steps: 0, .. } | Self::NonlinearIntegratedGradients { steps: 0, .. } => {
                Some("at least one interpolation step")
            }
            Self::NonlinearIntegratedGradients { path: None, .. } => Some("an interpolation path"),
            Self::DeepLift { reference: None } => Some("a reference input"),
            Self::GradCam { layer: None } => Some("a stage name"),
            _ => None,
        };
        match missing {
            Some(what) => Err(ExplainError::State(format!("{} needs {what}", self.kind().name()))),
            None => Ok(()),
        }
    }
}
