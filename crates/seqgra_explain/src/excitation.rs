//! Excitation backprop and its contrastive variant.
//!
//! A top-down winner-take-all walk: the probability mass on the target logits
//! is redistributed to each stage input in proportion to `a_i * w_ij⁺`, the
//! excitatory contribution of that input. ReLUs pass the signal through, max
//! pooling routes it to the winning position, flattening reshapes it.
//!
//! Reference: Zhang et al., "Top-down Neural Attention by Excitation
//! Backprop", ECCV 2016.

use std::fmt;
use std::str::FromStr;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use serde::{Deserialize, Serialize};

use seqgra_core::{Activation, CoreError, Stage, StageOp};

use crate::activation::ActivationCapture;
use crate::error::{ExplainError, Result};
use crate::propagate::{route_through, zip_activations};

/// Added to excitatory totals before dividing.
const EXCITATION_EPSILON: f32 = 1e-10;

/// What the target excitation is contrasted against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Contrast {
    /// The same target through the network with negated output weights.
    #[default]
    Dual,
    /// Another class, by column index.
    Class(usize),
}

impl fmt::Display for Contrast {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dual => write!(f, "dual"),
            Self::Class(c) => write!(f, "class {c}"),
        }
    }
}

impl FromStr for Contrast {
    type Err = CoreError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("dual") {
            return Ok(Self::Dual);
        }
        s.parse::<usize>().map(Self::Class).map_err(|_| {
            CoreError::Configuration(format!(
                "unknown contrast '{s}', expected 'dual' or a class index"
            ))
        })
    }
}

/// Marginal winning probability of every input element, `(N, C, 1, W)`.
pub(crate) fn excitation_backprop<B: AutodiffBackend>(
    stages: &[Stage<B::InnerBackend>],
    input: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    let (capture, logits) = ActivationCapture::record(stages, Activation::Spatial(input))?;
    if logits.dims() != seed.dims().to_vec() {
        return Err(CoreError::shape(
            format!("target labels shaped like the logits {:?}", logits.dims()),
            &seed.dims(),
        )
        .into());
    }

    let mut signal = Activation::Flat(seed);
    for stage in stages.iter().rev() {
        let a = capture
            .input(&stage.name)
            .ok_or_else(|| ExplainError::State(format!("no activation recorded for stage '{}'", stage.name)))?;
        signal = match &stage.op {
            StageOp::Relu => signal,
            StageOp::Flatten => match a {
                Activation::Spatial(t) => Activation::Spatial(signal.into_flat()?.reshape(t.dims())),
                Activation::Flat(t) => return Err(CoreError::shape("spatial input to flatten", &t.dims()).into()),
            },
            StageOp::MaxPool2d { .. } => route_through::<B>(&stage.op, a, signal)?,
            op => excite::<B>(&excitatory(op), a, signal)?,
        };
    }

    tracing::trace!("excitation backprop through {} stages", stages.len());
    Ok(signal.into_spatial()?)
}

/// Target excitation minus the excitation of the contrast.
pub(crate) fn contrastive_excitation_backprop<B: AutodiffBackend>(
    stages: &[Stage<B::InnerBackend>],
    input: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
    contrast: Contrast,
) -> Result<Tensor<B::InnerBackend, 4>> {
    let target = excitation_backprop::<B>(stages, input.clone(), seed.clone())?;
    let opposing = match contrast {
        Contrast::Dual => excitation_backprop::<B>(&dual_stages(stages)?, input, seed)?,
        Contrast::Class(class) => {
            let [n, k] = seed.dims();
            check_contrast_class(class, k)?;
            excitation_backprop::<B>(stages, input, class_seed::<B::InnerBackend>(n, k, class, &seed.device()))?
        }
    };
    Ok(target - opposing)
}

/// Fails when `class` is not a column of a `k`-label output.
pub(crate) fn check_contrast_class(class: usize, k: usize) -> std::result::Result<(), CoreError> {
    if class >= k {
        return Err(CoreError::Configuration(format!(
            "contrast class {class} out of range for {k} labels"
        )));
    }
    Ok(())
}

/// `a ⊙ W⁺ᵀ (signal / (W⁺ a + ε))`.
fn excite<B: AutodiffBackend>(
    positive: &StageOp<B::InnerBackend>,
    a: &Activation<B::InnerBackend>,
    signal: Activation<B::InnerBackend>,
) -> Result<Activation<B::InnerBackend>> {
    let z = match positive.apply(a.clone())? {
        Activation::Spatial(t) => Activation::Spatial(t + EXCITATION_EPSILON),
        Activation::Flat(t) => Activation::Flat(t + EXCITATION_EPSILON),
    };
    let ratio = zip_activations(signal, z, |p, z| p / z, |p, z| p / z)?;
    let routed = route_through::<B>(positive, a, ratio)?;
    zip_activations(a.clone(), routed, |a, r| a * r, |a, r| a * r)
}

/// The stage with only its excitatory weights and no bias.
fn excitatory<B: Backend>(op: &StageOp<B>) -> StageOp<B> {
    match op {
        StageOp::Conv2d { weight, options, .. } => StageOp::Conv2d {
            weight: weight.clone().clamp_min(0.0),
            bias: None,
            options: options.clone(),
        },
        StageOp::Linear { weight, .. } => StageOp::Linear {
            weight: weight.clone().clamp_min(0.0),
            bias: None,
        },
        other => other.clone(),
    }
}

/// Stages with the weights and bias of the last weighted stage negated.
fn dual_stages<B: Backend>(stages: &[Stage<B>]) -> Result<Vec<Stage<B>>> {
    let last = stages
        .iter()
        .rposition(|s| s.op.is_weighted())
        .ok_or_else(|| CoreError::Configuration("model has no weighted stage to contrast".to_string()))?;

    let mut dual = stages.to_vec();
    dual[last].op = match &stages[last].op {
        StageOp::Conv2d { weight, bias, options } => StageOp::Conv2d {
            weight: weight.clone().neg(),
            bias: bias.clone().map(|b| b.neg()),
            options: options.clone(),
        },
        StageOp::Linear { weight, bias } => StageOp::Linear {
            weight: weight.clone().neg(),
            bias: bias.clone().map(|b| b.neg()),
        },
        other => other.clone(),
    };
    Ok(dual)
}

fn class_seed<B: Backend>(n: usize, k: usize, class: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut data = vec![0.0f32; n * k];
    for row in 0..n {
        data[row * k + class] = 1.0;
    }
    Tensor::from_data(TensorData::new(data, [n, k]), device)
}
