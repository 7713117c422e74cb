//! Gradient-weighted class activation mapping on a named stage.
//!
//! Reference: Selvaraju et al., "Grad-CAM: Visual Explanations from Deep
//! Networks via Gradient-based Localization", ICCV 2017.

use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::backend::AutodiffBackend;

use seqgra_core::{Activation, CoreError, Stage, StageOp};

use crate::activation::ActivationCapture;
use crate::error::Result;
use crate::propagate::{inner_stages, spatial_gradient};

/// Grad-CAM map for `layer`, upsampled to the input width and repeated over
/// all input channels: `(N, C, 1, W)`.
pub(crate) fn grad_cam<B: AutodiffBackend>(
    stages: &[Stage<B>],
    layer: &str,
    input: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    let index = spatial_stage(stages, layer)?;
    let [n, channels, _, width] = input.dims();
    let device = input.device();

    let (capture, _) =
        ActivationCapture::record(&inner_stages(&stages[..=index]), Activation::Spatial(input))?;
    let features = match capture.output(layer) {
        Some(Activation::Spatial(t)) => t.clone(),
        _ => {
            return Err(CoreError::Configuration(format!(
                "stage '{layer}' does not produce a spatial activation"
            ))
            .into())
        }
    };
    let [_, _, height, stage_width] = features.dims();
    if height != 1 {
        return Err(CoreError::shape(
            format!("height 1 at stage '{layer}'"),
            &features.dims(),
        )
        .into());
    }

    let gradients = spatial_gradient::<B>(&stages[index + 1..], features.clone(), seed)?;
    let weights = gradients.mean_dim(3);
    let cam = relu((features * weights).sum_dim(1)).reshape([n, stage_width]);

    tracing::debug!("grad-cam on '{}': {} -> {} positions", layer, stage_width, width);
    let upsampled = cam.matmul(linear_interpolation::<B::InnerBackend>(stage_width, width, &device));
    Ok(upsampled.reshape([n, 1, 1, width]).repeat_dim(1, channels))
}

/// Position of the stage called `layer`, which must keep a spatial output.
///
/// # Errors
///
/// [`CoreError::Configuration`] when no stage has that name or the stage
/// comes after the activations were flattened.
pub(crate) fn spatial_stage<B: Backend>(stages: &[Stage<B>], layer: &str) -> std::result::Result<usize, CoreError> {
    let index = stages.iter().position(|s| s.name == layer).ok_or_else(|| {
        let names: Vec<&str> = stages.iter().map(|s| s.name.as_str()).collect();
        CoreError::Configuration(format!("unknown stage '{layer}', model has {names:?}"))
    })?;
    if stages[..=index]
        .iter()
        .any(|s| matches!(s.op, StageOp::Flatten | StageOp::Linear { .. }))
    {
        return Err(CoreError::Configuration(format!(
            "stage '{layer}' does not produce a spatial activation"
        )));
    }
    Ok(index)
}

/// `[from, to]` matrix that linearly resamples a row of `from` values to `to`
/// values, with half-pixel centres and clamped edges.
pub(crate) fn linear_interpolation<B: Backend>(from: usize, to: usize, device: &B::Device) -> Tensor<B, 2> {
    let mut matrix = vec![0.0f32; from * to];
    let scale = from as f32 / to as f32;
    for j in 0..to {
        let source = ((j as f32 + 0.5) * scale - 0.5).max(0.0);
        let lower = (source.floor() as usize).min(from - 1);
        let upper = (lower + 1).min(from - 1);
        let upper_weight = source - lower as f32;
        matrix[lower * to + j] += 1.0 - upper_weight;
        matrix[upper * to + j] += upper_weight;
    }
    Tensor::from_data(TensorData::new(matrix, [from, to]), device)
}
