//! DeepLIFT with the rescale rule.
//!
//! Every ReLU is replaced by its secant through the reference activation,
//! `y = relu(z_ref) + (z - z_ref) * m` with the constant multiplier
//! `m = (relu(z) - relu(z_ref)) / (z - z_ref)`. The surrogate network matches
//! the real one at both the input and the reference, so its gradient is the
//! DeepLIFT multiplier and `multiplier ⊙ (input - reference)` sums to the
//! score difference.
//!
//! Reference: Shrikumar et al., "Learning Important Features Through
//! Propagating Activation Differences", ICML 2017.

use burn::prelude::*;
use burn::tensor::activation::relu;
use burn::tensor::backend::AutodiffBackend;

use seqgra_core::{Activation, CoreError, Stage, StageOp};

use crate::activation::ActivationCapture;
use crate::error::{ExplainError, Result};
use crate::propagate::inner_stages;

/// Below this input difference the multiplier falls back to the gradient.
const RESCALE_EPSILON: f32 = 1e-7;

pub(crate) fn rescale<B: AutodiffBackend>(
    stages: &[Stage<B>],
    input: Tensor<B::InnerBackend, 4>,
    reference: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    let (reference_pass, _) =
        ActivationCapture::record(&inner_stages(stages), Activation::Spatial(reference.clone()))?;

    let x = Tensor::<B, 4>::from_inner(input.clone()).require_grad();
    let mut activation = Activation::Spatial(x.clone());
    for stage in stages {
        activation = match stage.op {
            StageOp::Relu => {
                let z_ref = reference_pass.input(&stage.name).cloned().ok_or_else(|| {
                    ExplainError::State(format!("no reference activation for stage '{}'", stage.name))
                })?;
                rescale_activation(activation, z_ref)?
            }
            _ => stage.op.apply(activation)?,
        };
    }

    let logits = activation.into_flat()?;
    if logits.dims() != seed.dims() {
        return Err(CoreError::shape(
            format!("target labels shaped like the logits {:?}", logits.dims()),
            &seed.dims(),
        )
        .into());
    }
    let grads = (logits * Tensor::from_inner(seed)).sum().backward();
    let multipliers = x
        .grad(&grads)
        .ok_or_else(|| ExplainError::State("backpropagation did not reach the input".to_string()))?;

    Ok(multipliers * (input - reference))
}

fn rescale_activation<B: AutodiffBackend>(
    activation: Activation<B>,
    reference: Activation<B::InnerBackend>,
) -> Result<Activation<B>> {
    match (activation, reference) {
        (Activation::Spatial(z), Activation::Spatial(z_ref)) => {
            Ok(Activation::Spatial(rescale_relu(z, z_ref)))
        }
        (Activation::Flat(z), Activation::Flat(z_ref)) => Ok(Activation::Flat(rescale_relu(z, z_ref))),
        (a, r) => Err(CoreError::shape(
            format!("reference activation of the same kind as {:?}", r.dims()),
            &a.dims(),
        )
        .into()),
    }
}

fn rescale_relu<B: AutodiffBackend, const D: usize>(
    z: Tensor<B, D>,
    z_ref: Tensor<B::InnerBackend, D>,
) -> Tensor<B, D> {
    let z_value = z.clone().inner();
    let delta_in = z_value.clone() - z_ref.clone();
    let delta_out = relu(z_value.clone()) - relu(z_ref.clone());

    let flat = delta_in.clone().abs().lower_equal_elem(RESCALE_EPSILON);
    let safe_delta_in = delta_in.mask_fill(flat.clone(), 1.0);
    let slope = (delta_out / safe_delta_in).mask_where(flat, z_value.greater_elem(0.0).float());

    Tensor::from_inner(relu(z_ref.clone()))
        + (z - Tensor::from_inner(z_ref)) * Tensor::from_inner(slope)
}
