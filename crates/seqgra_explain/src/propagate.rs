//! Moving stages between the autodiff backend and its inner backend, and
//! backpropagating a seed to a spatial activation.
//!
//! Strategies never differentiate model parameters. Weights are lowered to the
//! inner backend once and lifted back as untracked constants, so the only
//! tracked leaf in any graph is the tensor whose gradient is requested.

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use seqgra_core::{forward_stages, Activation, CoreError, Stage, StageOp};

use crate::error::{ExplainError, Result};

/// Lower stages onto the inner backend.
pub(crate) fn inner_stages<B: AutodiffBackend>(stages: &[Stage<B>]) -> Vec<Stage<B::InnerBackend>> {
    stages
        .iter()
        .map(|s| Stage::new(s.name.clone(), inner_op(&s.op)))
        .collect()
}

/// Lift inner-backend stages onto the autodiff backend as constants.
pub(crate) fn constant_stages<B: AutodiffBackend>(stages: &[Stage<B::InnerBackend>]) -> Vec<Stage<B>> {
    stages
        .iter()
        .map(|s| Stage::new(s.name.clone(), constant_op::<B>(&s.op)))
        .collect()
}

fn inner_op<B: AutodiffBackend>(op: &StageOp<B>) -> StageOp<B::InnerBackend> {
    match op {
        StageOp::Conv2d { weight, bias, options } => StageOp::Conv2d {
            weight: weight.clone().inner(),
            bias: bias.clone().map(|b| b.inner()),
            options: options.clone(),
        },
        StageOp::Relu => StageOp::Relu,
        StageOp::MaxPool2d { kernel, stride } => StageOp::MaxPool2d {
            kernel: *kernel,
            stride: *stride,
        },
        StageOp::Flatten => StageOp::Flatten,
        StageOp::Linear { weight, bias } => StageOp::Linear {
            weight: weight.clone().inner(),
            bias: bias.clone().map(|b| b.inner()),
        },
    }
}

pub(crate) fn constant_op<B: AutodiffBackend>(op: &StageOp<B::InnerBackend>) -> StageOp<B> {
    match op {
        StageOp::Conv2d { weight, bias, options } => StageOp::Conv2d {
            weight: Tensor::from_inner(weight.clone()),
            bias: bias.clone().map(Tensor::from_inner),
            options: options.clone(),
        },
        StageOp::Relu => StageOp::Relu,
        StageOp::MaxPool2d { kernel, stride } => StageOp::MaxPool2d {
            kernel: *kernel,
            stride: *stride,
        },
        StageOp::Flatten => StageOp::Flatten,
        StageOp::Linear { weight, bias } => StageOp::Linear {
            weight: Tensor::from_inner(weight.clone()),
            bias: bias.clone().map(Tensor::from_inner),
        },
    }
}

/// Gradient of `sum(seed * output)` with respect to a spatial `leaf`, where
/// `output` is the result of running `stages` on the leaf.
///
/// `stages` must already be constants (see [`constant_stages`]) and must end
/// in flat logits shaped like `seed`.
pub(crate) fn spatial_gradient<B: AutodiffBackend>(
    stages: &[Stage<B>],
    leaf: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    let x = Tensor::<B, 4>::from_inner(leaf).require_grad();
    let logits = forward_stages(stages, Activation::Spatial(x.clone()))?.into_flat()?;
    check_seed(&logits.dims(), &seed.dims())?;

    let score = (logits * Tensor::from_inner(seed)).sum();
    let grads = score.backward();
    x.grad(&grads)
        .ok_or_else(|| ExplainError::State("backpropagation did not reach the input".to_string()))
}

/// Gradient of `sum(signal * op(input))` with respect to `input`.
///
/// Routes a top-down signal through one stage: transposed weights for
/// convolutions and dense layers, winner positions for max pooling.
pub(crate) fn route_through<B: AutodiffBackend>(
    op: &StageOp<B::InnerBackend>,
    input: &Activation<B::InnerBackend>,
    signal: Activation<B::InnerBackend>,
) -> Result<Activation<B::InnerBackend>> {
    let op = constant_op::<B>(op);
    match input {
        Activation::Spatial(a) => {
            let leaf = Tensor::<B, 4>::from_inner(a.clone()).require_grad();
            let out = op.apply(Activation::Spatial(leaf.clone()))?;
            let grads = weighted_sum::<B>(out, signal)?.backward();
            leaf.grad(&grads)
                .map(Activation::Spatial)
                .ok_or_else(|| ExplainError::State(format!("no gradient through {op} stage")))
        }
        Activation::Flat(a) => {
            let leaf = Tensor::<B, 2>::from_inner(a.clone()).require_grad();
            let out = op.apply(Activation::Flat(leaf.clone()))?;
            let grads = weighted_sum::<B>(out, signal)?.backward();
            leaf.grad(&grads)
                .map(Activation::Flat)
                .ok_or_else(|| ExplainError::State(format!("no gradient through {op} stage")))
        }
    }
}

fn weighted_sum<B: AutodiffBackend>(
    out: Activation<B>,
    weights: Activation<B::InnerBackend>,
) -> Result<Tensor<B, 1>> {
    match (out, weights) {
        (Activation::Spatial(o), Activation::Spatial(w)) if o.dims() == w.dims() => {
            Ok((o * Tensor::from_inner(w)).sum())
        }
        (Activation::Flat(o), Activation::Flat(w)) if o.dims() == w.dims() => {
            Ok((o * Tensor::from_inner(w)).sum())
        }
        (o, w) => Err(CoreError::shape(format!("signal shaped like stage output {:?}", o.dims()), &w.dims()).into()),
    }
}

/// Element-wise combination of two activations of the same kind and shape.
pub(crate) fn zip_activations<B: Backend>(
    a: Activation<B>,
    b: Activation<B>,
    spatial: impl Fn(Tensor<B, 4>, Tensor<B, 4>) -> Tensor<B, 4>,
    flat: impl Fn(Tensor<B, 2>, Tensor<B, 2>) -> Tensor<B, 2>,
) -> Result<Activation<B>> {
    match (a, b) {
        (Activation::Spatial(x), Activation::Spatial(y)) if x.dims() == y.dims() => {
            Ok(Activation::Spatial(spatial(x, y)))
        }
        (Activation::Flat(x), Activation::Flat(y)) if x.dims() == y.dims() => Ok(Activation::Flat(flat(x, y))),
        (x, y) => Err(CoreError::shape(format!("activation shaped like {:?}", x.dims()), &y.dims()).into()),
    }
}

fn check_seed(logits: &[usize; 2], seed: &[usize; 2]) -> Result<()> {
    if logits != seed {
        return Err(CoreError::shape(
            format!("target labels shaped like the logits {logits:?}"),
            seed,
        )
        .into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{linear_model, linear_weights, one_hot_input, values, TestBackend};
    use seqgra_core::SequenceModel;

    type Inner = <TestBackend as AutodiffBackend>::InnerBackend;

    #[test]
    fn test_spatial_gradient_of_linear_model() {
        let device = Default::default();
        let stages = constant_stages::<TestBackend>(&inner_stages(&linear_model(&device).stages()));
        let x = one_hot_input(1, 3, &device).inner();
        let seed = Tensor::<Inner, 2>::from_data(TensorData::new(vec![1.0f32, 0.0], [1, 2]), &device);

        let grad = values(spatial_gradient::<TestBackend>(&stages, x, seed).unwrap());
        let weights = linear_weights();
        for (i, g) in grad.iter().enumerate() {
            assert!((g - weights[2 * i]).abs() < 1e-6);
        }
    }

    #[test]
    fn test_seed_shape_checked() {
        let device = Default::default();
        let stages = constant_stages::<TestBackend>(&inner_stages(&linear_model(&device).stages()));
        let x = one_hot_input(2, 3, &device).inner();
        let seed = Tensor::<Inner, 2>::ones([2, 3], &device);
        let err = spatial_gradient::<TestBackend>(&stages, x, seed).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_route_through_linear_is_transpose() {
        let device = Default::default();
        let w = Tensor::<Inner, 2>::from_data(TensorData::new(vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0], [3, 2]), &device);
        let op = StageOp::Linear { weight: w, bias: None };
        let input = Activation::Flat(Tensor::<Inner, 2>::ones([1, 3], &device));
        let signal = Activation::Flat(Tensor::<Inner, 2>::from_data(TensorData::new(vec![1.0f32, 10.0], [1, 2]), &device));

        let routed = route_through::<TestBackend>(&op, &input, signal).unwrap().into_flat().unwrap();
        assert_eq!(values(routed), vec![21.0, 43.0, 65.0]);
    }
}
