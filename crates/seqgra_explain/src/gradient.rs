//! Gradient family: vanilla gradient, gradient × input, saliency and the two
//! path-integral methods.

use std::fmt;
use std::sync::Arc;

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use seqgra_core::{CoreError, Stage};

use crate::error::{ExplainError, Result};
use crate::propagate::spatial_gradient;

type PathFn<B> = dyn Fn(&Tensor<B, 4>, &Tensor<B, 4>, f32) -> Tensor<B, 4> + Send + Sync;

/// A path from the reference (`alpha = 0`) to the input (`alpha = 1`).
///
/// Called as `path(input, reference, alpha)`.
#[derive(Clone)]
pub struct InterpolationPath<B: Backend> {
    path: Arc<PathFn<B>>,
}

impl<B: Backend> InterpolationPath<B> {
    /// Wrap a path function.
    pub fn new<F>(path: F) -> Self
    where
        F: Fn(&Tensor<B, 4>, &Tensor<B, 4>, f32) -> Tensor<B, 4> + Send + Sync + 'static,
    {
        Self { path: Arc::new(path) }
    }

    /// `reference + alpha * (input - reference)`.
    pub fn straight_line() -> Self {
        Self::new(|input, reference, alpha| {
            reference.clone() + (input.clone() - reference.clone()) * alpha
        })
    }

    /// The point of the path at `alpha`.
    pub fn point(&self, input: &Tensor<B, 4>, reference: &Tensor<B, 4>, alpha: f32) -> Tensor<B, 4> {
        (self.path)(input, reference, alpha)
    }
}

impl<B: Backend> fmt::Debug for InterpolationPath<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InterpolationPath(..)")
    }
}

/// ∂ score / ∂ input.
pub(crate) fn vanilla<B: AutodiffBackend>(
    stages: &[Stage<B>],
    input: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    spatial_gradient::<B>(stages, input, seed)
}

/// Gradient ⊙ input.
pub(crate) fn gradient_x_input<B: AutodiffBackend>(
    stages: &[Stage<B>],
    input: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    let gradient = spatial_gradient::<B>(stages, input.clone(), seed)?;
    Ok(gradient * input)
}

/// |gradient|.
pub(crate) fn saliency<B: AutodiffBackend>(
    stages: &[Stage<B>],
    input: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    Ok(spatial_gradient::<B>(stages, input, seed)?.abs())
}

/// Integrated gradients along the straight line from `reference` to `input`.
///
/// Right Riemann sum over `alpha = k / steps`, `k = 1..=steps`.
///
/// Reference: Sundararajan et al., "Axiomatic Attribution for Deep Networks", ICML 2017.
pub(crate) fn integrated_gradients<B: AutodiffBackend>(
    stages: &[Stage<B>],
    input: Tensor<B::InnerBackend, 4>,
    reference: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
    steps: usize,
) -> Result<Tensor<B::InnerBackend, 4>> {
    check_steps(steps)?;
    let diff = input - reference.clone();
    let mut integral = diff.zeros_like();

    for k in 1..=steps {
        let alpha = k as f32 / steps as f32;
        let point = reference.clone() + diff.clone() * alpha;
        integral = integral + spatial_gradient::<B>(stages, point, seed.clone())?;
    }

    Ok(diff * integral / steps as f32)
}

/// Integrated gradients along an arbitrary path.
///
/// Sums `grad(p_k) ⊙ (p_k - p_{k-1})` over `p_k = path(input, reference, k / steps)`.
pub(crate) fn path_integrated_gradients<B: AutodiffBackend>(
    stages: &[Stage<B>],
    input: Tensor<B::InnerBackend, 4>,
    reference: Tensor<B::InnerBackend, 4>,
    seed: Tensor<B::InnerBackend, 2>,
    steps: usize,
    path: &InterpolationPath<B::InnerBackend>,
) -> Result<Tensor<B::InnerBackend, 4>> {
    check_steps(steps)?;
    let dims = input.dims();
    let mut previous = path.point(&input, &reference, 0.0);
    let mut integral = input.zeros_like();

    for k in 1..=steps {
        let alpha = k as f32 / steps as f32;
        let current = path.point(&input, &reference, alpha);
        if current.dims() != dims {
            return Err(CoreError::shape(
                format!("path points shaped like the input {dims:?}"),
                &current.dims(),
            )
            .into());
        }
        let gradient = spatial_gradient::<B>(stages, current.clone(), seed.clone())?;
        integral = integral + gradient * (current.clone() - previous);
        previous = current;
    }

    Ok(integral)
}

fn check_steps(steps: usize) -> Result<()> {
    if steps == 0 {
        return Err(ExplainError::State(
            "path integration needs at least one step".to_string(),
        ));
    }
    Ok(())
}
