//! A model bound to a device with an explicit inference switch.

use burn::module::Module;
use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;

use seqgra_core::SequenceModel;

use crate::error::{ExplainError, Result};

/// A model together with the device it lives on and its mode.
///
/// Models start in training mode. Attribution requires [`BoundModel::eval`]
/// to have been called; strategies refuse to run otherwise.
#[derive(Debug, Clone)]
pub struct BoundModel<B: AutodiffBackend, M> {
    model: M,
    device: B::Device,
    inference: bool,
}

impl<B: AutodiffBackend, M: SequenceModel<B>> BoundModel<B, M> {
    /// Bind `model`, whose parameters already live on `device`.
    pub fn new(model: M, device: B::Device) -> Self {
        Self {
            model,
            device,
            inference: false,
        }
    }

    /// Switch to inference mode.
    pub fn eval(&mut self) {
        self.inference = true;
    }

    /// Switch back to training mode.
    pub fn train(&mut self) {
        self.inference = false;
    }

    /// Whether the model is in inference mode.
    pub fn is_inference(&self) -> bool {
        self.inference
    }

    /// The device holding the parameters.
    pub fn device(&self) -> &B::Device {
        &self.device
    }

    /// The wrapped model.
    pub fn model(&self) -> &M {
        &self.model
    }

    /// Unwrap the model.
    pub fn into_inner(self) -> M {
        self.model
    }

    /// Check the preconditions every strategy shares.
    ///
    /// # Errors
    ///
    /// [`ExplainError::State`] when the model is not in inference mode or the
    /// input does not track gradients.
    pub fn ensure_ready(&self, input: &Tensor<B, 4>) -> Result<()> {
        if !self.inference {
            return Err(ExplainError::State(
                "model is in training mode; call eval() before computing attributions".to_string(),
            ));
        }
        if !input.is_require_grad() {
            return Err(ExplainError::State(
                "input tensor does not track gradients; call require_grad() on it".to_string(),
            ));
        }
        Ok(())
    }
}

impl<B: AutodiffBackend, M: SequenceModel<B> + Module<B>> BoundModel<B, M> {
    /// Move the parameters to `device`.
    ///
    /// Returns `false` without touching the model when it already lives there.
    pub fn to_device(&mut self, device: &B::Device) -> bool {
        if &self.device == device {
            return false;
        }
        tracing::debug!("Moving model from {:?} to {:?}", self.device, device);
        self.model = self.model.clone().to_device(device);
        self.device = device.clone();
        true
    }
}
