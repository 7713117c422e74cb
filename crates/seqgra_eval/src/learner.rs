//! The model side of an evaluation.

use burn::module::Module;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, Array3};

use seqgra_core::{encode_labels, ModelMetadata, SequenceModel};
use seqgra_explain::BoundModel;

use crate::error::Result;

/// A trained model together with what it needs to encode its inputs.
pub trait Learner<B: AutodiffBackend> {
    /// The wrapped model.
    type Model: SequenceModel<B> + Module<B>;

    /// Sequence space, convention, task and labels of the model.
    fn metadata(&self) -> &ModelMetadata;

    /// One-hot encode sequences to `(N, W, C)`.
    fn encode_x(&self, x: &[String]) -> Result<Array3<f32>> {
        Ok(self.metadata().sequence_space.encode_batch(x)?)
    }

    /// Encode label strings to an `(N, K)` indicator matrix.
    fn encode_y(&self, y: &[String]) -> Result<Array2<bool>> {
        let metadata = self.metadata();
        Ok(encode_labels(y, &metadata.labels, metadata.task)?)
    }

    /// The bound model.
    fn model(&self) -> &BoundModel<B, Self::Model>;

    /// The bound model, for mode switches and device placement.
    fn model_mut(&mut self) -> &mut BoundModel<B, Self::Model>;
}

/// A [`Learner`] for any layered model, encoding with the one-hot encoders of
/// its sequence space.
#[derive(Debug, Clone)]
pub struct ModelLearner<B: AutodiffBackend, M> {
    metadata: ModelMetadata,
    model: BoundModel<B, M>,
}

impl<B: AutodiffBackend, M: SequenceModel<B> + Module<B>> ModelLearner<B, M> {
    /// Wrap `model`, whose parameters live on `device`.
    pub fn new(metadata: ModelMetadata, model: M, device: B::Device) -> Self {
        Self {
            metadata,
            model: BoundModel::new(model, device),
        }
    }
}

impl<B: AutodiffBackend, M: SequenceModel<B> + Module<B>> Learner<B> for ModelLearner<B, M> {
    type Model = M;

    fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    fn model(&self) -> &BoundModel<B, M> {
        &self.model
    }

    fn model_mut(&mut self) -> &mut BoundModel<B, M> {
        &mut self.model
    }
}
