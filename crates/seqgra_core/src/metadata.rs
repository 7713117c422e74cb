//! Model metadata: what a trained model expects from its inputs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::alphabet::SequenceSpace;
use crate::error::{CoreError, Result};
use crate::labels::TaskType;
use crate::layout::TensorConvention;

/// Model metadata as written in a model definition file.
///
/// Every field is a plain string so that unknown values surface as
/// [`CoreError::Configuration`] when converted, not as parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDefinition {
    /// Model identifier, used in output paths.
    pub model_id: String,
    /// Sequence space name (`DNA` or `protein`).
    pub sequence_space: String,
    /// Tensor convention name (`channels-last` / `A` or `channels-first` / `B`).
    pub convention: String,
    /// Task name, e.g. `multi-class classification`.
    pub task: String,
    /// Class labels in output order.
    pub labels: Vec<String>,
}

/// Validated model metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelMetadata {
    /// Model identifier.
    pub model_id: String,
    /// Alphabet of the encoded inputs.
    pub sequence_space: SequenceSpace,
    /// Axis order the model consumes and produces.
    pub convention: TensorConvention,
    /// Learning task.
    pub task: TaskType,
    /// Class labels in output order.
    pub labels: Vec<String>,
}

impl ModelMetadata {
    /// Create metadata from already-typed parts.
    pub fn new(
        model_id: impl Into<String>,
        sequence_space: SequenceSpace,
        convention: TensorConvention,
        task: TaskType,
        labels: Vec<String>,
    ) -> Self {
        Self {
            model_id: model_id.into(),
            sequence_space,
            convention,
            task,
            labels,
        }
    }

    /// Number of output labels.
    pub fn n_labels(&self) -> usize {
        self.labels.len()
    }

    /// Number of input channels.
    pub fn n_channels(&self) -> usize {
        self.sequence_space.alphabet_size()
    }

    /// Load and validate a JSON model definition.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        let definition: ModelDefinition = serde_json::from_str(&json)?;
        Self::try_from(definition)
    }

    /// The string form of this metadata.
    pub fn to_definition(&self) -> ModelDefinition {
        ModelDefinition {
            model_id: self.model_id.clone(),
            sequence_space: self.sequence_space.to_string(),
            convention: self.convention.to_string(),
            task: self.task.to_string(),
            labels: self.labels.clone(),
        }
    }
}

impl TryFrom<ModelDefinition> for ModelMetadata {
    type Error = CoreError;

    fn try_from(definition: ModelDefinition) -> Result<Self> {
        if definition.labels.is_empty() {
            return Err(CoreError::Configuration(format!(
                "model '{}' declares no labels",
                definition.model_id
            )));
        }
        Ok(Self {
            sequence_space: definition.sequence_space.parse()?,
            convention: definition.convention.parse()?,
            task: definition.task.parse()?,
            model_id: definition.model_id,
            labels: definition.labels,
        })
    }
}
