//! Model checkpointing and serialization utilities.
//!
//! A trained model lives in a directory with two files:
//!
//! - `model.json`: model definition (id, sequence space, convention, task,
//!   labels) and architecture
//! - `model.mpk`: weights as a named MessagePack record in full precision
//!
//! # Example
//!
//! ```rust,ignore
//! use seqgra_models::checkpoint::{load_bundle, save_bundle};
//!
//! save_bundle("models/mc2-dna150", &metadata, &config, &model)?;
//! let (metadata, model) = load_bundle::<NdArray>("models/mc2-dna150", &device)?;
//! ```

use std::path::Path;

use burn::module::Module;
use burn::prelude::*;
use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder, Recorder};
use serde::{Deserialize, Serialize};

use seqgra_core::{ModelDefinition, ModelMetadata};

use crate::cnn::{SequenceCnn, SequenceCnnConfig};

/// File name of the model description inside a model directory.
pub const MODEL_FILE: &str = "model.json";
/// File name of the weights inside a model directory.
pub const WEIGHTS_FILE: &str = "model.mpk";

/// Contents of `model.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelFile {
    /// What the model expects from its inputs.
    pub definition: ModelDefinition,
    /// Layer sizes.
    pub architecture: SequenceCnnConfig,
}

impl ModelFile {
    /// Save to a JSON file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CheckpointError::Save(e.to_string()))?;
        std::fs::write(path, json).map_err(|e| CheckpointError::Save(e.to_string()))?;
        Ok(())
    }

    /// Load from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json =
            std::fs::read_to_string(path).map_err(|e| CheckpointError::Load(e.to_string()))?;
        serde_json::from_str(&json).map_err(|e| CheckpointError::Load(e.to_string()))
    }
}

/// Save a model's weights.
pub fn save_model<B, M>(model: &M, path: impl AsRef<Path>) -> Result<()>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    recorder
        .record(model.clone().into_record(), path.as_ref().to_path_buf())
        .map_err(|e| CheckpointError::Save(e.to_string()))?;
    Ok(())
}

/// Load weights into `model`.
pub fn load_model<B, M>(model: M, path: impl AsRef<Path>, device: &B::Device) -> Result<M>
where
    B: Backend,
    M: Module<B>,
{
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let record: M::Record = recorder
        .load(path.as_ref().to_path_buf(), device)
        .map_err(|e| CheckpointError::Load(e.to_string()))?;
    Ok(model.load_record(record))
}

/// Write `model.json` and `model.mpk` into `dir`, creating it if needed.
pub fn save_bundle<B: Backend>(
    dir: impl AsRef<Path>,
    metadata: &ModelMetadata,
    config: &SequenceCnnConfig,
    model: &SequenceCnn<B>,
) -> Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir).map_err(|e| CheckpointError::Save(e.to_string()))?;

    ModelFile {
        definition: metadata.to_definition(),
        architecture: config.clone(),
    }
    .save(dir.join(MODEL_FILE))?;
    save_model::<B, _>(model, dir.join(WEIGHTS_FILE))?;

    tracing::info!("Saved model '{}' to {:?}", metadata.model_id, dir);
    Ok(())
}

/// Read a model directory written by [`save_bundle`].
///
/// # Errors
///
/// [`CheckpointError::Definition`] when the model definition names an unknown
/// sequence space, convention or task, or disagrees with the architecture.
pub fn load_bundle<B: Backend>(
    dir: impl AsRef<Path>,
    device: &B::Device,
) -> Result<(ModelMetadata, SequenceCnn<B>)> {
    let dir = dir.as_ref();
    let file = ModelFile::load(dir.join(MODEL_FILE))?;
    let metadata = ModelMetadata::try_from(file.definition)?;

    if metadata.n_channels() != file.architecture.n_channels
        || metadata.n_labels() != file.architecture.n_classes
    {
        return Err(CheckpointError::Definition(seqgra_core::CoreError::Configuration(format!(
            "model '{}' declares {} channels and {} labels, architecture has {} and {}",
            metadata.model_id,
            metadata.n_channels(),
            metadata.n_labels(),
            file.architecture.n_channels,
            file.architecture.n_classes
        ))));
    }

    let model = load_model::<B, _>(file.architecture.init(device), dir.join(WEIGHTS_FILE), device)?;
    tracing::info!("Loaded model '{}' from {:?}", metadata.model_id, dir);
    Ok((metadata, model))
}

/// Result type for checkpoint operations.
pub type Result<T> = std::result::Result<T, CheckpointError>;

/// Checkpoint-related errors.
#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    /// Error saving checkpoint.
    #[error("Failed to save checkpoint: {0}")]
    Save(String),

    /// Error loading checkpoint.
    #[error("Failed to load checkpoint: {0}")]
    Load(String),

    /// The model definition is invalid.
    #[error("Invalid model definition: {0}")]
    Definition(#[from] seqgra_core::CoreError),
}
