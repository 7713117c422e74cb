//! # seqgra_core
//!
//! Core types and traits for seqgra attribution evaluation.
//!
//! This crate provides:
//! - [`SequenceSpace`] alphabets and one-hot encoding
//! - [`TensorConvention`], [`LayoutNormalizer`] and [`validate_shape`] for
//!   moving tensors between axis conventions without losing the channel and
//!   height invariants
//! - [`TaskType`] and label encoding
//! - [`ModelMetadata`] describing what a trained model expects
//! - [`SequenceModel`], the layered model trait attribution methods work on
//! - [`Seed`] for deterministic random streams
//! - Error types shared by all seqgra crates
//!
//! ## Shape Convention
//!
//! Encoded batches are `(N, W, C)`:
//! - `N`: number of examples
//! - `W`: sequence length (positions)
//! - `C`: alphabet size, 4 for DNA and 20 for protein
//!
//! ## Example
//!
//! ```rust
//! use seqgra_core::{LayoutNormalizer, SequenceSpace, TensorConvention, validate_shape};
//!
//! let encoded = SequenceSpace::Dna.encode_batch(&["ACGT", "GGCA"]).unwrap();
//! let tensor = LayoutNormalizer::to_layout(&encoded, TensorConvention::ChannelsFirst);
//! assert_eq!(tensor.shape(), &[2, 4, 1, 4]);
//! validate_shape(tensor.shape(), SequenceSpace::Dna, TensorConvention::ChannelsFirst).unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod alphabet;
pub mod annotation;
mod error;
mod labels;
pub mod layout;
mod metadata;
mod model_trait;
mod seed;

pub use alphabet::SequenceSpace;
pub use annotation::PositionType;
pub use error::{CoreError, Result};
pub use labels::{encode_labels, split_labels, TaskType, MULTI_LABEL_SEPARATOR};
pub use layout::{array_from_vec, validate_shape, AxisLayout, LayoutNormalizer, TensorConvention};
pub use metadata::{ModelDefinition, ModelMetadata};
pub use model_trait::{forward_stages, Activation, SequenceModel, Stage, StageOp};
pub use seed::Seed;

/// Backend type aliases for convenience
pub mod backend {
    #[cfg(feature = "backend-ndarray")]
    pub use burn_ndarray::NdArray;

    #[cfg(feature = "backend-wgpu")]
    pub use burn_wgpu::Wgpu;

    #[cfg(feature = "backend-tch")]
    pub use burn_tch::LibTorch;
}
