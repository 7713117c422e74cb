//! # seqgra_models
//!
//! Sequence classifiers for seqgra.
//!
//! - [`SequenceCnn`] - convolution, max pooling and dense layers over one-hot
//!   encoded sequences, exposed as named stages for attribution
//! - [`checkpoint`] - model directories with a JSON definition and burn weights

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checkpoint;
mod cnn;

pub use checkpoint::{load_bundle, save_bundle, CheckpointError, ModelFile};
pub use cnn::{SequenceCnn, SequenceCnnConfig};
