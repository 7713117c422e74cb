//! # seqgra_data
//!
//! Example data for seqgra evaluators.
//!
//! This crate provides:
//! - [`DataSet`] naming the training, validation and test splits
//! - [`SplitData`] holding the parallel examples, labels and annotations
//! - [`ExampleSource`] with a directory-backed and an in-memory implementation
//! - TSV readers and writers for example and annotation tables
//! - Upstream validation of sequences, labels and annotations
//!
//! ## Example
//!
//! ```rust,ignore
//! use seqgra_data::{DataDirectory, DataSet, ExampleSource};
//!
//! let source = DataDirectory::new("data/mc2-dna150");
//! let test = source.load_split(DataSet::Test)?;
//! println!("{} test examples", test.len());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod dataset;
mod error;
pub mod io;
mod source;
pub mod validation;

pub use dataset::{DataSet, SplitData};
pub use error::{DataError, Result};
pub use io::{AnnotationRecord, ExampleRecord};
pub use source::{DataDirectory, ExampleSource, InMemorySource};
pub use validation::DataValidation;
