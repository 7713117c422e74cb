//! # seqgra_eval
//!
//! Attribution evaluators for seqgra.
//!
//! This crate provides:
//! - [`Learner`], the model side of an evaluation, and [`ModelLearner`]
//! - [`AttributionEvaluator`], which encodes a split, runs a strategy and
//!   writes `<split>.npy` and `<split>-agreement.txt`
//! - [`AgreementClassifier`], which scores importance against ground-truth
//!   annotations, and [`AgreementSummary`] with the derived metrics
//! - [`EvaluatorConfig`] read from JSON

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod agreement;
pub mod artifact;
mod config;
mod error;
mod evaluator;
mod learner;
mod summary;

pub use agreement::{AgreementClassifier, AgreementGroup, AgreementRow, DEFAULT_THRESHOLD};
pub use config::EvaluatorConfig;
pub use error::{EvalError, Result};
pub use evaluator::{AttributionEvaluator, EvaluationOutput};
pub use learner::{Learner, ModelLearner};
pub use summary::{AgreementCounts, AgreementSummary};
