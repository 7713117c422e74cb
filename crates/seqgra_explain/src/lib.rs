//! # seqgra_explain
//!
//! Attribution strategies for seqgra sequence models.
//!
//! This crate provides:
//! - [`BoundModel`], a model with its device and an explicit inference switch
//! - [`AttributionStrategy`], nine gradient-based attribution algorithms
//!   behind one `explain` contract
//! - [`Reference`] inputs for the path and difference-from-reference methods
//! - [`ActivationCapture`] for recording stage activations
//!
//! All strategies work on `(N, C, 1, W)` inputs (channels first, singleton
//! height) and return maps of the same shape.
//!
//! ## Example
//!
//! ```rust,ignore
//! use seqgra_explain::{AttributionStrategy, BoundModel, Reference};
//!
//! let mut bound = BoundModel::new(model, device);
//! bound.eval();
//! let strategy = AttributionStrategy::IntegratedGradients { reference: Reference::Zeros, steps: 50 };
//! let map = strategy.explain(&bound, x.require_grad(), targets)?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

mod activation;
mod attribution;
mod bound;
mod deeplift;
mod error;
mod excitation;
mod gradcam;
mod gradient;
mod propagate;
mod reference;

#[cfg(test)]
mod testing;

pub use activation::ActivationCapture;
pub use attribution::{AttributionMap, AttributionStrategy, StrategyConfig, StrategyKind, DEFAULT_STEPS};
pub use bound::BoundModel;
pub use error::{ExplainError, Result};
pub use excitation::Contrast;
pub use gradient::InterpolationPath;
pub use reference::Reference;
