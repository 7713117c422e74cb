//! # seqgra
//!
//! Attribution evaluation for biological sequence classifiers.
//!
//! seqgra explains the predictions of trained DNA and protein classifiers and
//! scores the explanations against ground-truth grammar annotations:
//!
//! - **Core**: alphabets, tensor conventions, shape validation and the layered
//!   model trait
//! - **Data**: dataset splits, tab-separated example and annotation tables
//! - **Models**: a convolutional sequence classifier and its model directory
//! - **Explain**: gradient, Grad-CAM, DeepLIFT and excitation backprop
//!   attribution strategies
//! - **Eval**: the attribution evaluator, agreement classification and
//!   artifact output
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use seqgra::prelude::*;
//!
//! let device = Default::default();
//! let (metadata, model) = load_bundle::<Autodiff<NdArray>>("models/m1", &device)?;
//! let learner = ModelLearner::new(metadata, model, device);
//!
//! let config = EvaluatorConfig::default();
//! let strategy = StrategyKind::IntegratedGradients.build(&config.strategy);
//! let mut evaluator = AttributionEvaluator::new(
//!     learner,
//!     strategy,
//!     DataDirectory::new("data/g1"),
//!     "out/ig",
//!     &config,
//!     device,
//! )?;
//! let output = evaluator.evaluate(DataSet::Test)?;
//! ```
//!
//! ## Feature Flags
//!
//! - `backend-ndarray` (default): CPU backend using ndarray
//! - `backend-wgpu`: GPU backend using WGPU (Metal on macOS, Vulkan on Linux/Windows)
//! - `backend-tch`: PyTorch backend via tch-rs

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export all crates
pub use seqgra_core as core;
pub use seqgra_data as data;
pub use seqgra_eval as eval;
pub use seqgra_explain as explain;
pub use seqgra_models as models;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use seqgra::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use seqgra_core::{
        LayoutNormalizer, ModelMetadata, Seed, SequenceModel, SequenceSpace, TaskType,
        TensorConvention,
    };

    // Data
    pub use seqgra_data::{
        DataDirectory, DataSet, DataValidation, ExampleSource, InMemorySource, SplitData,
    };

    // Models
    pub use seqgra_models::{load_bundle, save_bundle, SequenceCnn, SequenceCnnConfig};

    // Explain
    pub use seqgra_explain::{
        AttributionMap, AttributionStrategy, BoundModel, Contrast, InterpolationPath, Reference,
        StrategyConfig, StrategyKind,
    };

    // Eval
    pub use seqgra_eval::{
        AgreementClassifier, AgreementGroup, AgreementSummary, AttributionEvaluator,
        EvaluationOutput, EvaluatorConfig, Learner, ModelLearner,
    };
}

/// All module for importing everything.
pub mod all {
    pub use super::prelude::*;

    // Additional exports
    pub use seqgra_core::backend;
    pub use seqgra_eval::artifact::{read_agreement_table, write_agreement_table};
    pub use seqgra_eval::{AgreementCounts, AgreementRow, EvalError};
    pub use seqgra_explain::ActivationCapture;
}
