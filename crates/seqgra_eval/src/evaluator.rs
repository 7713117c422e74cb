//! The attribution evaluator: examples in, importance and agreement
//! artifacts out.

use std::fs;
use std::path::{Path, PathBuf};

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use ndarray::{Array2, ArrayD};

use seqgra_core::{array_from_vec, validate_shape, CoreError, LayoutNormalizer, SequenceModel, TensorConvention};
use seqgra_data::{DataSet, ExampleSource};
use seqgra_explain::{AttributionStrategy, StrategyKind};

use crate::agreement::AgreementClassifier;
use crate::artifact::StagedArtifacts;
use crate::config::EvaluatorConfig;
use crate::error::Result;
use crate::learner::Learner;
use crate::summary::AgreementSummary;

/// Axis order the strategies work in.
const STRATEGY_CONVENTION: TensorConvention = TensorConvention::ChannelsFirst;

/// What one evaluation wrote.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutput {
    /// The evaluated split.
    pub set: DataSet,
    /// Raw importance, `<split>.npy`.
    pub importance_path: PathBuf,
    /// Agreement table, `<split>-agreement.txt`, when agreement is scored.
    pub agreement_path: Option<PathBuf>,
    /// Agreement metrics, when agreement is scored.
    pub summary: Option<AgreementSummary>,
}

/// Runs one attribution strategy over the splits of a data source.
///
/// # Example
///
/// ```rust,ignore
/// let strategy = StrategyKind::Saliency.build(&config.strategy);
/// let mut evaluator = AttributionEvaluator::new(learner, strategy, source, "out/saliency", &config, device)?;
/// let output = evaluator.evaluate(DataSet::Test)?;
/// ```
pub struct AttributionEvaluator<B: AutodiffBackend, L: Learner<B>, S: ExampleSource> {
    learner: L,
    strategy: AttributionStrategy<B>,
    source: S,
    output_dir: PathBuf,
    classifier: AgreementClassifier,
    agreement: bool,
    device: B::Device,
}

impl<B: AutodiffBackend, L: Learner<B>, S: ExampleSource> AttributionEvaluator<B, L, S> {
    /// Create an evaluator.
    ///
    /// # Arguments
    ///
    /// * `learner` - The model and its encoders
    /// * `strategy` - The attribution strategy
    /// * `source` - Where the splits come from
    /// * `output_dir` - Directory receiving the artifacts
    /// * `config` - Relevance threshold and agreement switch
    /// * `device` - Device the attributions are computed on
    ///
    /// # Errors
    ///
    /// [`CoreError::Configuration`] for a non-finite relevance threshold,
    /// regression models, an unknown or non-spatial Grad-CAM stage, or a
    /// contrast class the model does not have.
    pub fn new(
        learner: L,
        strategy: AttributionStrategy<B>,
        source: S,
        output_dir: impl Into<PathBuf>,
        config: &EvaluatorConfig,
        device: B::Device,
    ) -> Result<Self> {
        config.validate()?;
        let metadata = learner.metadata();
        if !metadata.task.is_classification() {
            return Err(CoreError::Configuration(format!(
                "{} cannot explain model '{}': {} is not a classification task",
                strategy.kind().name(),
                metadata.model_id,
                metadata.task
            ))
            .into());
        }
        if learner.model().model().n_classes() != metadata.n_labels() {
            return Err(CoreError::Configuration(format!(
                "model '{}' declares {} labels but has {} outputs",
                metadata.model_id,
                metadata.n_labels(),
                learner.model().model().n_classes()
            ))
            .into());
        }
        strategy.check_model(learner.model().model())?;

        let output_dir = output_dir.into();
        tracing::info!(
            "Created {} evaluator for model '{}' writing to {:?}",
            strategy.kind(),
            metadata.model_id,
            output_dir
        );

        Ok(Self {
            learner,
            strategy,
            source,
            output_dir,
            classifier: AgreementClassifier::new(config.relevance_threshold),
            agreement: config.agreement,
            device,
        })
    }

    /// The strategy identifier.
    pub fn id(&self) -> StrategyKind {
        self.strategy.kind()
    }

    /// Directory receiving the artifacts.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Path of the importance artifact of `set`.
    pub fn importance_path(&self, set: DataSet) -> PathBuf {
        self.output_dir.join(format!("{}.npy", set.as_str()))
    }

    /// Path of the agreement artifact of `set`.
    pub fn agreement_path(&self, set: DataSet) -> PathBuf {
        self.output_dir.join(format!("{}-agreement.txt", set.as_str()))
    }

    /// Explain one split and write its artifacts.
    ///
    /// Nothing is written unless every step succeeds.
    pub fn evaluate(&mut self, set: DataSet) -> Result<EvaluationOutput> {
        tracing::info!("Evaluating {} on {} set", self.id(), set);
        let data = self.source.load_split(set)?;
        data.check_counts()?;
        if data.is_empty() {
            return Err(CoreError::DataMismatch(format!("{set} set has no examples")).into());
        }

        let metadata = self.learner.metadata().clone();
        let space = metadata.sequence_space;
        let convention = metadata.convention;

        let encoded = self.learner.encode_x(&data.x)?;
        let labels = self.learner.encode_y(&data.y)?;

        let model_input = LayoutNormalizer::to_layout(&encoded, convention);
        validate_shape(model_input.shape(), space, convention)?;
        let strategy_input = LayoutNormalizer::convert(&model_input, convention, STRATEGY_CONVENTION)?;
        validate_shape(strategy_input.shape(), space, STRATEGY_CONVENTION)?;

        if self.learner.model_mut().to_device(&self.device) {
            tracing::info!("Moved model to {:?}", self.device);
        }
        let input = input_tensor::<B>(&strategy_input, &self.device)?.require_grad();
        let targets = target_tensor::<B>(&labels, &self.device);

        self.learner.model_mut().eval();
        let map = self.strategy.explain(self.learner.model(), input, targets)?;
        let shape = map.shape();
        let importance = array_from_vec(&shape, map.into_vec()?)?;
        validate_shape(importance.shape(), space, STRATEGY_CONVENTION)?;
        let importance = LayoutNormalizer::convert(&importance, STRATEGY_CONVENTION, convention)?;
        validate_shape(importance.shape(), space, convention)?;

        let rows = if self.agreement {
            Some(self.classifier.classify(&importance, convention, &data.y, &data.annotations)?)
        } else {
            None
        };

        fs::create_dir_all(&self.output_dir)?;
        let importance_path = self.importance_path(set);
        let agreement_path = rows.as_ref().map(|_| self.agreement_path(set));
        let mut staged = StagedArtifacts::new();
        staged.write_importance(&importance_path, &importance)?;
        if let (Some(rows), Some(path)) = (&rows, &agreement_path) {
            staged.write_agreement(path, rows)?;
        }
        staged.commit()?;

        let summary = rows.as_deref().map(AgreementSummary::from_rows);
        if let Some(summary) = &summary {
            tracing::info!(
                "{} on {} set: precision {:.3}, recall {:.3}, f1 {:.3} over {} positions",
                self.id(),
                set,
                summary.overall.precision(),
                summary.overall.recall(),
                summary.overall.f1(),
                summary.overall.total()
            );
            tracing::debug!("\n{}", summary.to_string_table());
        }

        Ok(EvaluationOutput {
            set,
            importance_path,
            agreement_path,
            summary,
        })
    }

    /// Evaluate the training, validation and test sets in that order.
    ///
    /// Stops at the first failing split.
    pub fn evaluate_all(&mut self) -> Result<Vec<EvaluationOutput>> {
        DataSet::ALL.into_iter().map(|set| self.evaluate(set)).collect()
    }

    /// Unwrap the learner.
    pub fn into_learner(self) -> L {
        self.learner
    }
}

fn input_tensor<B: Backend>(array: &ArrayD<f32>, device: &B::Device) -> Result<Tensor<B, 4>> {
    let shape: [usize; 4] = array
        .shape()
        .try_into()
        .map_err(|_| CoreError::shape("rank 4 strategy input", array.shape()))?;
    let values: Vec<f32> = array.iter().copied().collect();
    Ok(Tensor::from_data(TensorData::new(values, shape), device))
}

fn target_tensor<B: Backend>(labels: &Array2<bool>, device: &B::Device) -> Tensor<B, 2, Int> {
    let (n, k) = labels.dim();
    let values: Vec<i64> = labels.iter().map(|&l| i64::from(l)).collect();
    Tensor::from_data(TensorData::new(values, [n, k]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use crate::learner::ModelLearner;
    use burn_autodiff::Autodiff;
    use seqgra_core::backend::NdArray;
    use seqgra_core::{ModelMetadata, SequenceSpace, TaskType};
    use seqgra_data::{InMemorySource, SplitData};
    use seqgra_explain::{ExplainError, StrategyConfig};
    use seqgra_models::{SequenceCnn, SequenceCnnConfig};

    type TestBackend = Autodiff<NdArray>;
    type TestLearner = ModelLearner<TestBackend, SequenceCnn<TestBackend>>;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn learner(convention: TensorConvention, task: TaskType) -> TestLearner {
        let device = Default::default();
        let model = SequenceCnnConfig::new(4, 8, 2)
            .with_filters(3)
            .with_kernel_size(3)
            .with_pool_size(2)
            .init::<TestBackend>(&device);
        let metadata = ModelMetadata::new(
            "cnn",
            SequenceSpace::Dna,
            convention,
            task,
            strings(&["c1", "c2"]),
        );
        ModelLearner::new(metadata, model, device)
    }

    fn source(annotations: &[&str]) -> InMemorySource {
        let split = SplitData::new(
            strings(&["ACGTACGT", "GGGGCCCC", "ATATATAT"]),
            strings(&["c1", "c2", "c1"]),
            strings(annotations),
        )
        .unwrap();
        InMemorySource::new().with_split(DataSet::Test, split)
    }

    fn evaluator(
        kind: StrategyKind,
        config: &EvaluatorConfig,
        annotations: &[&str],
        dir: &Path,
    ) -> Result<AttributionEvaluator<TestBackend, TestLearner, InMemorySource>> {
        AttributionEvaluator::new(
            learner(TensorConvention::ChannelsLast, TaskType::MultiClass),
            kind.build(&config.strategy),
            source(annotations),
            dir.join(kind.id()),
            config,
            Default::default(),
        )
    }

    #[test]
    fn test_evaluate_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default();
        let mut evaluator =
            evaluator(StrategyKind::Saliency, &config, &["__GG____", "________", "GGGGGGGG"], dir.path()).unwrap();

        let output = evaluator.evaluate(DataSet::Test).unwrap();
        assert_eq!(output.importance_path, dir.path().join("saliency").join("test.npy"));
        assert!(output.importance_path.exists());
        let table = output.agreement_path.unwrap();
        assert!(table.exists());

        let importance: ArrayD<f32> = ndarray_npy::read_npy(&output.importance_path).unwrap();
        assert_eq!(importance.shape(), &[3, 8, 4]);

        let rows = crate::artifact::read_agreement_table(&table).unwrap();
        assert_eq!(rows.len(), 3 * 8);
        let summary = output.summary.unwrap();
        assert_eq!(summary.overall.total(), 24);
        assert_eq!(summary.overall.true_positives + summary.overall.false_negatives, 10);
    }

    #[test]
    fn test_importance_keeps_model_convention() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default().with_agreement(false);
        let mut evaluator = AttributionEvaluator::new(
            learner(TensorConvention::ChannelsFirst, TaskType::MultiClass),
            StrategyKind::Gradient.build::<TestBackend>(&config.strategy),
            source(&["", "", ""]),
            dir.path(),
            &config,
            Default::default(),
        )
        .unwrap();

        let output = evaluator.evaluate(DataSet::Test).unwrap();
        assert!(output.agreement_path.is_none());
        assert!(output.summary.is_none());
        assert!(!evaluator.agreement_path(DataSet::Test).exists());
        let importance: ArrayD<f32> = ndarray_npy::read_npy(&output.importance_path).unwrap();
        assert_eq!(importance.shape(), &[3, 4, 1, 8]);
    }

    #[test]
    fn test_regression_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default();
        let result = AttributionEvaluator::new(
            learner(TensorConvention::ChannelsLast, TaskType::MultipleRegression),
            StrategyKind::Gradient.build::<TestBackend>(&config.strategy),
            source(&["", "", ""]),
            dir.path(),
            &config,
            Default::default(),
        );
        assert!(matches!(result, Err(EvalError::Core(CoreError::Configuration(_)))));
    }

    #[test]
    fn test_nan_threshold_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default().with_threshold(f32::NAN);
        let result = evaluator(StrategyKind::Saliency, &config, &["", "", ""], dir.path());
        assert!(matches!(result, Err(EvalError::Core(CoreError::Configuration(_)))));
    }

    #[test]
    fn test_grad_cam_stage_checked_at_construction() {
        let dir = tempfile::tempdir().unwrap();
        for layer in ["conv9", "output"] {
            let config = EvaluatorConfig::default().with_strategy(StrategyConfig::default().with_layer(layer));
            let result = evaluator(StrategyKind::GradCam, &config, &["", "", ""], dir.path());
            assert!(matches!(result, Err(EvalError::Core(CoreError::Configuration(_)))));
        }
    }

    #[test]
    fn test_failure_leaves_no_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default();
        let mut evaluator =
            evaluator(StrategyKind::Gradient, &config, &["GG__", "________", "________"], dir.path()).unwrap();

        let err = evaluator.evaluate(DataSet::Test).unwrap_err();
        assert!(matches!(err, EvalError::Core(CoreError::DataMismatch(_))));
        assert!(!evaluator.importance_path(DataSet::Test).exists());
        assert!(!evaluator.agreement_path(DataSet::Test).exists());
    }

    #[test]
    fn test_missing_reference_is_state_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default();
        let mut evaluator = evaluator(StrategyKind::DeepLift, &config, &["", "", ""], dir.path()).unwrap();

        let err = evaluator.evaluate(DataSet::Test).unwrap_err();
        assert!(matches!(err, EvalError::Explain(ExplainError::State(_))));
        assert!(!evaluator.output_dir().exists());
    }

    #[test]
    fn test_missing_split() {
        let dir = tempfile::tempdir().unwrap();
        let config = EvaluatorConfig::default();
        let mut evaluator = evaluator(StrategyKind::Gradient, &config, &["", "", ""], dir.path()).unwrap();
        assert!(matches!(evaluator.evaluate_all(), Err(EvalError::Data(_))));
    }
}
