//! Integration tests for the evaluation pipeline.
//!
//! These tests write a model directory and a data directory to disk, run
//! evaluators over them and check the artifacts.

use std::path::Path;

use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use ndarray::ArrayD;

use seqgra::all::*;
use seqgra::data::io::{write_annotations, write_examples};
use seqgra::data::{AnnotationRecord, ExampleRecord};
use seqgra::explain::ExplainError;

type EvalBackend = Autodiff<NdArray>;
type EvalLearner = ModelLearner<EvalBackend, SequenceCnn<EvalBackend>>;

const SEQ_LEN: usize = 100;

/// Deterministic sequence of `len` nucleotides.
fn sequence(offset: usize, len: usize) -> String {
    const NUCLEOTIDES: [char; 4] = ['A', 'C', 'G', 'T'];
    (0..len)
        .map(|i| NUCLEOTIDES[(i * 7 + offset * 3 + i / 5) % 4])
        .collect()
}

/// Grammar positions `start..start + width`, background elsewhere.
fn annotation(start: usize, width: usize, len: usize) -> String {
    (0..len)
        .map(|i| if i >= start && i < start + width { 'G' } else { '_' })
        .collect()
}

fn write_split(dir: &Path, set: DataSet, n: usize) {
    let examples: Vec<ExampleRecord> = (0..n)
        .map(|i| ExampleRecord {
            x: sequence(i, SEQ_LEN),
            y: if i % 2 == 0 { "c1" } else { "c2" }.to_string(),
        })
        .collect();
    let annotations: Vec<AnnotationRecord> = (0..n)
        .map(|i| AnnotationRecord {
            annotation: annotation(10 + 5 * i, 12, SEQ_LEN),
            y: examples[i].y.clone(),
        })
        .collect();
    write_examples(dir.join(set.examples_file()), &examples).unwrap();
    write_annotations(dir.join(set.annotations_file()), &annotations).unwrap();
}

fn model_config() -> SequenceCnnConfig {
    SequenceCnnConfig::new(4, SEQ_LEN, 2)
        .with_filters(4)
        .with_kernel_size(5)
        .with_pool_size(4)
}

/// Write a model directory and return its metadata.
fn write_model(dir: &Path, convention: TensorConvention) -> ModelMetadata {
    let device = Default::default();
    let config = model_config();
    let model = config.init::<EvalBackend>(&device);
    let metadata = ModelMetadata::new(
        "cnn-dna",
        SequenceSpace::Dna,
        convention,
        TaskType::MultiClass,
        vec!["c1".to_string(), "c2".to_string()],
    );
    save_bundle(dir, &metadata, &config, &model).unwrap();
    metadata
}

fn learner(model_dir: &Path) -> EvalLearner {
    let device = Default::default();
    let (metadata, model) = load_bundle::<EvalBackend>(model_dir, &device).unwrap();
    ModelLearner::new(metadata, model, device)
}

fn evaluator(
    model_dir: &Path,
    data_dir: &Path,
    output_dir: &Path,
    kind: StrategyKind,
    config: &EvaluatorConfig,
) -> seqgra::eval::Result<AttributionEvaluator<EvalBackend, EvalLearner, DataDirectory>> {
    AttributionEvaluator::new(
        learner(model_dir),
        kind.build(&config.strategy),
        DataDirectory::new(data_dir),
        output_dir.join(kind.id()),
        config,
        Default::default(),
    )
}

struct Workspace {
    _root: tempfile::TempDir,
    model_dir: std::path::PathBuf,
    data_dir: std::path::PathBuf,
    output_dir: std::path::PathBuf,
}

fn workspace(convention: TensorConvention) -> Workspace {
    let root = tempfile::tempdir().unwrap();
    let model_dir = root.path().join("model");
    let data_dir = root.path().join("data");
    let output_dir = root.path().join("out");
    std::fs::create_dir_all(&data_dir).unwrap();

    write_model(&model_dir, convention);
    write_split(&data_dir, DataSet::Training, 6);
    write_split(&data_dir, DataSet::Test, 4);

    Workspace {
        _root: root,
        model_dir,
        data_dir,
        output_dir,
    }
}

fn read_importance(path: &Path) -> ArrayD<f32> {
    ndarray_npy::read_npy(path).unwrap()
}

#[test]
fn test_evaluation_pipeline_from_disk() {
    let ws = workspace(TensorConvention::ChannelsLast);
    let config = EvaluatorConfig::default();
    let mut evaluator = evaluator(
        &ws.model_dir,
        &ws.data_dir,
        &ws.output_dir,
        StrategyKind::GradientXInput,
        &config,
    )
    .unwrap();

    let source = DataDirectory::new(&ws.data_dir);
    assert_eq!(source.available_splits(), vec![DataSet::Training, DataSet::Test]);

    for set in source.available_splits() {
        let output = evaluator.evaluate(set).unwrap();
        let n = if set == DataSet::Training { 6 } else { 4 };

        let importance = read_importance(&output.importance_path);
        assert_eq!(importance.shape(), &[n, SEQ_LEN, 4]);

        let rows = read_agreement_table(output.agreement_path.as_ref().unwrap()).unwrap();
        assert_eq!(rows.len(), n * SEQ_LEN);
        assert_eq!(rows[0].example, 0);
        assert_eq!(rows[0].position, 1);
        assert_eq!(rows[SEQ_LEN - 1].position, SEQ_LEN);
        assert_eq!(rows[SEQ_LEN].example, 1);

        let summary = output.summary.unwrap();
        assert_eq!(summary.overall.total(), n * SEQ_LEN);
        assert_eq!(
            summary.overall.true_positives + summary.overall.false_negatives,
            n * 12
        );
    }

    let written: Vec<_> = std::fs::read_dir(ws.output_dir.join("gradient-x-input"))
        .unwrap()
        .map(|e| e.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(written.len(), 4);
    assert!(written.iter().all(|name| !name.ends_with(".part")));
}

#[test]
fn test_grad_cam_restores_sequence_length() {
    let ws = workspace(TensorConvention::ChannelsFirst);
    assert_eq!(model_config().pooled_len(), 25);

    let config = EvaluatorConfig::default()
        .with_agreement(false)
        .with_strategy(StrategyConfig::default().with_layer("pool1"));
    let mut evaluator =
        evaluator(&ws.model_dir, &ws.data_dir, &ws.output_dir, StrategyKind::GradCam, &config).unwrap();

    let output = evaluator.evaluate(DataSet::Test).unwrap();
    assert!(output.agreement_path.is_none());
    assert!(output.summary.is_none());

    let importance = read_importance(&output.importance_path);
    assert_eq!(importance.shape(), &[4, 4, 1, SEQ_LEN]);
    assert!(importance.iter().all(|v| v.is_finite() && *v >= 0.0));
}

#[test]
fn test_every_configured_strategy_runs() {
    let ws = workspace(TensorConvention::ChannelsLast);
    let config = EvaluatorConfig::default().with_strategy(
        StrategyConfig::default()
            .with_steps(8)
            .with_reference(Reference::Uniform)
            .with_layer("conv1")
            .with_contrast(Contrast::Class(1)),
    );

    for kind in StrategyKind::ALL {
        if kind == StrategyKind::NonlinearIntegratedGradients {
            continue;
        }
        let mut evaluator =
            evaluator(&ws.model_dir, &ws.data_dir, &ws.output_dir, kind, &config).unwrap();
        let output = evaluator.evaluate(DataSet::Test).unwrap();
        let importance = read_importance(&output.importance_path);
        assert_eq!(importance.shape(), &[4, SEQ_LEN, 4], "{kind}");
        assert!(importance.iter().all(|v| v.is_finite()), "{kind}");
    }
}

#[test]
fn test_nonlinear_integrated_gradients_needs_path() {
    let ws = workspace(TensorConvention::ChannelsLast);
    let config = EvaluatorConfig::default();
    let mut evaluator = evaluator(
        &ws.model_dir,
        &ws.data_dir,
        &ws.output_dir,
        StrategyKind::NonlinearIntegratedGradients,
        &config,
    )
    .unwrap();

    let err = evaluator.evaluate(DataSet::Test).unwrap_err();
    assert!(matches!(err, EvalError::Explain(ExplainError::State(_))));
    assert!(!evaluator.output_dir().exists());
}

#[test]
fn test_integrated_gradients_is_reproducible() {
    let ws = workspace(TensorConvention::ChannelsFirst);
    let config = EvaluatorConfig::default().with_strategy(
        StrategyConfig::default()
            .with_steps(10)
            .with_reference(Reference::Shuffled { seed: Seed::new(7) }),
    );

    let mut first = evaluator(
        &ws.model_dir,
        &ws.data_dir,
        &ws.output_dir.join("first"),
        StrategyKind::IntegratedGradients,
        &config,
    )
    .unwrap();
    let mut second = evaluator(
        &ws.model_dir,
        &ws.data_dir,
        &ws.output_dir.join("second"),
        StrategyKind::IntegratedGradients,
        &config,
    )
    .unwrap();

    let a = read_importance(&first.evaluate(DataSet::Training).unwrap().importance_path);
    let b = read_importance(&second.evaluate(DataSet::Training).unwrap().importance_path);
    assert_eq!(a, b);
}

#[test]
fn test_bad_annotation_leaves_no_artifacts() {
    let ws = workspace(TensorConvention::ChannelsLast);
    let short = vec![AnnotationRecord {
        annotation: annotation(0, 4, SEQ_LEN - 1),
        y: "c1".to_string(),
    }];
    let examples = vec![ExampleRecord {
        x: sequence(0, SEQ_LEN),
        y: "c1".to_string(),
    }];
    write_examples(ws.data_dir.join(DataSet::Validation.examples_file()), &examples).unwrap();
    write_annotations(ws.data_dir.join(DataSet::Validation.annotations_file()), &short).unwrap();

    let config = EvaluatorConfig::default();
    let mut evaluator =
        evaluator(&ws.model_dir, &ws.data_dir, &ws.output_dir, StrategyKind::Saliency, &config).unwrap();

    let err = evaluator.evaluate(DataSet::Validation).unwrap_err();
    assert!(matches!(
        err,
        EvalError::Core(seqgra::core::CoreError::DataMismatch(_))
    ));
    assert!(!evaluator.importance_path(DataSet::Validation).exists());
    assert!(!evaluator.agreement_path(DataSet::Validation).exists());

    // the other splits are unaffected
    assert!(evaluator.evaluate(DataSet::Test).is_ok());
}

#[test]
fn test_config_file_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evaluator.json");
    let config = EvaluatorConfig::default()
        .with_threshold(0.2)
        .with_strategy(StrategyConfig::default().with_layer("pool1"));
    config.save(&path).unwrap();
    assert_eq!(EvaluatorConfig::load(&path).unwrap(), config);
}

#[test]
fn test_protein_model_end_to_end() {
    const AMINO_ACIDS: &[u8] = b"ACDEFGHIKLMNPQRSTVWY";
    const PROTEIN_LEN: usize = 30;

    let root = tempfile::tempdir().unwrap();
    let model_dir = root.path().join("model");
    let data_dir = root.path().join("data");
    std::fs::create_dir_all(&data_dir).unwrap();

    let device = Default::default();
    let config = SequenceCnnConfig::new(20, PROTEIN_LEN, 2)
        .with_filters(3)
        .with_kernel_size(3)
        .with_pool_size(2);
    let model = config.init::<EvalBackend>(&device);
    let metadata = ModelMetadata::new(
        "cnn-protein",
        SequenceSpace::Protein,
        TensorConvention::ChannelsLast,
        TaskType::MultiClass,
        vec!["c1".to_string(), "c2".to_string()],
    );
    save_bundle(&model_dir, &metadata, &config, &model).unwrap();

    let examples: Vec<ExampleRecord> = (0..3)
        .map(|i| ExampleRecord {
            x: (0..PROTEIN_LEN)
                .map(|p| AMINO_ACIDS[(p * 3 + i * 5) % 20] as char)
                .collect(),
            y: if i == 1 { "c2" } else { "c1" }.to_string(),
        })
        .collect();
    let annotations: Vec<AnnotationRecord> = examples
        .iter()
        .map(|e| AnnotationRecord {
            annotation: annotation(5, 8, PROTEIN_LEN),
            y: e.y.clone(),
        })
        .collect();
    write_examples(data_dir.join(DataSet::Test.examples_file()), &examples).unwrap();
    write_annotations(data_dir.join(DataSet::Test.annotations_file()), &annotations).unwrap();

    let learner = learner(&model_dir);
    assert_eq!(learner.metadata().n_channels(), 20);
    let source =
        DataDirectory::new(&data_dir).with_validation(DataValidation::for_model(learner.metadata()));

    let eval_config = EvaluatorConfig::default();
    let mut evaluator = AttributionEvaluator::new(
        learner,
        StrategyKind::GradientXInput.build(&eval_config.strategy),
        source,
        root.path().join("out"),
        &eval_config,
        device,
    )
    .unwrap();

    let output = evaluator.evaluate(DataSet::Test).unwrap();
    let importance = read_importance(&output.importance_path);
    assert_eq!(importance.shape(), &[3, PROTEIN_LEN, 20]);

    // gradient times input is zero on every absent residue
    for example in importance.outer_iter() {
        for position in example.outer_iter() {
            assert!(position.iter().filter(|v| **v != 0.0).count() <= 1);
        }
    }

    let summary = output.summary.unwrap();
    assert_eq!(summary.overall.total(), 3 * PROTEIN_LEN);
    assert_eq!(summary.overall.true_positives + summary.overall.false_negatives, 3 * 8);
}

#[test]
fn test_unknown_label_fails_before_attribution() {
    let ws = workspace(TensorConvention::ChannelsLast);
    let examples = vec![ExampleRecord {
        x: sequence(0, SEQ_LEN),
        y: "c9".to_string(),
    }];
    let annotations = vec![AnnotationRecord {
        annotation: annotation(0, 4, SEQ_LEN),
        y: "c9".to_string(),
    }];
    write_examples(ws.data_dir.join(DataSet::Validation.examples_file()), &examples).unwrap();
    write_annotations(ws.data_dir.join(DataSet::Validation.annotations_file()), &annotations).unwrap();

    let learner = learner(&ws.model_dir);
    let validation = DataValidation::for_model(learner.metadata());
    let config = EvaluatorConfig::default();
    let mut evaluator = AttributionEvaluator::new(
        learner,
        StrategyKind::Gradient.build(&config.strategy),
        DataDirectory::new(&ws.data_dir).with_validation(validation),
        ws.output_dir.join("gradient"),
        &config,
        Default::default(),
    )
    .unwrap();

    let err = evaluator.evaluate(DataSet::Validation).unwrap_err();
    assert!(matches!(err, EvalError::Data(seqgra::data::DataError::InvalidLabels(_))));
    assert!(!evaluator.output_dir().exists());
}
