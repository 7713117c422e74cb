//! seqgra CLI for running attribution evaluators against trained models.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use burn::prelude::*;
use burn::tensor::backend::AutodiffBackend;
use burn_autodiff::Autodiff;
use burn_ndarray::NdArray;
use seqgra_core::Seed;
use seqgra_data::{DataDirectory, DataSet, DataValidation};
use seqgra_eval::{AttributionEvaluator, EvaluationOutput, EvaluatorConfig, ModelLearner};
use seqgra_explain::{Contrast, Reference, StrategyKind};
use seqgra_models::load_bundle;

/// Backend type for evaluation on the CPU.
type EvalBackend = Autodiff<NdArray>;

/// Backend type for evaluation on the GPU.
#[cfg(feature = "backend-wgpu")]
type GpuEvalBackend = Autodiff<burn_wgpu::Wgpu>;

#[derive(Parser)]
#[command(name = "seqgra")]
#[command(author, version)]
#[command(about = "Attribution evaluation for biological sequence classifiers")]
#[command(long_about = "seqgra: explain trained sequence classifiers and score the explanations
against ground-truth grammar annotations.

EXAMPLES:
  # List available evaluators
  seqgra evaluators

  # Saliency and integrated gradients on the test set
  seqgra evaluate --model-dir models/m1 --data-dir data/g1 --output-dir out -e saliency integrated-gradients --sets test

  # Grad-CAM on the first convolution
  seqgra evaluate --model-dir models/m1 --data-dir data/g1 --output-dir out -e grad-cam --layer conv1

  # DeepLIFT against shuffled references
  seqgra evaluate --model-dir models/m1 --data-dir data/g1 --output-dir out -e deep-lift --reference shuffled --seed 7")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List available evaluators
    Evaluators,
    /// Run evaluators against a model and a data directory
    Evaluate(EvaluateArgs),
}

#[derive(clap::Args)]
struct EvaluateArgs {
    /// Model directory holding model.json and model.mpk
    #[arg(long, value_name = "DIR")]
    model_dir: PathBuf,

    /// Data directory holding <split>.txt and <split>-annotation.txt
    #[arg(long, value_name = "DIR")]
    data_dir: PathBuf,

    /// Results go to <output-dir>/<evaluator-id>/
    #[arg(long, value_name = "DIR")]
    output_dir: PathBuf,

    /// Evaluator identifiers (see `seqgra evaluators`)
    #[arg(short, long, required = true, num_args = 1.., value_name = "ID")]
    evaluators: Vec<String>,

    /// Splits to evaluate [default: every split present in the data directory]
    #[arg(long, num_args = 1.., value_name = "SET")]
    sets: Vec<String>,

    /// JSON evaluator configuration; flags below override it
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Relevance threshold
    #[arg(long, value_name = "T")]
    threshold: Option<f32>,

    /// Interpolation steps of the path methods
    #[arg(long, value_name = "K")]
    steps: Option<usize>,

    /// Reference input for integrated gradients and DeepLIFT
    #[arg(long, value_enum, value_name = "REF")]
    reference: Option<ReferenceArg>,

    /// Seed of the shuffled reference
    #[arg(long, default_value = "42", value_name = "SEED")]
    seed: u64,

    /// Grad-CAM stage name
    #[arg(long, value_name = "NAME")]
    layer: Option<String>,

    /// Contrastive excitation backprop: 'dual' or a class index
    #[arg(long, value_name = "CONTRAST")]
    contrast: Option<String>,

    /// Warn instead of failing on labels the model does not know
    #[arg(long, default_value = "false")]
    warn_invalid_labels: bool,

    /// Only write importance tensors
    #[arg(long, default_value = "false")]
    no_agreement: bool,

    /// Use the wgpu backend (requires the backend-wgpu feature)
    #[arg(long, default_value = "false")]
    gpu: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ReferenceArg {
    Zeros,
    Uniform,
    Shuffled,
}

impl ReferenceArg {
    fn into_reference(self, seed: u64) -> Reference {
        match self {
            Self::Zeros => Reference::Zeros,
            Self::Uniform => Reference::Uniform,
            Self::Shuffled => Reference::Shuffled { seed: Seed::new(seed) },
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::from_level(log_level))
        .init();

    match cli.command {
        Commands::Evaluators => handle_evaluators(),
        Commands::Evaluate(args) => handle_evaluate(args),
    }
}

fn handle_evaluators() -> Result<()> {
    println!("Available evaluators:\n");
    for kind in StrategyKind::ALL {
        println!("  {:<32} {}", kind.id(), kind.name());
    }
    println!("\nUsage:");
    println!("  seqgra evaluate --model-dir DIR --data-dir DIR --output-dir DIR -e ID [ID ...]");
    Ok(())
}

fn handle_evaluate(args: EvaluateArgs) -> Result<()> {
    println!("=== seqgra Evaluation ===\n");

    let kinds = args
        .evaluators
        .iter()
        .map(|id| {
            id.parse::<StrategyKind>()
                .context("Use 'seqgra evaluators' to see available evaluators")
        })
        .collect::<Result<Vec<_>>>()?;

    let source = DataDirectory::new(&args.data_dir);
    let sets = if args.sets.is_empty() {
        source.available_splits()
    } else {
        args.sets
            .iter()
            .map(|s| s.parse::<DataSet>())
            .collect::<std::result::Result<Vec<_>, _>>()?
    };
    if sets.is_empty() {
        bail!("No example tables found in {:?}", args.data_dir);
    }

    let config = evaluator_config(&args)?;

    println!("Configuration:");
    println!("  Model:      {}", args.model_dir.display());
    println!("  Data:       {}", args.data_dir.display());
    println!("  Output:     {}", args.output_dir.display());
    println!(
        "  Evaluators: {}",
        kinds.iter().map(|k| k.id()).collect::<Vec<_>>().join(", ")
    );
    println!(
        "  Sets:       {}",
        sets.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    );
    println!("  Threshold:  {}", config.relevance_threshold);
    println!("  Agreement:  {}", config.agreement);
    println!();

    if args.gpu {
        #[cfg(feature = "backend-wgpu")]
        {
            let device = <GpuEvalBackend as Backend>::Device::default();
            return run_evaluators::<GpuEvalBackend>(&args, &kinds, &sets, &config, device);
        }
        #[cfg(not(feature = "backend-wgpu"))]
        bail!("--gpu requires seqgra to be built with the 'backend-wgpu' feature");
    }

    let device = <EvalBackend as Backend>::Device::default();
    run_evaluators::<EvalBackend>(&args, &kinds, &sets, &config, device)
}

/// Merge the configuration file with the command line flags.
fn evaluator_config(args: &EvaluateArgs) -> Result<EvaluatorConfig> {
    let mut config = match &args.config {
        Some(path) => EvaluatorConfig::load(path)
            .context(format!("Failed to read evaluator config {:?}", path))?,
        None => EvaluatorConfig::default(),
    };

    if let Some(threshold) = args.threshold {
        config.relevance_threshold = threshold;
    }
    if args.no_agreement {
        config.agreement = false;
    }
    if let Some(steps) = args.steps {
        config.strategy.steps = steps;
    }
    if let Some(reference) = args.reference {
        config.strategy.reference = Some(reference.into_reference(args.seed));
    }
    if let Some(layer) = &args.layer {
        config.strategy.layer = Some(layer.clone());
    }
    if let Some(contrast) = &args.contrast {
        config.strategy.contrast = contrast.parse::<Contrast>()?;
    }

    config.validate().context("Invalid evaluator configuration")?;
    tracing::debug!("Evaluator config: {:?}", config);
    Ok(config)
}

fn run_evaluators<B: AutodiffBackend>(
    args: &EvaluateArgs,
    kinds: &[StrategyKind],
    sets: &[DataSet],
    config: &EvaluatorConfig,
    device: B::Device,
) -> Result<()> {
    for &kind in kinds {
        let output_dir = args.output_dir.join(kind.id());
        if has_results(&output_dir)? {
            tracing::info!("Skipping {}: {:?} already contains results", kind, output_dir);
            println!("Skipping {} ({} already contains results)", kind.name(), output_dir.display());
            continue;
        }

        println!("--- {} ---", kind.name());

        let (metadata, model) = load_bundle::<B>(&args.model_dir, &device)
            .context(format!("Failed to load model from {:?}", args.model_dir))?;
        let validation =
            DataValidation::for_model(&metadata).with_throw_exception(!args.warn_invalid_labels);
        let learner = ModelLearner::new(metadata, model, device.clone());
        let strategy = kind.build::<B>(&config.strategy);

        let mut evaluator = AttributionEvaluator::new(
            learner,
            strategy,
            DataDirectory::new(&args.data_dir).with_validation(validation),
            &output_dir,
            config,
            device.clone(),
        )
        .context(format!("Failed to set up evaluator '{}'", kind))?;

        for &set in sets {
            let output = evaluator
                .evaluate(set)
                .context(format!("Evaluator '{}' failed on the {} set", kind, set))?;
            print_output(&output);
        }
        println!();
    }

    println!("Results written to {}", args.output_dir.display());
    Ok(())
}

/// Whether `dir` exists and holds at least one entry.
fn has_results(dir: &Path) -> Result<bool> {
    if !dir.is_dir() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(dir).context(format!("Failed to read {:?}", dir))?;
    Ok(entries.next().is_some())
}

fn print_output(output: &EvaluationOutput) {
    println!("{} set:", output.set);
    println!("  Importance: {}", output.importance_path.display());
    if let Some(path) = &output.agreement_path {
        println!("  Agreement:  {}", path.display());
    }
    if let Some(summary) = &output.summary {
        println!();
        print!("{}", summary.to_string_table());
    }
    println!();
}
