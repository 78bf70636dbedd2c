//! Evaluation CLI Tool
//!
//! Scores a persisted soybean disease model against the labelled dataset and
//! writes a classification report.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::Serialize;
use soy_core::{load_toml_config, setup_cli_logging, LabeledSample, PipelineConfig};
use soy_dataset::{DatasetLoader, TrainTestSplit};
use soy_training::{Evaluator, InferenceService, ModelStore};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which part of the dataset to score
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Subset {
    /// The held-out part, reproduced from the model's seed
    Test,
    /// The training part
    Train,
    /// Every cleaned sample
    All,
}

/// One scored sample
#[derive(Debug, Serialize)]
struct PredictionRow {
    index: usize,
    actual: String,
    predicted: String,
    confidence: f64,
    correct: bool,
}

/// Soybean Disease Model Evaluation Tool
#[derive(Parser, Debug)]
#[command(
    name = "soy-evaluate",
    about = "Evaluate a trained soybean disease model",
    long_about = "Evaluate a persisted model on the soybean dataset and generate a \
                  classification report with per-class metrics and a confusion matrix."
)]
struct Args {
    /// Path to configuration file (TOML); defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override model artifact path
    #[arg(short, long, value_name = "FILE")]
    artifact: Option<PathBuf>,

    /// Subset of the dataset to score
    #[arg(long, value_enum, default_value_t = Subset::Test)]
    subset: Subset,

    /// Read the local dataset copy only
    #[arg(long)]
    local_only: bool,

    /// Output directory for results
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Save per-sample predictions as JSON (requires --output)
    #[arg(long)]
    save_predictions: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("Soybean Disease Classification - Evaluation Tool");
    info!("================================================");

    let mut config = match &args.config {
        Some(path) => load_toml_config::<PipelineConfig>(path)
            .context("Failed to load configuration file")?,
        None => PipelineConfig::default(),
    };
    if let Some(ref artifact) = args.artifact {
        config.store.artifact_path = artifact.clone();
    }
    if args.local_only {
        config.dataset.remote_url = None;
        config.dataset.cache_remote = false;
    }

    info!("Loading model: {}", config.store.artifact_path.display());
    let model = ModelStore::new(&config.store.artifact_path)
        .load()
        .context("Failed to load model artifact")?;

    let meta = &model.metadata;
    info!("Classes: {}", meta.class_names.join(", "));
    info!("Features: {}", meta.n_features);
    if let Some(acc) = meta.test_accuracy {
        info!("Held-out accuracy at training time: {:.4}", acc);
    }

    let loader = DatasetLoader::new(config.dataset.clone())?;
    let samples = loader.load().context("Failed to load dataset")?;
    let samples = select_subset(samples, args.subset, &config, meta.seed)?;
    if samples.is_empty() {
        anyhow::bail!("Selected subset ({:?}) is empty", args.subset);
    }
    info!("Scoring {} samples ({:?})", samples.len(), args.subset);

    let x = model
        .codec
        .transform_batch(samples.iter().map(|s| &s.record))
        .context("Failed to encode samples")?;
    let y: Vec<String> = samples.iter().map(|s| s.label.clone()).collect();

    let metrics = Evaluator::new(&model.classifier).evaluate(&x, &y)?;
    Evaluator::print_results(&metrics);

    if let Some(ref dir) = args.output {
        Evaluator::export_all(&metrics, dir)?;
        info!("Results saved to: {}", dir.display());

        if args.save_predictions {
            let service = InferenceService::new(model);
            save_predictions(&service, &samples, &dir.join("predictions.json"))?;
        }
    } else if args.save_predictions {
        warn!("--save-predictions needs --output; skipping");
    }

    info!("Evaluation completed successfully!");

    Ok(())
}

fn select_subset(
    samples: Vec<LabeledSample>,
    subset: Subset,
    config: &PipelineConfig,
    seed: u64,
) -> Result<Vec<LabeledSample>> {
    if subset == Subset::All {
        return Ok(samples);
    }

    let split = TrainTestSplit::new(samples, &config.split, seed)?;
    Ok(match subset {
        Subset::Train => split.train,
        _ => split.test,
    })
}

fn save_predictions(
    service: &InferenceService,
    samples: &[LabeledSample],
    path: &Path,
) -> Result<()> {
    let mut rows = Vec::with_capacity(samples.len());

    for (index, sample) in samples.iter().enumerate() {
        let result = service.predict(&sample.record)?;
        rows.push(PredictionRow {
            index,
            actual: sample.label.clone(),
            correct: result.label == sample.label,
            predicted: result.label,
            confidence: result.confidence,
        });
    }

    std::fs::write(path, serde_json::to_string_pretty(&rows)?)?;
    info!("Predictions saved to: {}", path.display());
    Ok(())
}
