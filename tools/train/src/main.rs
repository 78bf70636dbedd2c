//! Training CLI Tool
//!
//! Fetches the soybean dataset, trains the disease classifier and writes the
//! model artifact plus an evaluation report.

use anyhow::{Context, Result};
use clap::Parser;
use soy_core::{load_toml_config, setup_cli_logging, PipelineConfig};
use soy_training::TrainingPipeline;
use std::path::PathBuf;
use tracing::info;

/// Soybean Disease Classifier Training Tool
#[derive(Parser, Debug)]
#[command(
    name = "soy-train",
    about = "Train the soybean disease classifier",
    long_about = "Load the soybean dataset (remote first, local copy as fallback), train an \
                  RBF support vector classifier on the most frequent disease classes and \
                  persist the model artifact."
)]
struct Args {
    /// Path to training configuration file (TOML); defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override artifact output path
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Override directory for evaluation exports
    #[arg(short, long, value_name = "DIR")]
    report_dir: Option<PathBuf>,

    /// Override random seed
    #[arg(short, long, value_name = "N")]
    seed: Option<u64>,

    /// Read the local dataset copy only
    #[arg(long)]
    local_only: bool,

    /// Override local dataset path
    #[arg(long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Dry run (validate config without training)
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("Soybean Disease Classification - Training Tool");
    info!("==============================================");

    let mut config = match &args.config {
        Some(path) => load_toml_config::<PipelineConfig>(path)
            .context("Failed to load configuration file")?,
        None => PipelineConfig::default(),
    };

    apply_overrides(&mut config, &args);

    config.validate().context("Invalid configuration")?;
    print_config_summary(&config);

    if args.dry_run {
        info!("Configuration validated successfully (dry run)");
        return Ok(());
    }

    let pipeline = TrainingPipeline::new(config)?;
    let outcome = pipeline.run().context("Training failed")?;

    let meta = &outcome.model.metadata;
    info!("Model saved to: {}", pipeline.config().store.artifact_path.display());
    info!("Classes: {}", meta.class_names.join(", "));
    info!(
        "Trained on {} samples ({} synthesized, {})",
        meta.training_samples, meta.synthesized_samples, meta.balance_strategy
    );

    if let (Some(report), Some(dir)) = (&outcome.report, &pipeline.config().store.report_dir) {
        info!(
            "Evaluation exports written to: {} (accuracy {:.4})",
            dir.display(),
            report.accuracy
        );
    }

    info!("Training completed successfully!");

    Ok(())
}

fn apply_overrides(config: &mut PipelineConfig, args: &Args) {
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(ref output) = args.output {
        config.store.artifact_path = output.clone();
    }
    if let Some(ref dir) = args.report_dir {
        config.store.report_dir = Some(dir.clone());
    }
    if let Some(ref data) = args.data {
        config.dataset.local_path = data.clone();
    }
    if args.local_only {
        config.dataset.remote_url = None;
        config.dataset.cache_remote = false;
    }
}

fn print_config_summary(config: &PipelineConfig) {
    info!("");
    info!("Configuration Summary:");
    info!(
        "  Remote dataset: {}",
        config.dataset.remote_url.as_deref().unwrap_or("(disabled)")
    );
    info!("  Local dataset: {}", config.dataset.local_path.display());
    info!("  Top classes: {}", config.dataset.top_classes);
    info!(
        "  Test fraction: {} (stratified: {})",
        config.split.test_fraction, config.split.stratified
    );
    info!("  Max SMOTE neighbours: {}", config.balancer.max_neighbors);
    info!("  C: {}", config.classifier.c);
    info!("  Gamma: {:?}", config.classifier.gamma);
    info!("  Class weight: {}", config.classifier.class_weight);
    info!("  Probability: {}", config.classifier.probability);
    info!(
        "  Tolerance: {} (shrinking: {})",
        config.classifier.tolerance, config.classifier.shrinking
    );
    info!("  Seed: {}", config.seed);
    info!("  Artifact: {}", config.store.artifact_path.display());
    info!("");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_apply_to_config() {
        let args = Args::parse_from([
            "soy-train",
            "--seed",
            "7",
            "--report-dir",
            "reports",
            "--data",
            "local.data",
            "--local-only",
        ]);
        let mut config = PipelineConfig::default();
        apply_overrides(&mut config, &args);

        assert_eq!(config.seed, 7);
        assert_eq!(config.store.report_dir, Some(PathBuf::from("reports")));
        assert_eq!(config.dataset.local_path, PathBuf::from("local.data"));
        assert!(config.dataset.remote_url.is_none());
        assert!(!config.dataset.cache_remote);
    }

    #[test]
    fn test_no_overrides_keep_defaults() {
        let args = Args::parse_from(["soy-train"]);
        let mut config = PipelineConfig::default();
        apply_overrides(&mut config, &args);

        let defaults = PipelineConfig::default();
        assert_eq!(config.seed, defaults.seed);
        assert_eq!(config.store.report_dir, defaults.store.report_dir);
        assert_eq!(config.dataset.remote_url, defaults.dataset.remote_url);
    }
}
