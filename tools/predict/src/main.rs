//! Prediction CLI Tool
//!
//! Diagnoses one symptom observation. The model is loaded from the configured
//! artifact and trained on the spot when none exists yet.

use anyhow::{Context, Result};
use clap::Parser;
use soy_core::{load_toml_config, setup_cli_logging, PipelineConfig, SymptomRecord, SYMPTOM_FIELDS};
use soy_training::InferenceService;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Soybean Disease Prediction Tool
#[derive(Parser, Debug)]
#[command(
    name = "soy-predict",
    about = "Diagnose a soybean plant from its symptoms",
    long_about = "Classify one observation of 35 categorical symptoms into a disease class. \
                  Symptoms come from a TOML file of `field = \"value\"` pairs and/or repeated \
                  --set field=value options."
)]
struct Args {
    /// Path to configuration file (TOML); defaults apply when omitted
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override model artifact path
    #[arg(short, long, value_name = "FILE")]
    artifact: Option<PathBuf>,

    /// TOML file with the observed symptoms
    #[arg(short, long, value_name = "FILE")]
    record: Option<PathBuf>,

    /// Set one symptom, e.g. `--set leaf-mild=yes` (overrides --record)
    #[arg(short, long = "set", value_name = "FIELD=VALUE", value_parser = parse_assignment)]
    set: Vec<(String, String)>,

    /// Print the symptom fields and their offered values, then exit
    #[arg(long)]
    list_fields: bool,

    /// Also show the N most likely classes with their probabilities
    #[arg(short, long, value_name = "N")]
    top: Option<usize>,

    /// Print the result as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn parse_assignment(s: &str) -> std::result::Result<(String, String), String> {
    let (field, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=VALUE, got '{s}'"))?;
    let (field, value) = (field.trim(), value.trim());
    if field.is_empty() || value.is_empty() {
        return Err(format!("expected FIELD=VALUE, got '{s}'"));
    }
    Ok((field.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    let args = Args::parse();

    if args.list_fields {
        print_fields();
        return Ok(());
    }

    setup_cli_logging(args.verbose)?;

    let mut config = match &args.config {
        Some(path) => load_toml_config::<PipelineConfig>(path)
            .context("Failed to load configuration file")?,
        None => PipelineConfig::default(),
    };
    if let Some(ref artifact) = args.artifact {
        config.store.artifact_path = artifact.clone();
    }

    let record = build_record(&args)?;
    info!("Observation with {} fields", record.len());

    let off_vocabulary = record.off_vocabulary();
    if !off_vocabulary.is_empty() {
        warn!(
            "{} value(s) outside the form vocabulary (first: {}={}); values unseen in training contribute nothing",
            off_vocabulary.len(),
            off_vocabulary[0].0,
            off_vocabulary[0].1
        );
    }

    let service = InferenceService::from_config(&config).context("Failed to prepare model")?;

    if !args.json && args.top.is_none() {
        let (label, confidence) = service.diagnose(&record)?;
        println!("Diagnosis: {} (confidence: {:.2}%)", label, confidence * 100.0);
        return Ok(());
    }

    let result = service.predict(&record)?;
    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!(
        "Diagnosis: {} (confidence: {:.2}%)",
        result.label,
        result.confidence * 100.0
    );
    if let Some(k) = args.top {
        for (class, p) in result.top_k(k) {
            println!("  {:<8} {:>7.2}%", class, p * 100.0);
        }
    }

    Ok(())
}

fn build_record(args: &Args) -> Result<SymptomRecord> {
    let mut values: BTreeMap<String, String> = match &args.record {
        Some(path) => load_toml_config(path).context("Failed to read symptom record")?,
        None => BTreeMap::new(),
    };

    for (field, value) in &args.set {
        values.insert(field.clone(), value.clone());
    }

    if values.is_empty() {
        anyhow::bail!("No symptoms given; use --record FILE or --set FIELD=VALUE (see --list-fields)");
    }

    Ok(SymptomRecord::from_pairs(values))
}

fn print_fields() {
    println!("{:<18} Values", "Field");
    println!("{}", "-".repeat(60));
    for spec in SYMPTOM_FIELDS.iter() {
        println!("{:<18} {}", spec.name, spec.choices.join(", "));
    }
}
