//! Model evaluation on the held-out split.
//!
//! Produces the classification report (per-class precision, recall, F1 and
//! support with macro and weighted averages) and the confusion matrix, and
//! exports both.

use ndarray::Array2;
use soy_core::{Error, EvaluationMetrics, Result};
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::svm::SvmClassifier;

/// Scores a trained classifier against labelled rows
pub struct Evaluator<'a> {
    classifier: &'a SvmClassifier,
}

impl<'a> Evaluator<'a> {
    pub fn new(classifier: &'a SvmClassifier) -> Self {
        Self { classifier }
    }

    /// Predicts every row of `x` and compares against `y`
    pub fn evaluate(&self, x: &Array2<f64>, y: &[String]) -> Result<EvaluationMetrics> {
        if x.nrows() != y.len() {
            return Err(Error::InvalidArgument(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }

        info!("Starting evaluation on {} samples", y.len());
        let start = Instant::now();
        let predictions = self.classifier.predict_batch(x)?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let metrics =
            EvaluationMetrics::from_predictions(self.classifier.classes().to_vec(), y, predictions.as_slice());

        info!(
            "Evaluation complete in {:.2}ms: accuracy={:.4}, macro f1={:.4}, weighted f1={:.4}",
            elapsed_ms, metrics.accuracy, metrics.macro_avg.f1_score, metrics.weighted_avg.f1_score
        );

        Ok(metrics)
    }

    /// Print evaluation results in a formatted way
    pub fn print_results(metrics: &EvaluationMetrics) {
        println!("\n{}", "=".repeat(64));
        println!("CLASSIFICATION REPORT");
        println!("{}", "=".repeat(64));
        println!(
            "{:<14} {:>10} {:>10} {:>10} {:>10}",
            "Class", "Precision", "Recall", "F1-Score", "Support"
        );
        println!("{}", "-".repeat(64));

        for m in &metrics.per_class {
            println!(
                "{:<14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                m.class_name, m.precision, m.recall, m.f1_score, m.support
            );
        }

        println!("{}", "-".repeat(64));
        println!(
            "{:<14} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", metrics.accuracy, metrics.num_samples
        );
        for (name, avg) in [("macro avg", &metrics.macro_avg), ("weighted avg", &metrics.weighted_avg)] {
            println!(
                "{:<14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                name, avg.precision, avg.recall, avg.f1_score, metrics.num_samples
            );
        }

        println!("\nConfusion matrix (rows: actual, columns: predicted)");
        print!("{:<14}", "");
        for name in &metrics.class_names {
            print!(" {:>6}", name);
        }
        println!();
        for (name, row) in metrics.class_names.iter().zip(&metrics.confusion_matrix) {
            print!("{:<14}", name);
            for count in row {
                print!(" {:>6}", count);
            }
            println!();
        }
        println!("{}", "=".repeat(64));
    }

    /// Export confusion matrix to CSV format
    pub fn export_confusion_matrix(metrics: &EvaluationMetrics, output_path: &Path) -> Result<()> {
        let mut file = File::create(output_path)?;

        write!(file, "True\\Predicted")?;
        for name in &metrics.class_names {
            write!(file, ",{}", name)?;
        }
        writeln!(file)?;

        for (name, row) in metrics.class_names.iter().zip(&metrics.confusion_matrix) {
            write!(file, "{}", name)?;
            for val in row {
                write!(file, ",{}", val)?;
            }
            writeln!(file)?;
        }

        info!("Confusion matrix exported to {:?}", output_path);
        Ok(())
    }

    /// Export the per-class report to CSV, with the averages as trailing rows
    pub fn export_report_csv(metrics: &EvaluationMetrics, output_path: &Path) -> Result<()> {
        let mut file = File::create(output_path)?;

        writeln!(file, "class,precision,recall,f1_score,support")?;
        for m in &metrics.per_class {
            writeln!(
                file,
                "{},{:.6},{:.6},{:.6},{}",
                m.class_name, m.precision, m.recall, m.f1_score, m.support
            )?;
        }
        for (name, avg) in [("macro avg", &metrics.macro_avg), ("weighted avg", &metrics.weighted_avg)] {
            writeln!(
                file,
                "{},{:.6},{:.6},{:.6},{}",
                name, avg.precision, avg.recall, avg.f1_score, metrics.num_samples
            )?;
        }

        info!("Classification report exported to {:?}", output_path);
        Ok(())
    }

    /// Export the full report as JSON
    pub fn export_json(metrics: &EvaluationMetrics, output_path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(metrics)
            .map_err(|e| Error::Serialization(format!("Failed to serialize report: {}", e)))?;
        std::fs::write(output_path, json)?;

        info!("Evaluation report exported to {:?}", output_path);
        Ok(())
    }

    /// Writes `confusion_matrix.csv`, `classification_report.csv` and
    /// `evaluation.json` into `dir`
    pub fn export_all(metrics: &EvaluationMetrics, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        Self::export_confusion_matrix(metrics, &dir.join("confusion_matrix.csv"))?;
        Self::export_report_csv(metrics, &dir.join("classification_report.csv"))?;
        Self::export_json(metrics, &dir.join("evaluation.json"))?;
        Ok(())
    }
}
