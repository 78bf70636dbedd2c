//! End-to-end training: load, clean, encode, split, scale, balance, fit,
//! evaluate and persist.

use ndarray::Array2;
use soy_core::{EvaluationMetrics, LabeledSample, PipelineConfig, Result};
use soy_dataset::{DatasetLoader, DatasetStatistics, TrainTestSplit};
use tracing::{debug, info, warn};

use crate::balance::ClassBalancer;
use crate::codec::{FeatureCodec, OneHotEncoder, StandardScaler};
use crate::evaluator::Evaluator;
use crate::store::{ModelMetadata, ModelStore, TrainedModel};
use crate::svm::SvmClassifier;

/// Everything a training run produced
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub model: TrainedModel,
    /// Held-out evaluation; `None` when the split left no test rows
    pub report: Option<EvaluationMetrics>,
    /// Class distribution of the cleaned dataset
    pub statistics: DatasetStatistics,
}

/// Runs the training procedure described by a [`PipelineConfig`]
pub struct TrainingPipeline {
    config: PipelineConfig,
}

impl TrainingPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Loads the dataset, trains, evaluates and writes the artifact.
    ///
    /// Evaluation exports go to `store.report_dir` when one is configured.
    pub fn run(&self) -> Result<TrainingOutcome> {
        let loader = DatasetLoader::new(self.config.dataset.clone())?;
        let loaded = loader.load_with_source()?;
        info!(
            "Loaded {} samples from {} ({} rows dropped)",
            loaded.samples.len(),
            loaded.source,
            loaded.dropped_rows
        );

        let outcome = self.fit(loaded.samples, &loaded.source.to_string())?;

        ModelStore::new(&self.config.store.artifact_path).save(&outcome.model)?;

        if let (Some(dir), Some(report)) = (&self.config.store.report_dir, &outcome.report) {
            Evaluator::export_all(report, dir)?;
        }

        Ok(outcome)
    }

    /// Trains and evaluates on already-cleaned samples without touching disk.
    pub fn fit(&self, samples: Vec<LabeledSample>, data_source: &str) -> Result<TrainingOutcome> {
        let seed = self.config.seed;

        let statistics = DatasetStatistics::from_samples(&samples);
        statistics.log_distribution("Cleaned dataset");

        // Vocabulary comes from every cleaned record, before the split
        let encoder = OneHotEncoder::fit(samples.iter().map(|s| &s.record))?;
        info!("Encoded feature width: {}", encoder.n_features());
        debug!("Encoded columns: {}", encoder.feature_names().join(", "));

        let split = TrainTestSplit::new(samples, &self.config.split, seed)?;
        info!(
            "Split: {} training / {} test samples",
            split.train.len(),
            split.test.len()
        );

        // Scaling statistics come from the training part only
        let train_encoded = encoder.encode_batch(split.train.iter().map(|s| &s.record))?;
        let scaler = StandardScaler::fit(&train_encoded)?;
        let x_train = scaler.transform_batch(&train_encoded)?;
        let y_train = labels_of(&split.train);

        let balanced = ClassBalancer::new(&self.config.balancer, seed).balance(&x_train, &y_train)?;
        info!(
            "Training set after balancing: {} rows ({} synthesized)",
            balanced.labels.len(),
            balanced.synthesized
        );

        let classifier =
            SvmClassifier::fit(&balanced.features, &balanced.labels, &self.config.classifier)?;
        info!(
            "Classifier trained: {} support vectors",
            classifier.num_support_vectors()
        );

        let codec = FeatureCodec::new(encoder, scaler)?;

        let report = if split.test.is_empty() {
            warn!("No held-out samples; skipping evaluation");
            None
        } else {
            let x_test: Array2<f64> = codec.transform_batch(split.test.iter().map(|s| &s.record))?;
            let y_test = labels_of(&split.test);
            let metrics = Evaluator::new(&classifier).evaluate(&x_test, &y_test)?;
            Evaluator::print_results(&metrics);
            Some(metrics)
        };

        let metadata = ModelMetadata {
            class_names: classifier.classes().to_vec(),
            n_features: codec.n_features(),
            training_samples: split.train.len(),
            synthesized_samples: balanced.synthesized,
            test_samples: split.test.len(),
            balance_strategy: balanced.strategy.to_string(),
            test_accuracy: report.as_ref().map(|r| r.accuracy),
            test_macro_f1: report.as_ref().map(|r| r.macro_avg.f1_score),
            data_source: data_source.to_string(),
            seed,
        };

        Ok(TrainingOutcome {
            model: TrainedModel {
                classifier,
                codec,
                metadata,
            },
            report,
            statistics,
        })
    }
}

fn labels_of(samples: &[LabeledSample]) -> Vec<String> {
    samples.iter().map(|s| s.label.clone()).collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use soy_core::{DatasetConfig, StoreConfig, NUM_SYMPTOM_FIELDS};
    use std::path::Path;
    use tempfile::TempDir;

    pub(crate) const CLASSES: [&str; 4] = ["D1", "D2", "D3", "D4"];

    /// Symptom values of one synthetic observation. Every fifth field carries
    /// the class code; the rest vary with the row.
    pub(crate) fn symptom_values(class: usize, row: usize) -> Vec<String> {
        (0..NUM_SYMPTOM_FIELDS)
            .map(|f| {
                if f % 5 == 0 {
                    class.to_string()
                } else {
                    ((row * 7 + f) % 3).to_string()
                }
            })
            .collect()
    }

    /// A dataset body with `per_class` rows for each of four classes, a
    /// fifth rare class and one row with a missing value.
    pub(crate) fn synthetic_body(per_class: usize) -> String {
        let mut lines = Vec::new();
        for (c, label) in CLASSES.iter().enumerate() {
            for r in 0..per_class {
                lines.push(format!("{},{}", symptom_values(c, r).join(","), label));
            }
        }
        lines.push(format!("{},D5", symptom_values(4, 0).join(",")));
        let mut dirty = symptom_values(0, 0);
        dirty[3] = "?".to_string();
        lines.push(format!("{},D1", dirty.join(",")));
        lines.join("\n")
    }

    pub(crate) fn config_in(dir: &Path, per_class: usize) -> PipelineConfig {
        let data = dir.join("soybean-small.data");
        std::fs::write(&data, synthetic_body(per_class)).unwrap();

        PipelineConfig {
            dataset: DatasetConfig::local_only(data),
            store: StoreConfig {
                artifact_path: dir.join("models").join("svm_model_soybean.json"),
                report_dir: Some(dir.join("reports")),
            },
            ..PipelineConfig::default()
        }
    }

    #[test]
    fn test_run_trains_evaluates_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(temp_dir.path(), 12);
        let pipeline = TrainingPipeline::new(config.clone()).unwrap();

        let outcome = pipeline.run().unwrap();

        assert_eq!(outcome.statistics.num_classes, 4);
        assert_eq!(outcome.model.metadata.class_names, CLASSES);
        assert!(outcome.model.classifier.has_probability());

        let report = outcome.report.unwrap();
        assert_eq!(report.num_samples, 10);
        assert!(report.accuracy >= 0.75);

        assert!(config.store.artifact_path.is_file());
        assert!(temp_dir.path().join("reports").join("confusion_matrix.csv").is_file());
    }

    #[test]
    fn test_fit_without_test_split() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = config_in(temp_dir.path(), 6);
        config.split.test_fraction = 0.0;

        let pipeline = TrainingPipeline::new(config).unwrap();
        let loader = DatasetLoader::new(pipeline.config().dataset.clone()).unwrap();
        let outcome = pipeline.fit(loader.load().unwrap(), "test").unwrap();

        assert!(outcome.report.is_none());
        assert_eq!(outcome.model.metadata.training_samples, 24);
        assert_eq!(outcome.model.metadata.test_accuracy, None);
    }

    #[test]
    fn test_imbalanced_training_set_is_balanced() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(temp_dir.path(), 6);
        let pipeline = TrainingPipeline::new(config).unwrap();

        let loader = DatasetLoader::new(pipeline.config().dataset.clone()).unwrap();
        let mut samples = loader.load().unwrap();
        // Shrink D4 to three observations, two of which stay in training
        let mut kept_d4 = 0;
        samples.retain(|s| {
            if s.label != "D4" {
                return true;
            }
            kept_d4 += 1;
            kept_d4 <= 3
        });

        let outcome = pipeline.fit(samples, "test").unwrap();
        let meta = &outcome.model.metadata;
        assert!(meta.synthesized_samples > 0);
        assert!(meta.balance_strategy.contains("SMOTE"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = PipelineConfig::default();
        config.classifier.c = -1.0;
        assert!(TrainingPipeline::new(config).is_err());
    }
}
