//! Diagnosis of a single symptom record with a trained model.

use soy_core::{Error, PipelineConfig, PredictionResult, Result, SymptomRecord, SYMPTOM_FIELDS};
use tracing::{debug, info, warn};

use crate::pipeline::TrainingPipeline;
use crate::store::{ModelStore, TrainedModel};

/// Loads the persisted model, or trains and persists a fresh one when no
/// artifact exists yet. A corrupt artifact is reported, never overwritten.
pub fn load_or_train(config: &PipelineConfig) -> Result<TrainedModel> {
    let store = ModelStore::new(&config.store.artifact_path);
    match store.load() {
        Ok(model) => Ok(model),
        Err(e) if e.is_artifact_missing() => {
            warn!(
                "No model at {:?}, training a new one",
                config.store.artifact_path
            );
            let outcome = TrainingPipeline::new(config.clone())?.run()?;
            Ok(outcome.model)
        }
        Err(e) => Err(e),
    }
}

/// Answers diagnosis queries against one trained model
pub struct InferenceService {
    model: TrainedModel,
}

impl InferenceService {
    pub fn new(model: TrainedModel) -> Self {
        Self { model }
    }

    /// Service backed by the configured artifact, training it if missing
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let model = load_or_train(config)?;
        info!(
            "Inference ready: {} classes, {} features, calibrated: {}",
            model.metadata.class_names.len(),
            model.metadata.n_features,
            model.classifier.has_probability()
        );
        Ok(Self::new(model))
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    /// Predicts the disease for `record`.
    ///
    /// Missing symptom fields fail with [`Error::SchemaMismatch`]. Unknown
    /// extra fields are ignored; unseen values contribute nothing. Any other
    /// failure is reported as [`Error::PredictionFailure`].
    pub fn predict(&self, record: &SymptomRecord) -> Result<PredictionResult> {
        record.validate()?;

        let unknown = record.unknown_fields();
        if !unknown.is_empty() {
            warn!("Ignoring unknown fields: {}", unknown.join(", "));
        }
        let encoder = &self.model.codec.encoder;
        for spec in SYMPTOM_FIELDS.iter() {
            let (Some(value), Some(known)) = (record.get(spec.name), encoder.categories(spec.name))
            else {
                continue;
            };
            if !known.iter().any(|v| v == value) {
                debug!("Value '{}' for '{}' was not seen in training", value, spec.name);
            }
        }

        self.classify(record).map_err(|e| match e {
            Error::PredictionFailure(_) => e,
            other => Error::PredictionFailure(other.to_string()),
        })
    }

    fn classify(&self, record: &SymptomRecord) -> Result<PredictionResult> {
        let features = self.model.codec.transform(record)?;
        let classifier = &self.model.classifier;

        let label = classifier.predict(features.view())?;
        let probabilities: Vec<(String, f64)> = classifier
            .classes()
            .iter()
            .cloned()
            .zip(classifier.predict_proba(features.view())?)
            .collect();

        let result = PredictionResult::new(label, probabilities);
        debug!(
            "Predicted {} (confidence {:.4})",
            result.label, result.confidence
        );
        Ok(result)
    }

    /// `(label, confidence)` with confidence in `[0, 1]`
    pub fn diagnose(&self, record: &SymptomRecord) -> Result<(String, f64)> {
        let result = self.predict(record)?;
        Ok((result.label, result.confidence))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::{config_in, symptom_values, CLASSES};
    use proptest::prelude::*;
    use std::sync::OnceLock;
    use tempfile::TempDir;

    fn record_for(class: usize, row: usize) -> SymptomRecord {
        SymptomRecord::from_ordered_values(&symptom_values(class, row)).unwrap()
    }

    /// One trained service shared by the tests in this module
    fn service() -> &'static InferenceService {
        static SERVICE: OnceLock<InferenceService> = OnceLock::new();
        SERVICE.get_or_init(|| {
            let temp_dir = TempDir::new().unwrap();
            let config = config_in(temp_dir.path(), 25);
            InferenceService::from_config(&config).unwrap()
        })
    }

    #[test]
    fn test_known_pattern_is_diagnosed_confidently() {
        let service = service();
        for (c, class) in CLASSES.iter().enumerate() {
            let (label, confidence) = service.diagnose(&record_for(c, 0)).unwrap();
            assert_eq!(label, *class);
            assert!(confidence >= 0.5, "{class}: confidence {confidence}");
        }
    }

    #[test]
    fn test_probabilities_cover_all_classes() {
        let result = service().predict(&record_for(2, 3)).unwrap();
        assert_eq!(result.probabilities.len(), 4);
        let total: f64 = result.probabilities.iter().map(|(_, p)| p).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(result.confidence, result.probabilities[0].1);
    }

    #[test]
    fn test_missing_field_is_schema_mismatch() {
        let pairs: Vec<(String, String)> = SYMPTOM_FIELDS
            .iter()
            .zip(symptom_values(0, 0))
            .filter(|(spec, _)| spec.name != "roots")
            .map(|(spec, v)| (spec.name.to_string(), v))
            .collect();
        let record = SymptomRecord::from_pairs(pairs);

        let err = service().predict(&record).unwrap_err();
        assert!(matches!(err, Error::SchemaMismatch(_)));
        assert!(err.to_string().contains("roots"));
    }

    #[test]
    fn test_unknown_fields_and_values_are_tolerated() {
        let mut pairs: Vec<(String, String)> = SYMPTOM_FIELDS
            .iter()
            .zip(symptom_values(1, 0))
            .map(|(spec, v)| (spec.name.to_string(), v))
            .collect();
        pairs.push(("colour".to_string(), "green".to_string()));
        pairs[1].1 = "never-seen".to_string();

        let result = service().predict(&SymptomRecord::from_pairs(pairs)).unwrap();
        assert!(CLASSES.contains(&result.label.as_str()));
    }

    #[test]
    fn test_missing_artifact_triggers_training() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(temp_dir.path(), 6);
        assert!(!config.store.artifact_path.exists());

        let model = load_or_train(&config).unwrap();
        assert!(config.store.artifact_path.is_file());
        assert_eq!(model.metadata.class_names, CLASSES);

        // Second call loads the persisted artifact
        let reloaded = load_or_train(&config).unwrap();
        assert_eq!(reloaded.metadata.class_names, model.metadata.class_names);
        assert_eq!(reloaded.codec.encoder, model.codec.encoder);
    }

    #[test]
    fn test_corrupt_artifact_is_not_retrained() {
        let temp_dir = TempDir::new().unwrap();
        let config = config_in(temp_dir.path(), 6);
        let artifact = &config.store.artifact_path;
        std::fs::create_dir_all(artifact.parent().unwrap()).unwrap();
        std::fs::write(artifact, "garbage").unwrap();

        assert!(matches!(
            load_or_train(&config),
            Err(Error::ArtifactCorrupt(_))
        ));
        assert_eq!(std::fs::read_to_string(artifact).unwrap(), "garbage");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_probabilities_form_distribution(
            choices in proptest::collection::vec(0usize..4, SYMPTOM_FIELDS.len())
        ) {
            let values: Vec<String> = choices.iter().map(|c| c.to_string()).collect();
            let record = SymptomRecord::from_ordered_values(&values).unwrap();

            let result = service().predict(&record).unwrap();
            prop_assert!((0.0..=1.0).contains(&result.confidence));
            prop_assert!(CLASSES.contains(&result.label.as_str()));

            prop_assert_eq!(result.probabilities.len(), CLASSES.len());
            prop_assert!(result.probabilities.iter().all(|(_, p)| (0.0..=1.0).contains(p)));
            let total: f64 = result.probabilities.iter().map(|(_, p)| p).sum();
            prop_assert!((total - 1.0).abs() < 1e-9);
        }
    }
}
