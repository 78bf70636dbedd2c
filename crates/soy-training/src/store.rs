//! Persistence of the trained model.
//!
//! One artifact holds everything inference needs: the classifier, the fitted
//! scaler, the fitted encoder and descriptive metadata. Writes go through a
//! temporary file in the target directory and are renamed into place, so a
//! reader never observes a half-written artifact.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use soy_core::{Error, Result, NUM_SYMPTOM_FIELDS};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::codec::{FeatureCodec, OneHotEncoder, StandardScaler};
use crate::svm::SvmClassifier;

/// Format tag written into every artifact
pub const ARTIFACT_FORMAT: &str = "soy-svm/1";

/// Descriptive data recorded alongside a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Classes the model can predict, sorted
    pub class_names: Vec<String>,
    /// Width of the encoded feature vector
    pub n_features: usize,
    /// Training rows before balancing
    pub training_samples: usize,
    /// Rows added by the balancer
    pub synthesized_samples: usize,
    /// Held-out rows used for evaluation
    pub test_samples: usize,
    /// Balancing strategy used
    pub balance_strategy: String,
    /// Held-out accuracy, if a test split existed
    pub test_accuracy: Option<f64>,
    /// Held-out macro-averaged F1
    pub test_macro_f1: Option<f64>,
    /// Where the training data came from
    pub data_source: String,
    pub seed: u64,
}

/// Classifier plus the fitted feature codec and metadata
#[derive(Debug, Clone)]
pub struct TrainedModel {
    pub classifier: SvmClassifier,
    pub codec: FeatureCodec,
    pub metadata: ModelMetadata,
}

impl TrainedModel {
    /// Cross-checks the widths and classes of the three parts
    pub fn check(&self) -> Result<()> {
        self.classifier.check()?;

        let widths = [
            self.codec.encoder.n_features(),
            self.codec.scaler.n_features(),
            self.classifier.n_features(),
        ];
        if widths.iter().any(|&w| w != widths[0]) {
            return Err(Error::ArtifactCorrupt(format!(
                "feature widths disagree (encoder {}, scaler {}, classifier {})",
                widths[0], widths[1], widths[2]
            )));
        }

        if self.codec.encoder.n_fields() != NUM_SYMPTOM_FIELDS {
            return Err(Error::ArtifactCorrupt(format!(
                "encoder covers {} of {} symptom fields",
                self.codec.encoder.n_fields(),
                NUM_SYMPTOM_FIELDS
            )));
        }

        if self.metadata.class_names != self.classifier.classes() {
            return Err(Error::ArtifactCorrupt(
                "metadata classes do not match classifier".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    format: &'static str,
    created_at: String,
    classifier: &'a SvmClassifier,
    scaler: &'a StandardScaler,
    encoder: &'a OneHotEncoder,
    metadata: &'a ModelMetadata,
}

#[derive(Deserialize)]
struct Artifact {
    format: String,
    created_at: String,
    classifier: SvmClassifier,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
    metadata: ModelMetadata,
}

/// Reads and writes the model artifact at a fixed path
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes the artifact, replacing any previous one.
    pub fn save(&self, model: &TrainedModel) -> Result<()> {
        model.check()?;

        let artifact = ArtifactRef {
            format: ARTIFACT_FORMAT,
            created_at: Utc::now().to_rfc3339(),
            classifier: &model.classifier,
            scaler: &model.codec.scaler,
            encoder: &model.codec.encoder,
            metadata: &model.metadata,
        };
        let json = serde_json::to_string_pretty(&artifact)
            .map_err(|e| Error::Serialization(format!("Failed to serialize model: {}", e)))?;

        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(json.as_bytes())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;

        info!("Model saved to {:?}", self.path);
        Ok(())
    }

    /// Reads the artifact back.
    ///
    /// A missing file is [`Error::ArtifactMissing`]; anything unreadable or
    /// inconsistent is [`Error::ArtifactCorrupt`].
    pub fn load(&self) -> Result<TrainedModel> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::ArtifactMissing(self.path.clone()));
            }
            Err(e) => {
                return Err(Error::ArtifactCorrupt(format!("{}: {}", self.path.display(), e)));
            }
        };
        let artifact: Artifact = serde_json::from_str(&json)
            .map_err(|e| Error::ArtifactCorrupt(format!("{}: {}", self.path.display(), e)))?;

        if artifact.format != ARTIFACT_FORMAT {
            return Err(Error::ArtifactCorrupt(format!(
                "unsupported artifact format '{}' (expected '{}')",
                artifact.format, ARTIFACT_FORMAT
            )));
        }

        let codec = FeatureCodec::new(artifact.encoder, artifact.scaler)
            .map_err(|e| Error::ArtifactCorrupt(e.to_string()))?;
        let model = TrainedModel {
            classifier: artifact.classifier,
            codec,
            metadata: artifact.metadata,
        };
        model.check()?;

        info!(
            "Model loaded from {:?} (created {}, {} classes)",
            self.path,
            artifact.created_at,
            model.metadata.class_names.len()
        );
        Ok(model)
    }
}
