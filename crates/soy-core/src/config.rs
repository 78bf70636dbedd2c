//! Configuration structures for the soybean disease classifier.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Error, Result};

/// Public copy of the small soybean dataset
pub const DEFAULT_DATASET_URL: &str =
    "https://archive.ics.uci.edu/ml/machine-learning-databases/soybean/soybean-small.data";

/// Main configuration for a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Dataset sources and cleaning
    pub dataset: DatasetConfig,
    /// Train/test split
    pub split: SplitConfig,
    /// Minority oversampling
    pub balancer: BalancerConfig,
    /// Classifier hyperparameters
    pub classifier: ClassifierParams,
    /// Artifact persistence
    pub store: StoreConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dataset: DatasetConfig::default(),
            split: SplitConfig::default(),
            balancer: BalancerConfig::default(),
            classifier: ClassifierParams::default(),
            store: StoreConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Checks value ranges across all sections
    pub fn validate(&self) -> Result<()> {
        self.dataset.validate()?;
        self.split.validate()?;
        self.balancer.validate()?;
        self.classifier.validate()?;
        Ok(())
    }
}

/// Which column of a raw dataset row holds the class label
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LabelColumn {
    /// Label precedes the symptom fields
    First,
    /// Label follows the symptom fields
    #[default]
    Last,
}

/// Dataset source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Remote endpoint tried first; `None` reads the local copy only
    pub remote_url: Option<String>,
    /// Local copy with the same schema
    pub local_path: PathBuf,
    /// Timeout for the remote fetch in seconds
    pub timeout_secs: u64,
    /// Position of the class label in each row
    pub label_column: LabelColumn,
    /// Token marking a missing value
    pub missing_marker: String,
    /// Only the N most frequent classes are kept
    pub top_classes: usize,
    /// Write a successful remote body to `local_path`
    pub cache_remote: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            remote_url: Some(DEFAULT_DATASET_URL.to_string()),
            local_path: PathBuf::from("data/soybean-small.data"),
            timeout_secs: 10,
            label_column: LabelColumn::Last,
            missing_marker: "?".to_string(),
            top_classes: 4,
            cache_remote: true,
        }
    }
}

impl DatasetConfig {
    /// Configuration reading only a local file
    pub fn local_only(path: impl Into<PathBuf>) -> Self {
        Self {
            remote_url: None,
            local_path: path.into(),
            cache_remote: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(Error::Config("dataset.timeout_secs must be greater than 0".into()));
        }
        if self.top_classes == 0 {
            return Err(Error::Config("dataset.top_classes must be greater than 0".into()));
        }
        if self.missing_marker.is_empty() {
            return Err(Error::Config("dataset.missing_marker must not be empty".into()));
        }
        Ok(())
    }
}

/// Train/test split configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of samples held out for evaluation
    pub test_fraction: f64,
    /// Preserve class proportions in both parts
    pub stratified: bool,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            stratified: true,
        }
    }
}

impl SplitConfig {
    /// Validates that the test fraction leaves something to train on
    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(Error::Config(format!(
                "split.test_fraction must be in [0, 1), got {}",
                self.test_fraction
            )));
        }
        Ok(())
    }
}

/// Minority oversampling configuration
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Upper bound on neighbours used for synthetic interpolation
    pub max_neighbors: usize,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self { max_neighbors: 2 }
    }
}

impl BalancerConfig {
    fn validate(&self) -> Result<()> {
        if self.max_neighbors == 0 {
            return Err(Error::Config("balancer.max_neighbors must be greater than 0".into()));
        }
        Ok(())
    }
}

/// RBF kernel width selection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Gamma {
    /// `1 / (n_features * var(X))`
    #[default]
    Scale,
    /// `1 / n_features`
    Auto,
    /// Explicit value
    Fixed(f64),
}

/// Per-class penalty weighting
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ClassWeight {
    /// Inversely proportional to class frequency
    #[default]
    Balanced,
    /// Every class weighs 1
    Uniform,
}

impl std::fmt::Display for ClassWeight {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassWeight::Balanced => write!(f, "balanced"),
            ClassWeight::Uniform => write!(f, "uniform"),
        }
    }
}

/// Kernel classifier hyperparameters
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierParams {
    /// Regularization strength (margin violation penalty)
    pub c: f64,
    /// RBF kernel width
    pub gamma: Gamma,
    /// Class weighting
    pub class_weight: ClassWeight,
    /// Fit probability calibration
    pub probability: bool,
    /// Stopping tolerance of the solver
    pub tolerance: f64,
    /// Shrink the active set during optimization
    pub shrinking: bool,
}

impl Default for ClassifierParams {
    fn default() -> Self {
        Self {
            c: 10.0,
            gamma: Gamma::Scale,
            class_weight: ClassWeight::Balanced,
            probability: true,
            tolerance: 1e-3,
            shrinking: true,
        }
    }
}

impl ClassifierParams {
    fn validate(&self) -> Result<()> {
        if self.c <= 0.0 {
            return Err(Error::Config("classifier.c must be positive".into()));
        }
        if let Gamma::Fixed(g) = self.gamma {
            if g <= 0.0 {
                return Err(Error::Config("classifier.gamma must be positive".into()));
            }
        }
        if self.tolerance <= 0.0 {
            return Err(Error::Config("classifier.tolerance must be positive".into()));
        }
        Ok(())
    }
}

/// Artifact persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Location of the trained model artifact
    pub artifact_path: PathBuf,
    /// Directory for evaluation exports (CSV/JSON)
    pub report_dir: Option<PathBuf>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            artifact_path: PathBuf::from("models/svm_model_soybean.json"),
            report_dir: None,
        }
    }
}
