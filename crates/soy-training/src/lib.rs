//! Training and inference for soybean disease classification.
//!
//! This crate provides:
//! - One-hot encoding and standardization of symptom records
//! - Minority oversampling (SMOTE with a duplication fallback)
//! - An RBF support vector classifier with calibrated probabilities
//! - Evaluation reports and exports
//! - Model persistence and the train-if-missing inference entry point

pub mod balance;
pub mod codec;
pub mod evaluator;
pub mod inference;
pub mod pipeline;
pub mod store;
pub mod svm;

pub use balance::{BalanceOutcome, BalanceStrategy, ClassBalancer};
pub use codec::{FeatureCodec, OneHotEncoder, StandardScaler};
pub use evaluator::Evaluator;
pub use inference::{load_or_train, InferenceService};
pub use pipeline::{TrainingOutcome, TrainingPipeline};
pub use store::{ModelMetadata, ModelStore, TrainedModel, ARTIFACT_FORMAT};
pub use svm::SvmClassifier;

/// Re-export commonly used types
pub mod prelude {
    pub use super::codec::FeatureCodec;
    pub use super::evaluator::Evaluator;
    pub use super::inference::{load_or_train, InferenceService};
    pub use super::pipeline::{TrainingOutcome, TrainingPipeline};
    pub use super::store::{ModelStore, TrainedModel};
    pub use super::svm::SvmClassifier;
}
