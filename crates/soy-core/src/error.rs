//! Error types for the soybean disease classifier.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the soybean classifier.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(String),

    /// Neither the remote endpoint nor the local copy produced a dataset
    #[error("Dataset unavailable: remote: {remote}; local: {local}")]
    DataUnavailable {
        /// Why the remote source failed
        remote: String,
        /// Why the local source failed
        local: String,
    },

    /// Inference input does not carry the required symptom fields
    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    /// No persisted model at the expected location
    #[error("Model artifact not found: {}", .0.display())]
    ArtifactMissing(PathBuf),

    /// Persisted model exists but cannot be used
    #[error("Model artifact corrupt: {0}")]
    ArtifactCorrupt(String),

    /// Unexpected failure while encoding, scaling or predicting
    #[error("Prediction failed: {0}")]
    PredictionFailure(String),

    /// Dataset error
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Training error
    #[error("Training error: {0}")]
    Training(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid argument error
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Http(err.to_string())
    }
}

impl Error {
    /// True when the error should trigger a fresh training run.
    pub fn is_artifact_missing(&self) -> bool {
        matches!(self, Error::ArtifactMissing(_))
    }
}

/// Specialized Result type for classifier operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::SchemaMismatch("missing fields: roots".to_string());
        assert_eq!(err.to_string(), "Schema mismatch: missing fields: roots");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_artifact_missing_display() {
        let err = Error::ArtifactMissing(PathBuf::from("models/svm.json"));
        assert!(err.to_string().contains("models/svm.json"));
        assert!(err.is_artifact_missing());
        assert!(!Error::ArtifactCorrupt("bad".into()).is_artifact_missing());
    }

    #[test]
    fn test_data_unavailable_mentions_both_sources() {
        let err = Error::DataUnavailable {
            remote: "HTTP 500".to_string(),
            local: "file not found".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("HTTP 500"));
        assert!(msg.contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: Error = json_err.into();
        assert!(matches!(err, Error::Serialization(_)));
    }
}
