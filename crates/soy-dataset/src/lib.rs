//! Soybean dataset loading and preparation.
//!
//! This crate fetches the labelled symptom dataset (remote first, local copy as
//! fallback), cleans it, narrows it to the most frequent classes and splits it
//! for training and evaluation.

pub mod loader;
pub mod preprocess;
pub mod split;
pub mod statistics;

pub use loader::{DataSource, DatasetLoader, LoadedDataset};
pub use preprocess::{parse_records, retain_top_classes, top_classes, ParseOptions, ParsedDataset};
pub use split::TrainTestSplit;
pub use statistics::DatasetStatistics;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::loader::*;
    pub use crate::preprocess::*;
    pub use crate::split::*;
    pub use crate::statistics::*;
}
