//! Dataset statistics computation.

use soy_core::{LabeledSample, SYMPTOM_FIELDS};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Dataset statistics
#[derive(Debug, Clone, Default)]
pub struct DatasetStatistics {
    pub num_samples: usize,
    pub num_classes: usize,
    /// Samples per class, by class name
    pub class_distribution: BTreeMap<String, usize>,
    /// Distinct values observed per symptom field
    pub distinct_values: BTreeMap<&'static str, usize>,
}

impl DatasetStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_samples(samples: &[LabeledSample]) -> Self {
        let mut class_distribution = BTreeMap::new();
        let mut values: BTreeMap<&'static str, BTreeSet<&str>> = BTreeMap::new();

        for sample in samples {
            *class_distribution.entry(sample.label.clone()).or_insert(0) += 1;
            for spec in SYMPTOM_FIELDS.iter() {
                if let Some(value) = sample.record.get(spec.name) {
                    values.entry(spec.name).or_default().insert(value);
                }
            }
        }

        Self {
            num_samples: samples.len(),
            num_classes: class_distribution.len(),
            class_distribution,
            distinct_values: values.into_iter().map(|(k, v)| (k, v.len())).collect(),
        }
    }

    /// Size of the smallest class, 0 when empty
    pub fn min_class_size(&self) -> usize {
        self.class_distribution.values().copied().min().unwrap_or(0)
    }

    /// Size of the largest class, 0 when empty
    pub fn max_class_size(&self) -> usize {
        self.class_distribution.values().copied().max().unwrap_or(0)
    }

    /// Largest over smallest class size; 1 for an empty or single-class set
    pub fn imbalance_ratio(&self) -> f64 {
        match self.min_class_size() {
            0 => 1.0,
            min => self.max_class_size() as f64 / min as f64,
        }
    }

    /// Symptom fields that took a single value across all samples
    pub fn constant_fields(&self) -> Vec<&'static str> {
        self.distinct_values
            .iter()
            .filter(|(_, n)| **n == 1)
            .map(|(&field, _)| field)
            .collect()
    }

    /// Logs the class distribution at info level
    pub fn log_distribution(&self, title: &str) {
        info!("{} ({} samples):", title, self.num_samples);
        for (class_name, count) in &self.class_distribution {
            info!("  {:<8} {:>4}", class_name, count);
        }
        info!("  Imbalance ratio: {:.2}", self.imbalance_ratio());

        let constant = self.constant_fields();
        if !constant.is_empty() {
            debug!("Constant fields: {}", constant.join(", "));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use soy_core::{SymptomRecord, NUM_SYMPTOM_FIELDS};

    fn sample(value: &str, label: &str) -> LabeledSample {
        let values = vec![value; NUM_SYMPTOM_FIELDS];
        LabeledSample::new(SymptomRecord::from_ordered_values(&values).unwrap(), label)
    }

    #[test]
    fn test_statistics_from_samples() {
        let samples = vec![sample("0", "D1"), sample("1", "D1"), sample("0", "D2")];
        let stats = DatasetStatistics::from_samples(&samples);

        assert_eq!(stats.num_samples, 3);
        assert_eq!(stats.num_classes, 2);
        assert_eq!(stats.class_distribution["D1"], 2);
        assert_eq!(stats.min_class_size(), 1);
        assert_eq!(stats.max_class_size(), 2);
        assert_eq!(stats.distinct_values["roots"], 2);
        assert_eq!(stats.imbalance_ratio(), 2.0);
        assert!(stats.constant_fields().is_empty());
    }

    #[test]
    fn test_constant_fields() {
        let mut values = vec!["0"; NUM_SYMPTOM_FIELDS];
        let a = LabeledSample::new(SymptomRecord::from_ordered_values(&values).unwrap(), "D1");
        values[0] = "1";
        let b = LabeledSample::new(SymptomRecord::from_ordered_values(&values).unwrap(), "D2");

        let stats = DatasetStatistics::from_samples(&[a, b]);
        let constant = stats.constant_fields();
        assert_eq!(constant.len(), NUM_SYMPTOM_FIELDS - 1);
        assert!(!constant.contains(&"date"));
        assert_eq!(stats.imbalance_ratio(), 1.0);
    }

    #[test]
    fn test_empty_statistics() {
        let stats = DatasetStatistics::new();
        assert_eq!(stats.min_class_size(), 0);
        assert_eq!(stats.num_classes, 0);
        assert_eq!(stats.imbalance_ratio(), 1.0);
    }
}
