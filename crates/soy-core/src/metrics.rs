//! Evaluation metrics and prediction results.

use serde::{Deserialize, Serialize};

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub class_name: String,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Averaged precision/recall/F1
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
}

/// Classification report over a labelled evaluation set
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    /// Class names, in confusion matrix order
    pub class_names: Vec<String>,
    /// Confusion matrix (actual x predicted)
    pub confusion_matrix: Vec<Vec<usize>>,
    /// Overall accuracy
    pub accuracy: f64,
    /// Per-class precision/recall/F1/support
    pub per_class: Vec<ClassMetrics>,
    /// Unweighted mean over classes
    pub macro_avg: AveragedMetrics,
    /// Support-weighted mean over classes
    pub weighted_avg: AveragedMetrics,
    /// Total number of samples evaluated
    pub num_samples: usize,
}

impl EvaluationMetrics {
    /// Creates an empty report for the given classes
    pub fn new(class_names: Vec<String>) -> Self {
        let n = class_names.len();
        Self {
            class_names,
            confusion_matrix: vec![vec![0; n]; n],
            accuracy: 0.0,
            per_class: Vec::new(),
            macro_avg: AveragedMetrics::default(),
            weighted_avg: AveragedMetrics::default(),
            num_samples: 0,
        }
    }

    /// Builds a full report from paired actual/predicted labels.
    ///
    /// Labels not present in `class_names` are ignored.
    pub fn from_predictions<A, P>(class_names: Vec<String>, actual: &[A], predicted: &[P]) -> Self
    where
        A: AsRef<str>,
        P: AsRef<str>,
    {
        let mut metrics = Self::new(class_names);
        for (a, p) in actual.iter().zip(predicted.iter()) {
            metrics.record(a.as_ref(), p.as_ref());
        }
        metrics.compute_from_confusion_matrix();
        metrics
    }

    fn index_of(&self, class_name: &str) -> Option<usize> {
        self.class_names.iter().position(|c| c == class_name)
    }

    /// Adds one prediction to the confusion matrix
    pub fn record(&mut self, actual: &str, predicted: &str) {
        if let (Some(a), Some(p)) = (self.index_of(actual), self.index_of(predicted)) {
            self.confusion_matrix[a][p] += 1;
        }
    }

    /// Computes metrics from confusion matrix
    pub fn compute_from_confusion_matrix(&mut self) {
        let num_classes = self.confusion_matrix.len();
        self.num_samples = self.confusion_matrix.iter().flatten().sum();
        self.per_class.clear();

        if self.num_samples == 0 {
            return;
        }

        let correct: usize = (0..num_classes).map(|i| self.confusion_matrix[i][i]).sum();
        self.accuracy = correct as f64 / self.num_samples as f64;

        for class_id in 0..num_classes {
            let true_positives = self.confusion_matrix[class_id][class_id] as f64;
            let false_positives: f64 = (0..num_classes)
                .filter(|&i| i != class_id)
                .map(|i| self.confusion_matrix[i][class_id] as f64)
                .sum();
            let false_negatives: f64 = (0..num_classes)
                .filter(|&i| i != class_id)
                .map(|i| self.confusion_matrix[class_id][i] as f64)
                .sum();
            let support: usize = self.confusion_matrix[class_id].iter().sum();

            let precision = if true_positives + false_positives > 0.0 {
                true_positives / (true_positives + false_positives)
            } else {
                0.0
            };

            let recall = if true_positives + false_negatives > 0.0 {
                true_positives / (true_positives + false_negatives)
            } else {
                0.0
            };

            let f1_score = if precision + recall > 0.0 {
                2.0 * (precision * recall) / (precision + recall)
            } else {
                0.0
            };

            self.per_class.push(ClassMetrics {
                class_name: self.class_names[class_id].clone(),
                precision,
                recall,
                f1_score,
                support,
            });
        }

        let n = self.per_class.len() as f64;
        self.macro_avg = AveragedMetrics {
            precision: self.per_class.iter().map(|m| m.precision).sum::<f64>() / n,
            recall: self.per_class.iter().map(|m| m.recall).sum::<f64>() / n,
            f1_score: self.per_class.iter().map(|m| m.f1_score).sum::<f64>() / n,
        };

        let total = self.num_samples as f64;
        let weighted = |f: fn(&ClassMetrics) -> f64| {
            self.per_class
                .iter()
                .map(|m| f(m) * m.support as f64)
                .sum::<f64>()
                / total
        };
        self.weighted_avg = AveragedMetrics {
            precision: weighted(|m| m.precision),
            recall: weighted(|m| m.recall),
            f1_score: weighted(|m| m.f1_score),
        };
    }
}

/// Outcome of classifying one symptom record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted disease class
    pub label: String,
    /// Highest class probability
    pub confidence: f64,
    /// Probability per class, highest first
    pub probabilities: Vec<(String, f64)>,
}

impl PredictionResult {
    /// Creates a prediction result; `probabilities` is sorted highest first
    pub fn new(label: String, mut probabilities: Vec<(String, f64)>) -> Self {
        probabilities.sort_by(|a, b| b.1.total_cmp(&a.1));
        let confidence = probabilities.first().map(|(_, p)| *p).unwrap_or(0.0);

        Self {
            label,
            confidence,
            probabilities,
        }
    }

    /// First `k` entries of the probability ranking
    pub fn top_k(&self, k: usize) -> &[(String, f64)] {
        &self.probabilities[..k.min(self.probabilities.len())]
    }
}
