//! RBF-kernel support vector classifier on top of `linfa-svm`.
//!
//! Multi-class problems are decomposed one-vs-one: one binary machine per
//! pair of classes, with the per-class penalty `C` scaled by the class
//! weight. Calibrated machines carry linfa's Platt scaling, and their
//! pairwise probabilities are coupled into one distribution over all classes.

use linfa::dataset::Pr;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use soy_core::{ClassWeight, ClassifierParams, Error, Gamma, Result};
use tracing::{debug, info};

/// Pairwise probabilities are clipped to `[MIN_PROB, 1 - MIN_PROB]`
const MIN_PROB: f64 = 1e-7;

/// Fitted binary machine, with or without Platt scaling
#[derive(Debug, Clone, Serialize, Deserialize)]
enum PairModel {
    Calibrated(Svm<f64, Pr>),
    Plain(Svm<f64, bool>),
}

/// One one-vs-one machine: `positive` vs `negative` class index
#[derive(Debug, Clone, Serialize, Deserialize)]
struct BinaryMachine {
    positive: usize,
    negative: usize,
    model: PairModel,
}

impl BinaryMachine {
    fn fit(
        x: Array2<f64>,
        targets: Array1<bool>,
        gamma: f64,
        (cp, cn): (f64, f64),
        params: &ClassifierParams,
    ) -> std::result::Result<PairModel, linfa_svm::SvmError> {
        let dataset = Dataset::new(x, targets);

        if params.probability {
            Svm::<_, Pr>::params()
                .gaussian_kernel(1.0 / gamma)
                .pos_neg_weights(cp, cn)
                .eps(params.tolerance)
                .shrinking(params.shrinking)
                .fit(&dataset)
                .map(PairModel::Calibrated)
        } else {
            Svm::<_, bool>::params()
                .gaussian_kernel(1.0 / gamma)
                .pos_neg_weights(cp, cn)
                .eps(params.tolerance)
                .shrinking(params.shrinking)
                .fit(&dataset)
                .map(PairModel::Plain)
        }
    }

    /// `P(positive | positive or negative)` for a single-row matrix
    fn probability(&self, row: &ArrayView2<f64>) -> Option<f64> {
        match &self.model {
            PairModel::Calibrated(svm) => {
                let p: Array1<Pr> = svm.predict(row);
                p.iter().next().map(|p| f64::from(**p))
            }
            PairModel::Plain(_) => None,
        }
    }

    fn votes_positive(&self, row: &ArrayView2<f64>) -> bool {
        match &self.model {
            PairModel::Calibrated(_) => self.probability(row).is_some_and(|p| p >= 0.5),
            PairModel::Plain(svm) => {
                let decision: Array1<bool> = svm.predict(row);
                decision.iter().next().copied().unwrap_or(false)
            }
        }
    }

    fn num_support_vectors(&self) -> usize {
        let alpha = match &self.model {
            PairModel::Calibrated(svm) => &svm.alpha,
            PairModel::Plain(svm) => &svm.alpha,
        };
        alpha.iter().filter(|a| a.abs() > 0.0).count()
    }
}

/// Trained support vector classifier over string class labels
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    classes: Vec<String>,
    gamma: f64,
    n_features: usize,
    machines: Vec<BinaryMachine>,
}

impl SvmClassifier {
    /// Trains on rows of `x` labelled by `y`.
    pub fn fit(x: &Array2<f64>, y: &[String], params: &ClassifierParams) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(Error::InvalidArgument(format!(
                "{} feature rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if y.is_empty() {
            return Err(Error::Training("cannot fit classifier on zero samples".to_string()));
        }

        let mut classes: Vec<String> = y.to_vec();
        classes.sort();
        classes.dedup();

        let class_idx: Vec<usize> = y
            .iter()
            .map(|label| classes.binary_search(label).unwrap_or_default())
            .collect();

        let gamma = resolve_gamma(params.gamma, x);
        let weights = class_weights(params.class_weight, &class_idx, classes.len());
        info!(
            "Training SVM: {} samples, {} features, {} classes, C={}, gamma={:.6}",
            x.nrows(),
            x.ncols(),
            classes.len(),
            params.c,
            gamma
        );

        let mut machines = Vec::new();

        for pos in 0..classes.len() {
            for neg in (pos + 1)..classes.len() {
                let members: Vec<usize> = (0..y.len())
                    .filter(|&i| class_idx[i] == pos || class_idx[i] == neg)
                    .collect();
                let targets: Array1<bool> = members.iter().map(|&i| class_idx[i] == pos).collect();
                let penalties = (params.c * weights[pos], params.c * weights[neg]);

                let model = BinaryMachine::fit(
                    x.select(Axis(0), &members),
                    targets,
                    gamma,
                    penalties,
                    params,
                )
                .map_err(|e| {
                    Error::Training(format!("{} vs {}: {}", classes[pos], classes[neg], e))
                })?;

                let machine = BinaryMachine {
                    positive: pos,
                    negative: neg,
                    model,
                };
                debug!(
                    "{} vs {}: {} support vectors",
                    classes[pos],
                    classes[neg],
                    machine.num_support_vectors()
                );
                machines.push(machine);
            }
        }

        Ok(Self {
            classes,
            gamma,
            n_features: x.ncols(),
            machines,
        })
    }

    /// Known classes, sorted
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Whether probability output was fitted
    pub fn has_probability(&self) -> bool {
        self.machines
            .iter()
            .all(|m| matches!(m.model, PairModel::Calibrated(_)))
    }

    /// Total support vectors across all machines
    pub fn num_support_vectors(&self) -> usize {
        self.machines.iter().map(BinaryMachine::num_support_vectors).sum()
    }

    /// Checks internal consistency of a deserialized model
    pub fn check(&self) -> Result<()> {
        let k = self.classes.len();
        if k == 0 {
            return Err(Error::ArtifactCorrupt("classifier has no classes".to_string()));
        }
        if self.machines.len() != k * (k - 1) / 2 {
            return Err(Error::ArtifactCorrupt(format!(
                "{} classes need {} binary machines, found {}",
                k,
                k * (k - 1) / 2,
                self.machines.len()
            )));
        }
        if self.machines.iter().any(|m| m.positive >= k || m.negative >= k) {
            return Err(Error::ArtifactCorrupt("machine refers to unknown class".to_string()));
        }
        if !(self.gamma.is_finite() && self.gamma > 0.0) {
            return Err(Error::ArtifactCorrupt(format!("invalid kernel width {}", self.gamma)));
        }
        Ok(())
    }

    fn as_row<'a>(&self, x: ArrayView1<'a, f64>) -> Result<ArrayView2<'a, f64>> {
        if x.len() != self.n_features {
            return Err(Error::PredictionFailure(format!(
                "expected {} features, got {}",
                self.n_features,
                x.len()
            )));
        }
        Ok(x.insert_axis(Axis(0)))
    }

    /// Predicted class by one-vs-one voting. Ties go to the class that sorts first.
    pub fn predict(&self, x: ArrayView1<f64>) -> Result<String> {
        let row = self.as_row(x)?;
        let mut votes = vec![0usize; self.classes.len()];

        for m in &self.machines {
            if m.votes_positive(&row) {
                votes[m.positive] += 1;
            } else {
                votes[m.negative] += 1;
            }
        }

        let mut best = 0;
        for (i, &v) in votes.iter().enumerate() {
            if v > votes[best] {
                best = i;
            }
        }
        Ok(self.classes[best].clone())
    }

    /// Class probabilities in [`SvmClassifier::classes`] order, summing to 1.
    pub fn predict_proba(&self, x: ArrayView1<f64>) -> Result<Vec<f64>> {
        let row = self.as_row(x)?;
        let k = self.classes.len();
        if k == 1 {
            return Ok(vec![1.0]);
        }

        let mut pairwise = Array2::<f64>::zeros((k, k));
        for m in &self.machines {
            let p = m
                .probability(&row)
                .ok_or_else(|| {
                    Error::PredictionFailure(
                        "model was trained without probability output".to_string(),
                    )
                })?
                .clamp(MIN_PROB, 1.0 - MIN_PROB);
            pairwise[[m.positive, m.negative]] = p;
            pairwise[[m.negative, m.positive]] = 1.0 - p;
        }

        Ok(couple_pairwise(&pairwise))
    }

    /// Predicts a row per sample
    pub fn predict_batch(&self, x: &Array2<f64>) -> Result<Vec<String>> {
        x.axis_iter(Axis(0)).map(|row| self.predict(row)).collect()
    }
}

/// Resolves the kernel width. `Scale` uses the variance over every matrix
/// entry; a constant matrix gives 1.
fn resolve_gamma(gamma: Gamma, x: &Array2<f64>) -> f64 {
    let n_features = x.ncols().max(1) as f64;
    match gamma {
        Gamma::Fixed(g) => g,
        Gamma::Auto => 1.0 / n_features,
        Gamma::Scale => {
            let n = x.len().max(1) as f64;
            let mean = x.sum() / n;
            let var = x.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            if var > 0.0 {
                1.0 / (n_features * var)
            } else {
                1.0
            }
        }
    }
}

/// `n / (k * count_c)` under balanced weighting, 1 otherwise
fn class_weights(weighting: ClassWeight, class_idx: &[usize], k: usize) -> Vec<f64> {
    match weighting {
        ClassWeight::Uniform => vec![1.0; k],
        ClassWeight::Balanced => {
            let mut counts = vec![0usize; k];
            for &c in class_idx {
                counts[c] += 1;
            }
            let n = class_idx.len() as f64;
            counts
                .iter()
                .map(|&count| n / (k as f64 * count.max(1) as f64))
                .collect()
        }
    }
}

/// Couples pairwise probabilities `r[i][j] = P(i | i or j)` into a single
/// distribution (second method of Wu, Lin and Weng, 2004).
fn couple_pairwise(r: &Array2<f64>) -> Vec<f64> {
    let k = r.nrows();
    let max_iter = 100.max(k);
    let eps = 0.005 / k as f64;

    let mut q = Array2::<f64>::zeros((k, k));
    for t in 0..k {
        for j in 0..k {
            if j == t {
                continue;
            }
            q[[t, t]] += r[[j, t]] * r[[j, t]];
            q[[t, j]] = -r[[j, t]] * r[[t, j]];
        }
    }

    let mut p = Array1::from_elem(k, 1.0 / k as f64);
    let mut qp = Array1::<f64>::zeros(k);

    for _ in 0..max_iter {
        let mut pqp = 0.0;
        for t in 0..k {
            qp[t] = (0..k).map(|j| q[[t, j]] * p[j]).sum();
            pqp += p[t] * qp[t];
        }

        let max_error = qp.iter().map(|&v| (v - pqp).abs()).fold(0.0, f64::max);
        if max_error < eps {
            break;
        }

        for t in 0..k {
            let diff = (-qp[t] + pqp) / q[[t, t]];
            p[t] += diff;
            pqp = (pqp + diff * (diff * q[[t, t]] + 2.0 * qp[t])) / (1.0 + diff) / (1.0 + diff);
            for j in 0..k {
                qp[j] = (qp[j] + diff * q[[t, j]]) / (1.0 + diff);
                p[j] /= 1.0 + diff;
            }
        }
    }

    let clamped: Vec<f64> = p.iter().map(|&v| v.clamp(0.0, 1.0)).collect();
    let total: f64 = clamped.iter().sum();
    if total > 0.0 {
        clamped.iter().map(|v| v / total).collect()
    } else {
        vec![1.0 / k as f64; k]
    }
}
