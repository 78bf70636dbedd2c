//! Minority-class oversampling of the training matrix.
//!
//! Every class is brought up to the size of the largest one. When the
//! smallest class has at least two members, new rows are interpolated between
//! a member and one of its nearest same-class neighbours (SMOTE). Otherwise
//! existing rows are duplicated.

use ndarray::{Array2, ArrayView1, Axis};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use soy_core::{BalancerConfig, Error, Result};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// How minority rows are synthesized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceStrategy {
    /// Interpolation towards one of `k_neighbors` nearest same-class rows
    Smote { k_neighbors: usize },
    /// Duplication of randomly chosen rows
    RandomOversample,
}

impl std::fmt::Display for BalanceStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BalanceStrategy::Smote { k_neighbors } => write!(f, "SMOTE (k={k_neighbors})"),
            BalanceStrategy::RandomOversample => write!(f, "random oversampling"),
        }
    }
}

/// Balanced training rows. Original rows come first, in input order.
#[derive(Debug, Clone)]
pub struct BalanceOutcome {
    pub features: Array2<f64>,
    pub labels: Vec<String>,
    pub strategy: BalanceStrategy,
    /// Number of rows added
    pub synthesized: usize,
}

/// Oversamples minority classes up to the majority count
#[derive(Debug, Clone)]
pub struct ClassBalancer {
    max_neighbors: usize,
    seed: u64,
}

impl ClassBalancer {
    pub fn new(config: &BalancerConfig, seed: u64) -> Self {
        Self {
            max_neighbors: config.max_neighbors,
            seed,
        }
    }

    /// `k = min(max_neighbors, smallest_class - 1)`; SMOTE needs `k >= 1`.
    pub fn select_strategy(&self, smallest_class: usize) -> BalanceStrategy {
        let k = self.max_neighbors.min(smallest_class.saturating_sub(1));
        if k >= 1 {
            BalanceStrategy::Smote { k_neighbors: k }
        } else {
            BalanceStrategy::RandomOversample
        }
    }

    /// Returns a training matrix in which every class has the majority count.
    pub fn balance(&self, features: &Array2<f64>, labels: &[String]) -> Result<BalanceOutcome> {
        if features.nrows() != labels.len() {
            return Err(Error::InvalidArgument(format!(
                "{} feature rows but {} labels",
                features.nrows(),
                labels.len()
            )));
        }
        if labels.is_empty() {
            return Err(Error::Training("cannot balance an empty training set".to_string()));
        }

        let mut by_class: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.iter().enumerate() {
            by_class.entry(label.as_str()).or_default().push(idx);
        }

        let majority = by_class.values().map(Vec::len).max().unwrap_or(0);
        let minority = by_class.values().map(Vec::len).min().unwrap_or(0);
        let strategy = self.select_strategy(minority);
        info!(
            "Balancing {} classes (smallest {}, largest {}) with {}",
            by_class.len(),
            minority,
            majority,
            strategy
        );

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let width = features.ncols();
        let mut extra: Vec<f64> = Vec::new();
        let mut extra_labels: Vec<String> = Vec::new();

        for (label, members) in &by_class {
            let needed = majority - members.len();
            if needed == 0 {
                continue;
            }

            match strategy {
                BalanceStrategy::Smote { k_neighbors } => {
                    let neighbors = nearest_neighbors(features, members, k_neighbors);
                    for _ in 0..needed {
                        let pick = rng.gen_range(0..members.len());
                        let nn = neighbors[pick][rng.gen_range(0..k_neighbors)];
                        let gap: f64 = rng.gen();

                        let base = features.row(members[pick]);
                        let toward = features.row(nn);
                        extra.extend(
                            base.iter()
                                .zip(toward.iter())
                                .map(|(&a, &b)| a + gap * (b - a)),
                        );
                    }
                }
                BalanceStrategy::RandomOversample => {
                    for _ in 0..needed {
                        let pick = members[rng.gen_range(0..members.len())];
                        extra.extend(features.row(pick).iter().copied());
                    }
                }
            }

            debug!("Class {}: {} -> {} rows", label, members.len(), majority);
            extra_labels.extend(std::iter::repeat(label.to_string()).take(needed));
        }

        let synthesized = extra_labels.len();
        let extra = Array2::from_shape_vec((synthesized, width), extra)
            .map_err(|e| Error::Training(format!("Failed to assemble synthetic rows: {e}")))?;
        let balanced = ndarray::concatenate(Axis(0), &[features.view(), extra.view()])
            .map_err(|e| Error::Training(format!("Failed to append synthetic rows: {e}")))?;

        let mut all_labels = labels.to_vec();
        all_labels.extend(extra_labels);

        Ok(BalanceOutcome {
            features: balanced,
            labels: all_labels,
            strategy,
            synthesized,
        })
    }
}

/// For each member, the row indices of its `k` nearest other members.
/// Distance ties resolve to the lower row index.
fn nearest_neighbors(features: &Array2<f64>, members: &[usize], k: usize) -> Vec<Vec<usize>> {
    members
        .iter()
        .map(|&i| {
            let row = features.row(i);
            let mut others: Vec<(f64, usize)> = members
                .iter()
                .filter(|&&j| j != i)
                .map(|&j| (squared_distance(row, features.row(j)), j))
                .collect();
            others.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
            others.into_iter().take(k).map(|(_, j)| j).collect()
        })
        .collect()
}

fn squared_distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}
