//! Train/test split strategies.
//!
//! The stratified split partitions every class separately so that both parts
//! keep the class proportions of the full dataset. The split is deterministic
//! for a given seed.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use soy_core::{Error, LabeledSample, Result, SplitConfig};
use std::collections::BTreeMap;
use tracing::debug;

/// Training and held-out evaluation samples
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: Vec<LabeledSample>,
    pub test: Vec<LabeledSample>,
}

impl TrainTestSplit {
    /// Splits `samples` according to `config`, seeded by `seed`.
    pub fn new(samples: Vec<LabeledSample>, config: &SplitConfig, seed: u64) -> Result<Self> {
        config.validate()?;

        if samples.is_empty() {
            return Err(Error::Dataset("No samples provided for splitting".to_string()));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);

        let (mut train, mut test) = if config.stratified {
            Self::stratified_split(samples, config.test_fraction, &mut rng)
        } else {
            Self::random_split(samples, config.test_fraction, &mut rng)
        };

        // Interleave classes so downstream consumers don't see sorted blocks
        train.shuffle(&mut rng);
        test.shuffle(&mut rng);

        debug!("Split into {} train / {} test samples", train.len(), test.len());

        Ok(Self { train, test })
    }

    /// Perform stratified split maintaining class balance.
    ///
    /// The held-out size is `ceil(n * test_fraction)` overall; it is shared
    /// out by class proportion, remainders going to the largest fractional
    /// quotas first.
    fn stratified_split(
        samples: Vec<LabeledSample>,
        test_fraction: f64,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<LabeledSample>, Vec<LabeledSample>) {
        let n = samples.len();

        // BTreeMap keeps class iteration order, and with it the RNG stream, stable
        let mut by_class: BTreeMap<String, Vec<LabeledSample>> = BTreeMap::new();
        for sample in samples {
            by_class.entry(sample.label.clone()).or_default().push(sample);
        }

        let sizes: Vec<usize> = by_class.values().map(Vec::len).collect();
        let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n);
        let allocation = allocate_test_counts(&sizes, n_test);

        let mut train = Vec::new();
        let mut test = Vec::new();

        for ((_, mut class_samples), n_test) in by_class.into_iter().zip(allocation) {
            class_samples.shuffle(rng);
            let rest = class_samples.split_off(n_test);
            test.extend(class_samples);
            train.extend(rest);
        }

        (train, test)
    }

    /// Perform simple random split (not stratified)
    fn random_split(
        mut samples: Vec<LabeledSample>,
        test_fraction: f64,
        rng: &mut ChaCha8Rng,
    ) -> (Vec<LabeledSample>, Vec<LabeledSample>) {
        let n = samples.len();
        let n_test = ((n as f64 * test_fraction).ceil() as usize).min(n - 1);

        samples.shuffle(rng);
        let train = samples.split_off(n_test);
        (train, samples)
    }
}

/// Shares `n_test` held-out rows among classes of the given sizes. Every
/// class keeps at least one training member.
fn allocate_test_counts(sizes: &[usize], n_test: usize) -> Vec<usize> {
    let total: usize = sizes.iter().sum();
    if total == 0 {
        return vec![0; sizes.len()];
    }

    let quotas: Vec<f64> = sizes
        .iter()
        .map(|&size| n_test as f64 * size as f64 / total as f64)
        .collect();
    let room: Vec<usize> = sizes.iter().map(|&size| size.saturating_sub(1)).collect();

    let mut allocation: Vec<usize> = quotas
        .iter()
        .zip(&room)
        .map(|(&q, &cap)| (q.floor() as usize).min(cap))
        .collect();

    let mut order: Vec<usize> = (0..sizes.len()).collect();
    order.sort_by(|&a, &b| {
        let frac_a = quotas[a] - quotas[a].floor();
        let frac_b = quotas[b] - quotas[b].floor();
        frac_b.total_cmp(&frac_a).then(a.cmp(&b))
    });

    let mut remaining = n_test.saturating_sub(allocation.iter().sum());
    while remaining > 0 {
        let mut placed = false;
        for &c in &order {
            if remaining == 0 {
                break;
            }
            if allocation[c] < room[c] {
                allocation[c] += 1;
                remaining -= 1;
                placed = true;
            }
        }
        if !placed {
            break;
        }
    }

    allocation
}
