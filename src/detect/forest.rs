//! Isolation forest over a single numeric feature.
//!
//! Points that are easy to isolate with random axis splits sit on short tree
//! paths and receive a high anomaly score. The decision threshold is the
//! `(1 - contamination)` quantile of the training scores.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::DetectorConfig;
use crate::detect::{AnomalyFlag, DetectError};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

/// A fitted isolation forest.
#[derive(Debug)]
pub struct IsolationForest {
    trees: Vec<Node>,
    sample_size: usize,
}

impl IsolationForest {
    /// Build the forest on `values`.
    pub fn fit(values: &[f64], cfg: &DetectorConfig) -> Result<Self, DetectError> {
        validate(cfg)?;
        if values.is_empty() {
            return Err(DetectError::InsufficientBaseline { needed: 1, have: 0 });
        }

        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let sample_size = cfg.max_samples.min(values.len());
        let height_limit = (sample_size as f64).log2().ceil() as usize;

        let trees = (0..cfg.trees)
            .map(|_| {
                let mut sample: Vec<f64> =
                    rand::seq::index::sample(&mut rng, values.len(), sample_size)
                        .into_iter()
                        .map(|i| values[i])
                        .collect();
                grow(&mut sample, 0, height_limit, &mut rng)
            })
            .collect();

        Ok(Self { trees, sample_size })
    }

    /// Anomaly score in `(0, 1]`; higher means easier to isolate.
    pub fn score(&self, x: f64) -> f64 {
        let norm = average_path_length(self.sample_size);
        if norm == 0.0 || self.trees.is_empty() {
            return 0.5;
        }
        let mean_depth = self
            .trees
            .iter()
            .map(|t| path_length(t, x, 0))
            .sum::<f64>()
            / self.trees.len() as f64;
        2f64.powf(-mean_depth / norm)
    }
}

/// Fit a forest on `values` and label each of them.
///
/// Exactly the points scoring strictly above the `(1 - contamination)`
/// quantile are outliers, so ties at the threshold stay inliers and a
/// constant series has none.
pub fn fit_predict(values: &[f64], cfg: &DetectorConfig) -> Result<Vec<AnomalyFlag>, DetectError> {
    validate(cfg)?;
    if values.len() < 2 {
        return Ok(vec![AnomalyFlag::Inlier; values.len()]);
    }

    let forest = IsolationForest::fit(values, cfg)?;
    let scores: Vec<f64> = values.iter().map(|&v| forest.score(v)).collect();
    let threshold = quantile(&scores, 1.0 - cfg.contamination);

    let flags: Vec<AnomalyFlag> = scores
        .iter()
        .map(|&s| {
            if s > threshold {
                AnomalyFlag::Outlier
            } else {
                AnomalyFlag::Inlier
            }
        })
        .collect();

    tracing::info!(
        samples = values.len(),
        outliers = flags.iter().filter(|f| f.is_outlier()).count(),
        threshold,
        "scored response times"
    );
    Ok(flags)
}

fn validate(cfg: &DetectorConfig) -> Result<(), DetectError> {
    if !(cfg.contamination > 0.0 && cfg.contamination <= 0.5) {
        return Err(DetectError::InvalidContamination(cfg.contamination));
    }
    if cfg.trees == 0 {
        return Err(DetectError::InvalidParameter { name: "trees" });
    }
    if cfg.max_samples == 0 {
        return Err(DetectError::InvalidParameter {
            name: "max_samples",
        });
    }
    Ok(())
}

fn grow(sample: &mut [f64], depth: usize, limit: usize, rng: &mut StdRng) -> Node {
    if depth >= limit || sample.len() <= 1 {
        return Node::Leaf { size: sample.len() };
    }

    let (min, max) = sample
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if max <= min {
        return Node::Leaf { size: sample.len() };
    }

    let threshold = rng.gen_range(min..max);
    let mid = partition(sample, threshold);
    let (left, right) = sample.split_at_mut(mid);

    Node::Split {
        threshold,
        left: Box::new(grow(left, depth + 1, limit, rng)),
        right: Box::new(grow(right, depth + 1, limit, rng)),
    }
}

/// Moves values below `threshold` to the front; returns their count.
fn partition(sample: &mut [f64], threshold: f64) -> usize {
    let mut mid = 0;
    for i in 0..sample.len() {
        if sample[i] < threshold {
            sample.swap(i, mid);
            mid += 1;
        }
    }
    mid
}

fn path_length(node: &Node, x: f64, depth: usize) -> f64 {
    match node {
        Node::Leaf { size } => depth as f64 + average_path_length(*size),
        Node::Split {
            threshold,
            left,
            right,
        } => {
            if x < *threshold {
                path_length(left, x, depth + 1)
            } else {
                path_length(right, x, depth + 1)
            }
        }
    }
}

/// Average path length of an unsuccessful BST search among `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Linear-interpolated quantile, `q` in `[0, 1]`.
fn quantile(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}
