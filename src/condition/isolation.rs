//! Isolation forest on a single feature.
//!
//! Each tree isolates points by recursive random splits of a random subsample;
//! anomalies end up on short paths. With `ψ` the subsample size, `h(x)` the
//! path length and `c(n)` the expected path length of an unsuccessful BST
//! search, the anomaly score is
//!
//! ```text
//! s(x) = 2^(-E[h(x)] / c(ψ))
//! ```
//!
//! A row is an outlier when `-s(x)` falls below the `contamination` quantile of
//! all `-s` values.

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index;

use crate::math::stats::quantile;

pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_MAX_SAMPLES: usize = 256;
pub const DEFAULT_SEED: u64 = 42;

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestSettings {
    pub trees: usize,
    pub max_samples: usize,
    pub seed: u64,
}

impl Default for ForestSettings {
    fn default() -> Self {
        Self {
            trees: DEFAULT_TREES,
            max_samples: DEFAULT_MAX_SAMPLES,
            seed: DEFAULT_SEED,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Node {
    Leaf { size: usize },
    Split { threshold: f64, left: usize, right: usize },
}

/// Arena-allocated isolation tree; node 0 is the root.
#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    fn grow(values: &mut [f64], height_limit: usize, rng: &mut StdRng) -> Tree {
        let mut tree = Tree { nodes: Vec::new() };
        tree.build(values, 0, height_limit, rng);
        tree
    }

    fn build(&mut self, values: &mut [f64], depth: usize, height_limit: usize, rng: &mut StdRng) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf { size: values.len() });

        if depth >= height_limit || values.len() <= 1 {
            return id;
        }
        // Split bounds come from finite values only; infinities still
        // partition to the outer side of any finite threshold.
        let (lo, hi) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        if hi <= lo {
            return id;
        }

        let threshold = split_value(lo, hi, rng);
        // Partition in place: `<= threshold` goes left.
        let mut split = 0;
        for i in 0..values.len() {
            if values[i] <= threshold {
                values.swap(i, split);
                split += 1;
            }
        }
        let (left_vals, right_vals) = values.split_at_mut(split);
        let left = self.build(left_vals, depth + 1, height_limit, rng);
        let right = self.build(right_vals, depth + 1, height_limit, rng);
        self.nodes[id] = Node::Split { threshold, left, right };
        id
    }

    fn path_length(&self, x: f64) -> f64 {
        let mut id = 0;
        let mut depth = 0.0;
        loop {
            match self.nodes[id] {
                Node::Leaf { size } => return depth + average_path_length(size),
                Node::Split { threshold, left, right } => {
                    id = if x <= threshold { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Uniform draw in `[lo, hi)` for finite `lo < hi`.
///
/// `hi - lo` may overflow, so the span is taken in halves.
fn split_value(lo: f64, hi: f64, rng: &mut StdRng) -> f64 {
    let u: f64 = rng.gen_range(0.0..1.0);
    let half = u * (hi / 2.0 - lo / 2.0);
    let t = lo + half + half;
    if t >= lo && t < hi { t } else { lo }
}

/// `c(n)`: average path length of an unsuccessful search in a BST of `n` nodes.
pub fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Anomaly scores `s(x)` in `(0, 1]`; larger means more anomalous.
pub fn anomaly_scores(values: &[f64], settings: ForestSettings) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let psi = settings.max_samples.clamp(1, n);
    let height_limit = (psi as f64).log2().ceil().max(0.0) as usize;
    let mut rng = StdRng::seed_from_u64(settings.seed);

    let trees: Vec<Tree> = (0..settings.trees.max(1))
        .map(|_| {
            let mut sub: Vec<f64> = index::sample(&mut rng, n, psi).iter().map(|i| values[i]).collect();
            Tree::grow(&mut sub, height_limit, &mut rng)
        })
        .collect();

    let norm = average_path_length(psi);
    values
        .iter()
        .map(|&x| {
            let mean_path = trees.iter().map(|t| t.path_length(x)).sum::<f64>() / trees.len() as f64;
            if norm > 0.0 {
                2f64.powf(-mean_path / norm)
            } else {
                0.5
            }
        })
        .collect()
}

/// Inlier mask for the given contamination rate in `(0, 0.5]`.
pub fn inlier_mask(values: &[f64], contamination: f64, settings: ForestSettings) -> Vec<bool> {
    let neg: Vec<f64> = anomaly_scores(values, settings).into_iter().map(|s| -s).collect();
    let Some(offset) = quantile(&neg, contamination) else {
        return vec![true; values.len()];
    };
    neg.iter().map(|&v| v >= offset).collect()
}
