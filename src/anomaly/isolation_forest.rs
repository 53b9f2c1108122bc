//! Isolation Forest anomaly detection
//!
//! Anomalies are easier to isolate and end up closer to the root of randomly
//! grown trees. Scores follow the scikit-learn convention: `score_samples`
//! returns the *negated* anomaly score, so lower means more anomalous.

use ndarray::{Array1, Array2, ArrayView1};
use rand::prelude::*;
use rand::seq::index;
use serde::{Deserialize, Serialize};

use super::OutlierModel;
use crate::config::ForestParams;
use crate::error::PipelineError;

/// Euler–Mascheroni constant.
const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

/// A node in an isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum IsolationNode {
    /// Internal node; samples with `x[feature] <= threshold` go left
    Internal {
        feature: usize,
        threshold: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    /// Leaf node with the number of training samples that reached it
    Leaf { size: usize },
}

/// Single isolation tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    /// Grow a tree on the rows of `data` listed in `indices`.
    fn build<R: Rng>(
        data: &Array2<f64>,
        indices: &mut [usize],
        max_depth: usize,
        rng: &mut R,
    ) -> Self {
        Self {
            root: Self::build_node(data, indices, 0, max_depth, rng),
        }
    }

    fn build_node<R: Rng>(
        data: &Array2<f64>,
        indices: &mut [usize],
        depth: usize,
        max_depth: usize,
        rng: &mut R,
    ) -> IsolationNode {
        let n_samples = indices.len();
        if depth >= max_depth || n_samples <= 1 {
            return IsolationNode::Leaf { size: n_samples };
        }

        // Only features that still vary inside this node can split it
        let candidates: Vec<(usize, f64, f64)> = (0..data.ncols())
            .filter_map(|j| {
                let (lo, hi) = indices.iter().fold(
                    (f64::INFINITY, f64::NEG_INFINITY),
                    |(lo, hi), &i| (lo.min(data[[i, j]]), hi.max(data[[i, j]])),
                );
                (hi > lo).then_some((j, lo, hi))
            })
            .collect();

        let Some(&(feature, lo, hi)) = candidates.choose(rng) else {
            return IsolationNode::Leaf { size: n_samples };
        };
        let threshold = rng.gen_range(lo..hi);

        // Partition in place: left block holds x <= threshold
        let mut split = 0;
        for k in 0..n_samples {
            if data[[indices[k], feature]] <= threshold {
                indices.swap(k, split);
                split += 1;
            }
        }
        let (left, right) = indices.split_at_mut(split);

        IsolationNode::Internal {
            feature,
            threshold,
            left: Box::new(Self::build_node(data, left, depth + 1, max_depth, rng)),
            right: Box::new(Self::build_node(data, right, depth + 1, max_depth, rng)),
        }
    }

    /// Depth at which `sample` lands, plus the expected remaining depth of
    /// the leaf it lands in.
    fn path_length(&self, sample: ArrayView1<f64>) -> f64 {
        let mut node = &self.root;
        let mut depth = 0usize;
        loop {
            match node {
                IsolationNode::Leaf { size } => return depth as f64 + average_path_length(*size),
                IsolationNode::Internal {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if sample[*feature] <= *threshold { left } else { right };
                    depth += 1;
                }
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

/// Isolation Forest for anomaly detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    /// Number of trees in the forest
    pub n_estimators: usize,
    /// Maximum number of samples per tree
    pub max_samples: usize,
    /// Random seed
    pub seed: u64,
    /// Sub-sample size actually used, `min(max_samples, n_rows)`
    sample_size: usize,
    /// Number of columns seen during fit
    n_features: usize,
    /// Trained trees
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Create an unfitted forest
    ///
    /// # Arguments
    /// * `n_estimators` - Number of trees (default: 100)
    /// * `max_samples` - Sub-sample size per tree (default: 256)
    pub fn new(n_estimators: usize, max_samples: usize) -> Self {
        Self {
            n_estimators,
            max_samples,
            seed: 42,
            sample_size: 0,
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn from_params(params: &ForestParams) -> Self {
        Self::new(params.n_estimators, params.max_samples).with_seed(params.seed)
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Grow the forest on `data` (rows are samples).
    pub fn fit(&mut self, data: &Array2<f64>) -> Result<(), PipelineError> {
        let (n_samples, n_features) = data.dim();
        if n_samples == 0 || self.n_estimators == 0 || self.max_samples == 0 {
            return Err(PipelineError::EmptyTrainingSet);
        }
        if let Some(((row, column), _)) = data.indexed_iter().find(|(_, v)| !v.is_finite()) {
            return Err(PipelineError::NonFiniteInput { row, column });
        }

        let sample_size = self.max_samples.min(n_samples);
        let max_depth = (sample_size.max(2) as f64).log2().ceil() as usize;
        let mut rng = StdRng::seed_from_u64(self.seed);

        self.trees = (0..self.n_estimators)
            .map(|_| {
                let mut indices = index::sample(&mut rng, n_samples, sample_size).into_vec();
                IsolationTree::build(data, &mut indices, max_depth, &mut rng)
            })
            .collect();
        self.sample_size = sample_size;
        self.n_features = n_features;
        Ok(())
    }

    /// Opposite of the anomaly score: `−2^(−E[h(x)] / c(ψ))`, in `[−1, 0)`.
    /// The lower the value, the more abnormal the sample.
    pub fn score_samples(&self, data: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        if !self.is_fitted() {
            return Err(PipelineError::NotFitted);
        }
        if data.ncols() != self.n_features {
            return Err(PipelineError::FeatureCountMismatch {
                expected: self.n_features,
                found: data.ncols(),
            });
        }

        let norm = average_path_length(self.sample_size);
        let scores = data
            .rows()
            .into_iter()
            .map(|sample| {
                let avg_path = self.trees.iter().map(|t| t.path_length(sample)).sum::<f64>()
                    / self.trees.len() as f64;
                if norm > 0.0 {
                    -(2.0_f64.powf(-avg_path / norm))
                } else {
                    -0.5
                }
            })
            .collect();
        Ok(scores)
    }

}

impl Default for IsolationForest {
    fn default() -> Self {
        Self::from_params(&ForestParams::default())
    }
}

impl OutlierModel for IsolationForest {
    fn fit(&mut self, data: &Array2<f64>) -> Result<(), PipelineError> {
        IsolationForest::fit(self, data)
    }

    fn score_samples(&self, data: &Array2<f64>) -> Result<Array1<f64>, PipelineError> {
        IsolationForest::score_samples(self, data)
    }

    fn name(&self) -> &str {
        "IsolationForest"
    }
}
