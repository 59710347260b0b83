//! Regression tree with the mean squared error criterion.
//!
//! Nodes live in a flat vector with the root at index 0; split nodes refer to
//! their children by index. This keeps prediction iterative and the
//! serialized form shallow however deep the tree grows.

use crate::error::{ModelError, Result};
use crate::Regressor;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::seq::index::sample;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Terminal node predicting the mean target of its samples
    Leaf {
        /// Predicted value
        value: f64,
        /// Training samples that reached the node
        n_samples: usize,
    },
    /// Internal node sending `x[feature] <= threshold` left
    Split {
        /// Column index tested
        feature: usize,
        /// Split threshold (midpoint between adjacent training values)
        threshold: f64,
        /// Index of the left child
        left: usize,
        /// Index of the right child
        right: usize,
        /// Training samples that reached the node
        n_samples: usize,
    },
}

/// Growth limits shared by trees and forests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TreeParams {
    /// Maximum depth (root is depth 0), unlimited when `None`
    pub max_depth: Option<usize>,
    /// Minimum samples a node needs to be split
    pub min_samples_split: usize,
    /// Minimum samples in each child of a split
    pub min_samples_leaf: usize,
    /// Features drawn at random for each split, all when `None`
    pub max_features: Option<usize>,
    /// Seed for feature sampling
    pub seed: u64,
}

impl Default for TreeParams {
    fn default() -> Self {
        Self {
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            seed: 0,
        }
    }
}

impl TreeParams {
    /// Reject limits that can never produce a tree.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == Some(0) {
            return Err(ModelError::InvalidParameter("max_depth must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "min_samples_split must be at least 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(ModelError::InvalidParameter("min_samples_leaf must be at least 1".to_string()));
        }
        if self.max_features == Some(0) {
            return Err(ModelError::InvalidParameter("max_features must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Best split found for a node
#[derive(Debug, Clone, Copy)]
struct Candidate {
    feature: usize,
    threshold: f64,
    /// Reduction in summed squared error
    gain: f64,
}

/// Pending node during growth
struct Pending {
    node: usize,
    indices: Vec<usize>,
    depth: usize,
}

/// MSE regression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTreeRegressor {
    params: TreeParams,
    nodes: Vec<TreeNode>,
    n_features: usize,
    feature_importances: Option<Array1<f64>>,
}

impl Default for DecisionTreeRegressor {
    fn default() -> Self {
        Self {
            params: TreeParams::default(),
            nodes: Vec::new(),
            n_features: 0,
            feature_importances: None,
        }
    }
}

impl DecisionTreeRegressor {
    /// Create an unfitted tree.
    pub fn new(params: TreeParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            ..Default::default()
        })
    }

    /// Growth limits.
    pub const fn params(&self) -> &TreeParams {
        &self.params
    }

    /// Fitted nodes, root first.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Normalized impurity decrease per feature.
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Depth of the fitted tree (a single leaf has depth 0).
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((idx, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            if let TreeNode::Split { left, right, .. } = self.nodes[idx] {
                stack.push((left, depth + 1));
                stack.push((right, depth + 1));
            }
        }
        deepest
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| matches!(n, TreeNode::Leaf { .. }))
            .count()
    }

    /// Fit on the rows of `x` listed in `rows` (repeats allowed).
    pub fn fit_rows(&mut self, x: &Array2<f64>, y: &Array1<f64>, rows: Vec<usize>) -> Result<()> {
        check_shapes(x, y)?;
        if rows.is_empty() {
            return Err(ModelError::EmptyInput("cannot fit a tree on zero rows".to_string()));
        }

        let n_features = x.ncols();
        let max_features = self.params.max_features.map_or(n_features, |m| m.min(n_features));
        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let mut importances = vec![0.0; n_features];
        let mut nodes = vec![placeholder()];
        let mut stack = vec![Pending {
            node: 0,
            indices: rows,
            depth: 0,
        }];

        while let Some(Pending { node, indices, depth }) = stack.pop() {
            let n_samples = indices.len();
            let (sum, sq_sum) = sums(y, &indices);
            let value = sum / n_samples as f64;
            let sse = sq_sum - sum * sum / n_samples as f64;

            let can_split = n_samples >= self.params.min_samples_split
                && n_samples >= 2 * self.params.min_samples_leaf
                && self.params.max_depth.is_none_or(|d| depth < d)
                && sse > f64::EPSILON * sq_sum.abs().max(1.0);

            let candidate = if can_split {
                let features: Vec<usize> = if max_features < n_features {
                    sample(&mut rng, n_features, max_features).into_vec()
                } else {
                    (0..n_features).collect()
                };
                self.best_split(x, y, &indices, &features, sse)
            } else {
                None
            };

            let Some(Candidate { feature, threshold, gain }) = candidate else {
                nodes[node] = TreeNode::Leaf { value, n_samples };
                continue;
            };

            importances[feature] += gain;
            let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
                indices.into_iter().partition(|&i| x[[i, feature]] <= threshold);

            let left = nodes.len();
            let right = left + 1;
            nodes.push(placeholder());
            nodes.push(placeholder());
            nodes[node] = TreeNode::Split {
                feature,
                threshold,
                left,
                right,
                n_samples,
            };
            stack.push(Pending {
                node: right,
                indices: right_rows,
                depth: depth + 1,
            });
            stack.push(Pending {
                node: left,
                indices: left_rows,
                depth: depth + 1,
            });
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        self.nodes = nodes;
        self.n_features = n_features;
        self.feature_importances = Some(Array1::from_vec(importances));
        Ok(())
    }

    fn best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        features: &[usize],
        parent_sse: f64,
    ) -> Option<Candidate> {
        let n = indices.len();
        let min_leaf = self.params.min_samples_leaf;
        let (total_sum, total_sq) = sums(y, indices);
        let mut best: Option<Candidate> = None;

        for &feature in features {
            let mut pairs: Vec<(f64, f64)> = indices.iter().map(|&i| (x[[i, feature]], y[i])).collect();
            pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut left_sum = 0.0;
            let mut left_sq = 0.0;
            for k in 0..n - 1 {
                let (value, target) = pairs[k];
                left_sum += target;
                left_sq += target * target;

                let next = pairs[k + 1].0;
                if next <= value {
                    continue;
                }
                let n_left = k + 1;
                let n_right = n - n_left;
                if n_left < min_leaf || n_right < min_leaf {
                    continue;
                }

                let right_sum = total_sum - left_sum;
                let right_sq = total_sq - left_sq;
                let child_sse = (left_sq - left_sum * left_sum / n_left as f64)
                    + (right_sq - right_sum * right_sum / n_right as f64);
                let gain = parent_sse - child_sse;

                if gain > 0.0 && best.is_none_or(|b| gain > b.gain) {
                    best = Some(Candidate {
                        feature,
                        threshold: value + (next - value) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }

    fn predict_row(&self, x: &Array2<f64>, row: usize) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value, .. } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if x[[row, feature]] <= threshold { left } else { right };
                }
            }
        }
    }
}

impl Regressor for DecisionTreeRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        self.fit_rows(x, y, (0..x.nrows()).collect())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.nodes.is_empty() {
            return Err(ModelError::NotFitted("DecisionTreeRegressor"));
        }
        if x.ncols() != self.n_features {
            return Err(ModelError::Shape {
                expected: format!("{} features", self.n_features),
                actual: format!("{} features", x.ncols()),
            });
        }
        Ok((0..x.nrows()).map(|row| self.predict_row(x, row)).collect())
    }
}

pub(crate) fn check_shapes(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(ModelError::Shape {
            expected: format!("y length = {}", x.nrows()),
            actual: format!("y length = {}", y.len()),
        });
    }
    Ok(())
}

fn sums(y: &Array1<f64>, indices: &[usize]) -> (f64, f64) {
    indices
        .iter()
        .fold((0.0, 0.0), |(s, sq), &i| (s + y[i], sq + y[i] * y[i]))
}

const fn placeholder() -> TreeNode {
    TreeNode::Leaf {
        value: 0.0,
        n_samples: 0,
    }
}
