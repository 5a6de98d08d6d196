//! CART regression tree.
//!
//! Splits minimise the summed squared error of the two children. Every
//! feature is considered at every node; thresholds sit midway between
//! adjacent distinct values. Growth stops when a node is pure, has fewer
//! than `min_samples_split` rows, or reaches `max_depth`.
//!
//! Traversal: `row[feature] <= threshold` goes left, otherwise right.

use super::{check_training_data, ModelError, Regressor};

#[derive(Debug, Clone, PartialEq)]
pub enum TreeNode {
    Leaf {
        value: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct RegressionTree {
    max_depth: Option<usize>,
    min_samples_split: usize,
    nodes: Vec<TreeNode>,
    n_features: usize,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    sse: f64,
}

impl RegressionTree {
    pub fn new(max_depth: Option<usize>, min_samples_split: usize) -> Self {
        Self {
            max_depth,
            min_samples_split: min_samples_split.max(2),
            nodes: Vec::new(),
            n_features: 0,
        }
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Fit on the rows of `x` selected by `indices` (duplicates allowed).
    pub(crate) fn fit_indices(&mut self, x: &[Vec<f64>], y: &[f64], indices: Vec<usize>) {
        self.nodes.clear();
        self.n_features = x.first().map_or(0, Vec::len);
        self.grow(x, y, indices, 0);
    }

    /// Grow a subtree and return its node index.
    fn grow(&mut self, x: &[Vec<f64>], y: &[f64], indices: Vec<usize>, depth: usize) -> usize {
        let n = indices.len() as f64;
        let mean = indices.iter().map(|&i| y[i]).sum::<f64>() / n;

        let pure = indices.iter().all(|&i| y[i] == y[indices[0]]);
        let depth_reached = self.max_depth.is_some_and(|d| depth >= d);
        if pure || depth_reached || indices.len() < self.min_samples_split {
            return self.push(TreeNode::Leaf { value: mean });
        }

        let Some(split) = self.best_split(x, y, &indices) else {
            return self.push(TreeNode::Leaf { value: mean });
        };

        let (left_idx, right_idx): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[i][split.feature] <= split.threshold);

        // Reserve the slot so the parent precedes its children
        let slot = self.push(TreeNode::Leaf { value: mean });
        let left = self.grow(x, y, left_idx, depth + 1);
        let right = self.grow(x, y, right_idx, depth + 1);
        self.nodes[slot] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        slot
    }

    fn push(&mut self, node: TreeNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn best_split(&self, x: &[Vec<f64>], y: &[f64], indices: &[usize]) -> Option<BestSplit> {
        let n = indices.len();
        let mut best: Option<BestSplit> = None;
        let mut order: Vec<usize> = indices.to_vec();

        for feature in 0..self.n_features {
            order.sort_by(|&a, &b| x[a][feature].total_cmp(&x[b][feature]));

            let total: f64 = order.iter().map(|&i| y[i]).sum();
            let total_sq: f64 = order.iter().map(|&i| y[i] * y[i]).sum();
            let (mut sum_l, mut sq_l) = (0.0, 0.0);

            for pos in 0..n - 1 {
                let yi = y[order[pos]];
                sum_l += yi;
                sq_l += yi * yi;

                let here = x[order[pos]][feature];
                let next = x[order[pos + 1]][feature];
                if here >= next {
                    continue;
                }

                let n_l = (pos + 1) as f64;
                let n_r = (n - pos - 1) as f64;
                let sum_r = total - sum_l;
                let sq_r = total_sq - sq_l;
                let sse = (sq_l - sum_l * sum_l / n_l) + (sq_r - sum_r * sum_r / n_r);

                if best.as_ref().is_none_or(|b| sse < b.sse) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        sse,
                    });
                }
            }
        }

        best
    }

    fn predict_row(&self, row: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Leaf { value } => return value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if row[feature] <= threshold { left } else { right };
                }
            }
        }
    }
}

impl Regressor for RegressionTree {
    fn name(&self) -> &str {
        "decision_tree"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        check_training_data(x, y)?;
        self.fit_indices(x, y, (0..x.len()).collect());
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if self.nodes.is_empty() {
            return Err(ModelError::NotFitted);
        }
        x.iter()
            .map(|row| {
                if row.len() != self.n_features {
                    return Err(ModelError::FeatureMismatch {
                        expected: self.n_features,
                        got: row.len(),
                    });
                }
                Ok(self.predict_row(row))
            })
            .collect()
    }
}
