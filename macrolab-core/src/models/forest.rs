//! Random forest regressor: bootstrap-aggregated CART trees.
//!
//! Each tree is grown to full depth on a bootstrap sample drawn with a
//! single seeded RNG, so a given seed and training set always produce the
//! same forest. Prediction is the mean over trees.

use super::tree::RegressionTree;
use super::{check_training_data, ModelError, Regressor};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub seed: u64,
    pub max_depth: Option<usize>,
    pub min_samples_split: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_trees: 200,
            seed: 42,
            max_depth: None,
            min_samples_split: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn new(params: ForestParams) -> Self {
        Self {
            params,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Regressor for RandomForest {
    fn name(&self) -> &str {
        "random_forest"
    }

    fn fit(&mut self, x: &[Vec<f64>], y: &[f64]) -> Result<(), ModelError> {
        check_training_data(x, y)?;
        if self.params.n_trees == 0 {
            return Err(ModelError::InvalidParameter {
                name: "n_trees".into(),
                reason: "must be at least 1".into(),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.params.seed);
        let n = x.len();
        self.trees = (0..self.params.n_trees)
            .map(|_| {
                let sample: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                let mut tree = RegressionTree::new(self.params.max_depth, self.params.min_samples_split);
                tree.fit_indices(x, y, sample);
                tree
            })
            .collect();

        tracing::debug!(trees = self.trees.len(), rows = n, "random forest fitted");
        Ok(())
    }

    fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<f64>, ModelError> {
        if self.trees.is_empty() {
            return Err(ModelError::NotFitted);
        }
        let mut sums = vec![0.0; x.len()];
        for tree in &self.trees {
            for (s, p) in sums.iter_mut().zip(tree.predict(x)?) {
                *s += p;
            }
        }
        let k = self.trees.len() as f64;
        Ok(sums.into_iter().map(|s| s / k).collect())
    }
}
