//! Gradient boosted regression trees with squared-error loss.
//!
//! The ensemble starts from the target mean; every stage fits a
//! [`RegressionTree`] to the current residuals and adds it scaled by the
//! learning rate. With `subsample < 1` each stage sees a random subset of
//! rows drawn without replacement from a seeded RNG, so training is
//! reproducible for a fixed `seed`.

use ndarray::{Array2, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{RegressionTree, TreeParams};
use super::{check_fit_input, check_predict_input, Predictor, Regressor};
use crate::error::ModelError;

/// Unfitted gradient boosting regressor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingRegressor {
    /// Number of boosting stages.
    pub n_estimators: usize,
    /// Shrinkage applied to every stage.
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Fraction of rows used per stage, in `(0, 1]`.
    pub subsample: f64,
    pub seed: u64,
}

impl Default for GradientBoostingRegressor {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 0,
        }
    }
}

impl GradientBoostingRegressor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_estimators(mut self, n_estimators: usize) -> Self {
        self.n_estimators = n_estimators;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_subsample(mut self, subsample: f64, seed: u64) -> Self {
        self.subsample = subsample;
        self.seed = seed;
        self
    }

    fn validate(&self) -> Result<(), ModelError> {
        if self.n_estimators == 0 {
            return Err(ModelError::InvalidParameter(
                "n_estimators must be > 0".to_string(),
            ));
        }
        if !(self.learning_rate > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "learning_rate must be > 0, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(ModelError::InvalidParameter(format!(
                "subsample must be in (0, 1], got {}",
                self.subsample
            )));
        }
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(ModelError::InvalidParameter(format!(
                "min_samples_leaf must be >= 1 and min_samples_split >= 2, got {} and {}",
                self.min_samples_leaf, self.min_samples_split
            )));
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

impl Regressor for GradientBoostingRegressor {
    type Fitted = FittedGradientBoostingRegressor;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
    ) -> Result<Self::Fitted, ModelError> {
        check_fit_input(x, y)?;
        if y.ncols() != 1 {
            return Err(ModelError::IncompatibleShape {
                algorithm: "GradientBoostingRegressor".to_string(),
                n_outputs: y.ncols(),
            });
        }
        self.validate()?;

        let n = x.nrows();
        let target = y.column(0);
        let init = target.mean().unwrap_or(0.0);
        let mut pred = vec![init; n];
        let mut residual = vec![0.0; n];
        let mut rng = StdRng::seed_from_u64(self.seed);
        let n_sub = ((n as f64) * self.subsample).round().max(1.0) as usize;
        let params = self.tree_params();
        let all_rows: Vec<usize> = (0..n).collect();

        let mut trees = Vec::with_capacity(self.n_estimators);
        for stage in 0..self.n_estimators {
            for i in 0..n {
                residual[i] = target[i] - pred[i];
            }
            let rows = if n_sub < n {
                let mut picked = rand::seq::index::sample(&mut rng, n, n_sub).into_vec();
                picked.sort_unstable();
                picked
            } else {
                all_rows.clone()
            };

            let tree = RegressionTree::fit(x, &residual, &rows, &params);
            for (i, p) in pred.iter_mut().enumerate() {
                *p += self.learning_rate * tree.predict_row(x.row(i));
            }
            if stage % 25 == 0 {
                let mse = residual.iter().map(|r| r * r).sum::<f64>() / n as f64;
                debug!(stage, leaves = tree.n_leaves(), mse, "boosting stage");
            }
            trees.push(tree);
        }

        Ok(FittedGradientBoostingRegressor {
            init,
            learning_rate: self.learning_rate,
            trees,
            n_features: x.ncols(),
        })
    }

    fn supports_multi_output(&self) -> bool {
        false
    }
}

/// Fitted boosted ensemble.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedGradientBoostingRegressor {
    init: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
    n_features: usize,
}

impl FittedGradientBoostingRegressor {
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn init_value(&self) -> f64 {
        self.init
    }
}

impl Predictor for FittedGradientBoostingRegressor {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_predict_input(x, self.n_features)?;
        let mut out = Array2::<f64>::zeros((x.nrows(), 1));
        for (i, row) in x.outer_iter().enumerate() {
            let mut acc = self.init;
            for tree in &self.trees {
                acc += self.learning_rate * tree.predict_row(row);
            }
            out[[i, 0]] = acc;
        }
        Ok(out)
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn n_outputs(&self) -> usize {
        1
    }
}
