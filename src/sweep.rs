//! Randomized hyperparameter search with K-fold cross-validation.
//!
//! All trial configurations are drawn up front from a seeded RNG, then the
//! trials are evaluated in parallel on the rayon pool. Each trial fits the
//! models on every training fold the way `ModelManager::fit` does, with
//! per-model progress at `debug`, and scores the held-out fold with R²
//! averaged over the target columns.

use std::collections::BTreeMap;

use ndarray::ArrayView2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::dataset::Dataset;
use crate::error::ModelError;
use crate::manager::{fit_scaled, predict_scaled, Progress};
use crate::metrics::Metrics;
use crate::model::{check_fit_input, Estimator, ParamValue};

/// Distributions keyed by hyperparameter name.
pub type ParamDistributions = BTreeMap<String, ParamDistribution>;

/// Sampling distribution for one hyperparameter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamDistribution {
    /// Uniform float in `[low, high]`.
    Uniform { low: f64, high: f64 },
    /// Float whose logarithm is uniform in `[ln low, ln high]`.
    LogUniform { low: f64, high: f64 },
    /// Uniform integer in `[low, high]`.
    IntUniform { low: i64, high: i64 },
    /// One of the listed values, equally likely.
    Choice { values: Vec<ParamValue> },
}

impl ParamDistribution {
    fn validate(&self, name: &str) -> Result<(), ModelError> {
        let invalid = |reason: &str| {
            ModelError::InvalidParameter(format!("distribution for `{name}`: {reason}"))
        };
        match self {
            ParamDistribution::Uniform { low, high } => {
                if !(low.is_finite() && high.is_finite()) || low > high {
                    return Err(invalid("bounds must be finite with low <= high"));
                }
            }
            ParamDistribution::LogUniform { low, high } => {
                if !(*low > 0.0 && high.is_finite()) || low > high {
                    return Err(invalid("bounds must be positive with low <= high"));
                }
            }
            ParamDistribution::IntUniform { low, high } => {
                if low > high {
                    return Err(invalid("low must be <= high"));
                }
            }
            ParamDistribution::Choice { values } => {
                if values.is_empty() {
                    return Err(invalid("no values to choose from"));
                }
            }
        }
        Ok(())
    }

    fn sample(&self, rng: &mut StdRng) -> ParamValue {
        match self {
            ParamDistribution::Uniform { low, high } => {
                ParamValue::Float(rng.gen_range(*low..=*high))
            }
            ParamDistribution::LogUniform { low, high } => {
                ParamValue::Float(rng.gen_range(low.ln()..=high.ln()).exp())
            }
            ParamDistribution::IntUniform { low, high } => {
                ParamValue::Int(rng.gen_range(*low..=*high))
            }
            ParamDistribution::Choice { values } => {
                values[rng.gen_range(0..values.len())].clone()
            }
        }
    }
}

/// Search budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub n_trials: usize,
    pub cv_folds: usize,
    pub seed: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_trials: 3,
            cv_folds: 5,
            seed: 0,
        }
    }
}

/// Cross-validation outcome of one sampled configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrialResult {
    pub params: BTreeMap<String, ParamValue>,
    /// R² on each held-out fold.
    pub split_scores: Vec<f64>,
    pub mean_test_score: f64,
    pub std_test_score: f64,
    /// 1 is best; tied scores share a rank.
    pub rank_test_score: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// One row per trial, in sampling order.
    pub cv_results: Vec<TrialResult>,
    pub best_index: usize,
}

impl SearchResult {
    pub fn best_trial(&self) -> &TrialResult {
        &self.cv_results[self.best_index]
    }

    pub fn best_params(&self) -> &BTreeMap<String, ParamValue> {
        &self.best_trial().params
    }

    pub fn best_score(&self) -> f64 {
        self.best_trial().mean_test_score
    }
}

/// Runs `config.n_trials` sampled configurations of `estimator`.
///
/// Algorithms without multi-output support are fitted per column, the same
/// way [`ModelManager::fit`](crate::ModelManager::fit) would.
pub fn search(
    estimator: &Estimator,
    scale_data: bool,
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    params: &ParamDistributions,
    config: &SearchConfig,
) -> Result<SearchResult, ModelError> {
    if params.is_empty() {
        return Err(ModelError::InvalidParameter(
            "hyperparameter search needs at least one parameter distribution".to_string(),
        ));
    }
    if config.n_trials == 0 {
        return Err(ModelError::InvalidParameter("n_trials must be > 0".to_string()));
    }
    for (name, distribution) in params {
        distribution.validate(name)?;
    }
    check_fit_input(x, y)?;
    if config.cv_folds < 2 || config.cv_folds > x.nrows() {
        return Err(ModelError::InvalidParameter(format!(
            "cv_folds must be in [2, {}], got {}",
            x.nrows(),
            config.cv_folds
        )));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut trials = Vec::with_capacity(config.n_trials);
    for _ in 0..config.n_trials {
        let sampled: BTreeMap<String, ParamValue> = params
            .iter()
            .map(|(name, distribution)| (name.clone(), distribution.sample(&mut rng)))
            .collect();
        let mut candidate = estimator.clone();
        for (name, value) in &sampled {
            candidate.set_param(name, value)?;
        }
        trials.push((sampled, candidate));
    }

    let folds = Dataset::new(x.to_owned(), y.to_owned())?.kfold(config.cv_folds)?;
    let separate = !estimator.supports_multi_output();
    info!(
        algorithm = %estimator.algorithm(),
        trials = trials.len(),
        folds = folds.len(),
        "starting hyperparameter search"
    );

    let scores: Vec<Vec<f64>> = trials
        .par_iter()
        .enumerate()
        .map(|(index, (sampled, candidate))| -> Result<Vec<f64>, ModelError> {
            let mut split_scores = Vec::with_capacity(folds.len());
            for (train, valid) in &folds {
                let (models, scalers) = fit_scaled(
                    candidate,
                    scale_data,
                    train.records(),
                    train.targets(),
                    separate,
                    Progress::Quiet,
                )?;
                let pred = predict_scaled(&models, scalers.as_ref(), valid.records())?;
                split_scores.push(Metrics::r2(valid.targets(), pred.view()));
            }
            debug!(trial = index, ?sampled, ?split_scores, "trial finished");
            Ok(split_scores)
        })
        .collect::<Result<_, ModelError>>()?;

    let means: Vec<f64> = scores.iter().map(|s| mean(s)).collect();
    let cv_results: Vec<TrialResult> = trials
        .into_iter()
        .zip(scores)
        .zip(&means)
        .map(|(((params, _), split_scores), &mean_test_score)| TrialResult {
            std_test_score: std_dev(&split_scores, mean_test_score),
            rank_test_score: rank(mean_test_score, &means),
            params,
            split_scores,
            mean_test_score,
        })
        .collect();

    let best_index = cv_results
        .iter()
        .position(|trial| trial.rank_test_score == 1)
        .unwrap_or(0);
    info!(
        best_index,
        best_score = cv_results[best_index].mean_test_score,
        "hyperparameter search finished"
    );
    Ok(SearchResult {
        cv_results,
        best_index,
    })
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn std_dev(values: &[f64], mean: f64) -> f64 {
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

fn rank_key(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}

fn rank(score: f64, all: &[f64]) -> usize {
    1 + all
        .iter()
        .filter(|&&other| rank_key(other) > rank_key(score))
        .count()
}
