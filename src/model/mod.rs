//! Estimators and the algorithm registry.
//!
//! Every estimator implements [`Regressor`] (unfitted hyperparameters) and
//! produces a [`Predictor`] (fitted parameters). The manager works with the
//! closed [`Estimator`] / [`FittedEstimator`] enums so fitted models stay
//! serializable without trait objects.

pub mod gbdt;
pub mod linear;
pub mod pipeline;
pub mod svr;
pub mod tree;

use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::preprocessing::traits::ensure_finite;

pub use gbdt::{FittedGradientBoostingRegressor, GradientBoostingRegressor};
pub use linear::{FittedLinearRegression, LinearRegression};
pub use pipeline::{FittedScaledRegressor, ScaledRegressor};
pub use svr::{FittedSvr, Gamma, Kernel, Svr};

/// An unfitted estimator.
pub trait Regressor {
    type Fitted: Predictor;

    /// Fits on features `x` `(n, f)` and targets `y` `(n, k)`.
    fn fit(&self, x: ArrayView2<'_, f64>, y: ArrayView2<'_, f64>)
        -> Result<Self::Fitted, ModelError>;

    /// Whether `fit` accepts `k > 1` target columns.
    fn supports_multi_output(&self) -> bool;
}

/// A fitted estimator.
pub trait Predictor {
    /// Predicts an `(n, n_outputs)` matrix.
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError>;

    fn n_features_in(&self) -> usize;

    fn n_outputs(&self) -> usize;
}

pub(crate) fn check_fit_input(
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
) -> Result<(), ModelError> {
    if x.nrows() == 0 {
        return Err(ModelError::EmptyData("feature matrix has no rows".to_string()));
    }
    if x.ncols() == 0 {
        return Err(ModelError::EmptyData("feature matrix has no columns".to_string()));
    }
    if y.ncols() == 0 {
        return Err(ModelError::EmptyData("target matrix has no columns".to_string()));
    }
    if x.nrows() != y.nrows() {
        return Err(ModelError::InvalidShape {
            expected: format!("{} target rows", x.nrows()),
            got: format!("{} target rows", y.nrows()),
        });
    }
    ensure_finite(x)?;
    ensure_finite(y)?;
    Ok(())
}

pub(crate) fn check_predict_input(
    x: ArrayView2<'_, f64>,
    n_features: usize,
) -> Result<(), ModelError> {
    if x.ncols() != n_features {
        return Err(ModelError::FeatureMismatch {
            expected_features: n_features,
            got_features: x.ncols(),
        });
    }
    Ok(())
}

/// The menu of supported algorithms.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Algorithm {
    Linear,
    Svr,
    GradientBoosting,
}

impl Algorithm {
    pub const ALL: [Algorithm; 3] = [
        Algorithm::Linear,
        Algorithm::Svr,
        Algorithm::GradientBoosting,
    ];

    /// Canonical name, as accepted by [`FromStr`].
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Linear => "linear_model",
            Algorithm::Svr => "SVR",
            Algorithm::GradientBoosting => "GradientBoostingRegressor",
        }
    }

    pub fn supports_multi_output(&self) -> bool {
        matches!(self, Algorithm::Linear)
    }

    /// The estimator built when only the algorithm name is given.
    pub fn default_estimator(&self) -> Estimator {
        match self {
            Algorithm::Linear => Estimator::Linear(LinearRegression::new()),
            Algorithm::Svr => Estimator::Svr(ScaledRegressor::new(Svr::new().with_epsilon(0.2))),
            Algorithm::GradientBoosting => {
                Estimator::GradientBoosting(GradientBoostingRegressor::new())
            }
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "linear_model" | "linear" => Ok(Algorithm::Linear),
            "svr" => Ok(Algorithm::Svr),
            "gradientboostingregressor" | "gradient_boosting" | "gbr" => {
                Ok(Algorithm::GradientBoosting)
            }
            _ => Err(ModelError::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

/// A hyperparameter value, as set by name through [`Estimator::set_param`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParamValue {
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParamValue::Float(v) => Some(v),
            ParamValue::Int(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_usize(&self) -> Option<usize> {
        match *self {
            ParamValue::Int(v) => usize::try_from(v).ok(),
            ParamValue::Float(v) if v >= 0.0 && v.fract() == 0.0 => Some(v as usize),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParamValue::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v.as_str()),
            _ => None,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Str(v) => f.write_str(v),
        }
    }
}

fn wrong_type(name: &str, expected: &str, value: &ParamValue) -> ModelError {
    ModelError::InvalidParameter(format!("`{name}` expects {expected}, got {value}"))
}

fn float(name: &str, value: &ParamValue) -> Result<f64, ModelError> {
    value.as_f64().ok_or_else(|| wrong_type(name, "a number", value))
}

fn count(name: &str, value: &ParamValue) -> Result<usize, ModelError> {
    value
        .as_usize()
        .ok_or_else(|| wrong_type(name, "a non-negative integer", value))
}

/// An unfitted estimator from the menu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Estimator {
    Linear(LinearRegression),
    Svr(ScaledRegressor<Svr>),
    GradientBoosting(GradientBoostingRegressor),
}

impl Estimator {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Estimator::Linear(_) => Algorithm::Linear,
            Estimator::Svr(_) => Algorithm::Svr,
            Estimator::GradientBoosting(_) => Algorithm::GradientBoosting,
        }
    }

    /// Sets one hyperparameter by name.
    pub fn set_param(&mut self, name: &str, value: &ParamValue) -> Result<(), ModelError> {
        match self {
            Estimator::Linear(model) => match name {
                "fit_intercept" => {
                    model.fit_intercept = value
                        .as_bool()
                        .ok_or_else(|| wrong_type(name, "a boolean", value))?;
                }
                _ => return Err(unknown_param(name, Algorithm::Linear)),
            },
            Estimator::Svr(pipeline) => {
                let model = &mut pipeline.regressor;
                match name {
                    "c" | "C" => model.c = float(name, value)?,
                    "epsilon" => model.epsilon = float(name, value)?,
                    "tol" => model.tol = float(name, value)?,
                    "max_iter" => model.max_iter = count(name, value)?,
                    "gamma" => {
                        let gamma = match value {
                            ParamValue::Str(s) if s == "scale" => Gamma::Scale,
                            ParamValue::Str(s) if s == "auto" => Gamma::Auto,
                            other => Gamma::Value(other.as_f64().ok_or_else(|| {
                                wrong_type(name, "\"scale\", \"auto\" or a number", other)
                            })?),
                        };
                        model.kernel = Kernel::Rbf(gamma);
                    }
                    "kernel" => {
                        model.kernel = match value.as_str() {
                            Some("linear") => Kernel::Linear,
                            Some("rbf") => match model.kernel {
                                Kernel::Rbf(g) => Kernel::Rbf(g),
                                Kernel::Linear => Kernel::Rbf(Gamma::Scale),
                            },
                            _ => return Err(wrong_type(name, "\"rbf\" or \"linear\"", value)),
                        };
                    }
                    _ => return Err(unknown_param(name, Algorithm::Svr)),
                }
            }
            Estimator::GradientBoosting(model) => match name {
                "n_estimators" => model.n_estimators = count(name, value)?,
                "learning_rate" => model.learning_rate = float(name, value)?,
                "max_depth" => model.max_depth = count(name, value)?,
                "min_samples_split" => model.min_samples_split = count(name, value)?,
                "min_samples_leaf" => model.min_samples_leaf = count(name, value)?,
                "subsample" => model.subsample = float(name, value)?,
                "seed" | "random_state" => model.seed = count(name, value)? as u64,
                _ => return Err(unknown_param(name, Algorithm::GradientBoosting)),
            },
        }
        Ok(())
    }

    pub fn supports_multi_output(&self) -> bool {
        match self {
            Estimator::Linear(m) => m.supports_multi_output(),
            Estimator::Svr(m) => m.supports_multi_output(),
            Estimator::GradientBoosting(m) => m.supports_multi_output(),
        }
    }

    pub fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
    ) -> Result<FittedEstimator, ModelError> {
        Ok(match self {
            Estimator::Linear(m) => FittedEstimator::Linear(m.fit(x, y)?),
            Estimator::Svr(m) => FittedEstimator::Svr(m.fit(x, y)?),
            Estimator::GradientBoosting(m) => FittedEstimator::GradientBoosting(m.fit(x, y)?),
        })
    }
}

fn unknown_param(name: &str, algorithm: Algorithm) -> ModelError {
    ModelError::InvalidParameter(format!("{algorithm} has no parameter `{name}`"))
}

/// A fitted estimator from the menu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum FittedEstimator {
    Linear(FittedLinearRegression),
    Svr(FittedScaledRegressor<FittedSvr>),
    GradientBoosting(FittedGradientBoostingRegressor),
}

impl FittedEstimator {
    pub fn algorithm(&self) -> Algorithm {
        match self {
            FittedEstimator::Linear(_) => Algorithm::Linear,
            FittedEstimator::Svr(_) => Algorithm::Svr,
            FittedEstimator::GradientBoosting(_) => Algorithm::GradientBoosting,
        }
    }
}

impl Predictor for FittedEstimator {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        match self {
            FittedEstimator::Linear(m) => m.predict(x),
            FittedEstimator::Svr(m) => m.predict(x),
            FittedEstimator::GradientBoosting(m) => m.predict(x),
        }
    }

    fn n_features_in(&self) -> usize {
        match self {
            FittedEstimator::Linear(m) => m.n_features_in(),
            FittedEstimator::Svr(m) => m.n_features_in(),
            FittedEstimator::GradientBoosting(m) => m.n_features_in(),
        }
    }

    fn n_outputs(&self) -> usize {
        match self {
            FittedEstimator::Linear(m) => m.n_outputs(),
            FittedEstimator::Svr(m) => m.n_outputs(),
            FittedEstimator::GradientBoosting(m) => m.n_outputs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_algorithm_names_parse_case_insensitively() {
        assert_eq!("linear_model".parse::<Algorithm>().unwrap(), Algorithm::Linear);
        assert_eq!("SVR".parse::<Algorithm>().unwrap(), Algorithm::Svr);
        assert_eq!("svr".parse::<Algorithm>().unwrap(), Algorithm::Svr);
        assert_eq!(
            "GradientBoostingRegressor".parse::<Algorithm>().unwrap(),
            Algorithm::GradientBoosting
        );
        assert_eq!("gbr".parse::<Algorithm>().unwrap(), Algorithm::GradientBoosting);
        for algorithm in Algorithm::ALL {
            assert_eq!(algorithm.name().parse::<Algorithm>().unwrap(), algorithm);
        }
    }

    #[test]
    fn test_unknown_algorithm() {
        let err = "KNeighbors".parse::<Algorithm>().unwrap_err();
        assert!(matches!(err, ModelError::UnsupportedAlgorithm(name) if name == "KNeighbors"));
    }

    #[test]
    fn test_default_estimators() {
        assert!(Algorithm::Linear.default_estimator().supports_multi_output());
        assert!(!Algorithm::Svr.default_estimator().supports_multi_output());
        assert!(!Algorithm::GradientBoosting.default_estimator().supports_multi_output());
        match Algorithm::Svr.default_estimator() {
            Estimator::Svr(p) => {
                assert_eq!(p.regressor.epsilon, 0.2);
                assert_eq!(p.regressor.kernel, Kernel::Rbf(Gamma::Scale));
            }
            other => panic!("unexpected estimator {other:?}"),
        }
    }

    #[test]
    fn test_set_param() {
        let mut est = Algorithm::GradientBoosting.default_estimator();
        est.set_param("n_estimators", &ParamValue::Int(7)).unwrap();
        est.set_param("learning_rate", &ParamValue::Float(0.3)).unwrap();
        match &est {
            Estimator::GradientBoosting(m) => {
                assert_eq!(m.n_estimators, 7);
                assert_eq!(m.learning_rate, 0.3);
            }
            other => panic!("unexpected estimator {other:?}"),
        }

        let mut svr = Algorithm::Svr.default_estimator();
        svr.set_param("gamma", &ParamValue::Str("auto".into())).unwrap();
        svr.set_param("C", &ParamValue::Int(10)).unwrap();
        match &svr {
            Estimator::Svr(p) => {
                assert_eq!(p.regressor.kernel, Kernel::Rbf(Gamma::Auto));
                assert_eq!(p.regressor.c, 10.0);
            }
            other => panic!("unexpected estimator {other:?}"),
        }
    }

    #[test]
    fn test_set_param_rejects_unknown_and_mistyped() {
        let mut est = Algorithm::Linear.default_estimator();
        assert!(matches!(
            est.set_param("alpha", &ParamValue::Float(1.0)),
            Err(ModelError::InvalidParameter(_))
        ));
        assert!(matches!(
            est.set_param("fit_intercept", &ParamValue::Int(1)),
            Err(ModelError::InvalidParameter(_))
        ));
        let mut gbr = Algorithm::GradientBoosting.default_estimator();
        assert!(gbr.set_param("max_depth", &ParamValue::Int(-2)).is_err());
    }

    #[test]
    fn test_check_fit_input() {
        let x = array![[1.0], [2.0]];
        let y = array![[1.0]];
        assert!(matches!(
            check_fit_input(x.view(), y.view()),
            Err(ModelError::InvalidShape { .. })
        ));
        let empty = Array2::<f64>::zeros((0, 1));
        assert!(matches!(
            check_fit_input(empty.view(), empty.view()),
            Err(ModelError::EmptyData(_))
        ));
        let nan = array![[f64::NAN], [1.0]];
        let y2 = array![[1.0], [2.0]];
        assert!(matches!(
            check_fit_input(nan.view(), y2.view()),
            Err(ModelError::Preprocessing(_))
        ));
    }

    #[test]
    fn test_fitted_estimator_dispatch() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![[1.0, 0.0], [3.0, -1.0], [5.0, -2.0], [7.0, -3.0]];
        let fitted = Algorithm::Linear.default_estimator().fit(x.view(), y.view()).unwrap();
        assert_eq!(fitted.algorithm(), Algorithm::Linear);
        assert_eq!(fitted.n_outputs(), 2);
        assert_eq!(fitted.n_features_in(), 1);
        let pred = fitted.predict(array![[4.0]].view()).unwrap();
        assert!((pred[[0, 0]] - 9.0).abs() < 1e-9);
        assert!((pred[[0, 1]] + 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_param_value_untagged() {
        let values: Vec<ParamValue> = serde_json::from_str(r#"[true, 3, 0.5, "scale"]"#).unwrap();
        assert_eq!(
            values,
            vec![
                ParamValue::Bool(true),
                ParamValue::Int(3),
                ParamValue::Float(0.5),
                ParamValue::Str("scale".to_string())
            ]
        );
    }
}
