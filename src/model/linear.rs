//! Ordinary least squares linear regression.
//!
//! - [`LinearRegression`] — hyperparameters, used for fitting.
//! - [`FittedLinearRegression`] — inference-only, serializable predictor.
//!
//! Fitting centres `X` and `Y`, solves the least squares system with an SVD and
//! recovers the intercept as `ȳ - x̄·W`. Rank-deficient inputs get the
//! minimum-norm solution. The model is natively multi-output: one coefficient
//! column per target column.

use nalgebra::DMatrix;
use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use super::{check_fit_input, check_predict_input, Predictor, Regressor};
use crate::error::ModelError;

/// Unfitted ordinary least squares regressor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Whether to learn an intercept; when false the data is assumed centred.
    pub fit_intercept: bool,
}

impl Default for LinearRegression {
    fn default() -> Self {
        Self {
            fit_intercept: true,
        }
    }
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_intercept(mut self, fit_intercept: bool) -> Self {
        self.fit_intercept = fit_intercept;
        self
    }
}

impl Regressor for LinearRegression {
    type Fitted = FittedLinearRegression;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
    ) -> Result<Self::Fitted, ModelError> {
        check_fit_input(x, y)?;
        let (n, f) = x.dim();
        let k = y.ncols();

        let (x_mean, y_mean) = if self.fit_intercept {
            (
                x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(f)),
                y.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(k)),
            )
        } else {
            (Array1::zeros(f), Array1::zeros(k))
        };

        let a = DMatrix::from_fn(n, f, |i, j| x[[i, j]] - x_mean[j]);
        let b = DMatrix::from_fn(n, k, |i, j| y[[i, j]] - y_mean[j]);

        let svd = a.svd(true, true);
        // numpy lstsq cutoff: eps * max(n, f) * largest singular value
        let rcond = f64::EPSILON * n.max(f) as f64 * svd.singular_values.max();
        let w = svd
            .solve(&b, rcond)
            .map_err(|e| ModelError::Numerical(format!("least squares solve failed: {e}")))?;

        let coef = Array2::from_shape_fn((f, k), |(i, j)| w[(i, j)]);
        if coef.iter().any(|c| !c.is_finite()) {
            return Err(ModelError::Numerical(
                "least squares produced non-finite coefficients".to_string(),
            ));
        }
        let intercept = &y_mean - &x_mean.dot(&coef);

        Ok(FittedLinearRegression { coef, intercept })
    }

    fn supports_multi_output(&self) -> bool {
        true
    }
}

/// Fitted linear model: `Y = X·coef + intercept`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedLinearRegression {
    /// Shape `(n_features, n_outputs)`.
    coef: Array2<f64>,
    /// Shape `(n_outputs,)`.
    intercept: Array1<f64>,
}

impl FittedLinearRegression {
    /// Builds a fitted model from explicit parameters.
    pub fn from_parts(coef: Array2<f64>, intercept: Array1<f64>) -> Result<Self, ModelError> {
        if coef.ncols() != intercept.len() {
            return Err(ModelError::InvalidShape {
                expected: format!("intercept of length {}", coef.ncols()),
                got: format!("length {}", intercept.len()),
            });
        }
        Ok(Self { coef, intercept })
    }

    pub fn coef(&self) -> &Array2<f64> {
        &self.coef
    }

    pub fn intercept(&self) -> &Array1<f64> {
        &self.intercept
    }
}

impl Predictor for FittedLinearRegression {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_predict_input(x, self.n_features_in())?;
        Ok(x.dot(&self.coef) + &self.intercept)
    }

    fn n_features_in(&self) -> usize {
        self.coef.nrows()
    }

    fn n_outputs(&self) -> usize {
        self.coef.ncols()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array};

    #[test]
    fn test_fit_with_bias() {
        // y = 2 * x + 1
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = array![[1.0], [3.0], [5.0], [7.0]];

        let fitted = LinearRegression::new().fit(x.view(), y.view()).unwrap();

        assert_abs_diff_eq!(fitted.coef()[[0, 0]], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(fitted.intercept()[0], 1.0, epsilon = 1e-10);

        let pred = fitted.predict(array![[10.0]].view()).unwrap();
        assert_abs_diff_eq!(pred[[0, 0]], 21.0, epsilon = 1e-9);
    }

    #[test]
    fn test_fit_multi_output() {
        // y0 = x0 + 2*x1, y1 = -x0 + 3
        let x = Array::from_shape_fn((20, 2), |(i, j)| ((i * (j + 2)) % 7) as f64 + j as f64);
        let y = Array::from_shape_fn((20, 2), |(i, j)| {
            let (a, b) = (x[[i, 0]], x[[i, 1]]);
            if j == 0 {
                a + 2.0 * b
            } else {
                -a + 3.0
            }
        });

        let fitted = LinearRegression::new().fit(x.view(), y.view()).unwrap();
        assert_eq!(fitted.n_outputs(), 2);
        assert_eq!(fitted.n_features_in(), 2);

        let pred = fitted.predict(x.view()).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert_abs_diff_eq!(*p, *t, epsilon = 1e-8);
        }
    }

    #[test]
    fn test_fit_without_intercept() {
        let x = array![[1.0], [2.0], [3.0]];
        let y = array![[2.0], [4.0], [6.0]];
        let fitted = LinearRegression::new()
            .with_intercept(false)
            .fit(x.view(), y.view())
            .unwrap();
        assert_abs_diff_eq!(fitted.coef()[[0, 0]], 2.0, epsilon = 1e-10);
        assert_eq!(fitted.intercept()[0], 0.0);
    }

    #[test]
    fn test_rank_deficient_design() {
        // duplicated column: minimum-norm solution splits the weight evenly
        let x = array![[1.0, 1.0], [2.0, 2.0], [3.0, 3.0]];
        let y = array![[2.0], [4.0], [6.0]];
        let fitted = LinearRegression::new().fit(x.view(), y.view()).unwrap();
        assert_abs_diff_eq!(fitted.coef()[[0, 0]], 1.0, epsilon = 1e-8);
        assert_abs_diff_eq!(fitted.coef()[[1, 0]], 1.0, epsilon = 1e-8);
    }

    #[test]
    fn test_predict_feature_mismatch() {
        let fitted =
            FittedLinearRegression::from_parts(array![[1.0], [2.0]], array![0.5]).unwrap();
        let result = fitted.predict(array![[1.0, 2.0, 3.0]].view());
        assert!(matches!(
            result,
            Err(ModelError::FeatureMismatch {
                expected_features: 2,
                got_features: 3
            })
        ));
    }

    #[test]
    fn test_from_parts_checks_intercept() {
        assert!(FittedLinearRegression::from_parts(array![[1.0, 2.0]], array![0.5]).is_err());
    }

    #[test]
    fn test_predict_is_deterministic() {
        let fitted =
            FittedLinearRegression::from_parts(array![[2.0], [3.0]], array![1.0]).unwrap();
        let x = array![[1.0, 2.0], [0.0, 0.0]];
        let p1 = fitted.predict(x.view()).unwrap();
        let p2 = fitted.predict(x.view()).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1, array![[9.0], [1.0]]);
    }
}
