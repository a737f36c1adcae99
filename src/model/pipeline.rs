//! Feature standardization in front of a regressor.

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

use super::{check_fit_input, Predictor, Regressor};
use crate::error::ModelError;
use crate::preprocessing::{FittedStandardScaler, FittedTransformer, StandardScaler, Transformer};

/// Standardizes `X` with a [`StandardScaler`] and fits `regressor` on the
/// scaled features. Targets are passed through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaledRegressor<R> {
    pub regressor: R,
    scaler: StandardScaler,
}

impl<R> ScaledRegressor<R> {
    pub fn new(regressor: R) -> Self {
        Self {
            regressor,
            scaler: StandardScaler::new(),
        }
    }

    pub fn with_scaler(mut self, scaler: StandardScaler) -> Self {
        self.scaler = scaler;
        self
    }
}

impl<R: Regressor> Regressor for ScaledRegressor<R> {
    type Fitted = FittedScaledRegressor<R::Fitted>;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
    ) -> Result<Self::Fitted, ModelError> {
        check_fit_input(x, y)?;
        let (scaler, x_scaled) = self.scaler.fit_transform(x)?;
        let predictor = self.regressor.fit(x_scaled.view(), y)?;
        Ok(FittedScaledRegressor { scaler, predictor })
    }

    fn supports_multi_output(&self) -> bool {
        self.regressor.supports_multi_output()
    }
}

/// Fitted scaler and the predictor trained on its output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedScaledRegressor<P> {
    scaler: FittedStandardScaler,
    predictor: P,
}

impl<P> FittedScaledRegressor<P> {
    pub fn scaler(&self) -> &FittedStandardScaler {
        &self.scaler
    }

    pub fn inner(&self) -> &P {
        &self.predictor
    }
}

impl<P: Predictor> Predictor for FittedScaledRegressor<P> {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let x_scaled = self.scaler.transform(x)?;
        self.predictor.predict(x_scaled.view())
    }

    fn n_features_in(&self) -> usize {
        self.scaler.n_features_in()
    }

    fn n_outputs(&self) -> usize {
        self.predictor.n_outputs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::linear::LinearRegression;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_scaled_linear_matches_unscaled() {
        let x = array![[1.0, 100.0], [2.0, 300.0], [3.0, 200.0], [4.0, 500.0]];
        let y = array![[3.0], [7.0], [6.0], [12.0]];

        let plain = LinearRegression::new().fit(x.view(), y.view()).unwrap();
        let scaled = ScaledRegressor::new(LinearRegression::new())
            .fit(x.view(), y.view())
            .unwrap();

        let a = plain.predict(x.view()).unwrap();
        let b = scaled.predict(x.view()).unwrap();
        for (p, q) in a.iter().zip(b.iter()) {
            assert_abs_diff_eq!(p, q, epsilon = 1e-9);
        }
        assert_eq!(scaled.n_features_in(), 2);
        assert_eq!(scaled.n_outputs(), 1);
    }

    #[test]
    fn test_scaler_is_fitted_on_features() {
        let x = array![[0.0], [2.0], [4.0]];
        let y = array![[1.0], [2.0], [3.0]];
        let fitted = ScaledRegressor::new(LinearRegression::new())
            .fit(x.view(), y.view())
            .unwrap();
        assert_abs_diff_eq!(fitted.scaler().mean()[0], 2.0);
    }

    #[test]
    fn test_predict_rejects_wrong_width() {
        let x = array![[0.0], [1.0]];
        let y = array![[0.0], [1.0]];
        let fitted = ScaledRegressor::new(LinearRegression::new())
            .fit(x.view(), y.view())
            .unwrap();
        let bad = array![[0.0, 1.0]];
        assert!(fitted.predict(bad.view()).is_err());
    }
}
