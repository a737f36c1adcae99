//! Core traits for preprocessing transformers.
//!
//! - [`Transformer`]: Used during fitting; has hyperparameters and can learn from data.
//! - [`FittedTransformer`]: After fitting; ready for inference and serialization.

use ndarray::{Array2, ArrayView2};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::preprocessing::error::PreprocessingError;

/// Trait for unfitted transformers with hyperparameters.
///
/// A transformer learns parameters from training data and can then transform
/// new data using those learned parameters.
///
/// # Example
/// ```
/// use multimodel::preprocessing::{FittedTransformer, StandardScaler, Transformer};
/// use ndarray::array;
///
/// let data = array![[0.0, 1.0], [2.0, 3.0]];
/// let fitted = StandardScaler::new().fit(data.view()).unwrap();
/// let scaled = fitted.transform(data.view()).unwrap();
/// assert_eq!(scaled.dim(), (2, 2));
/// ```
pub trait Transformer: Clone {
    /// The fitted transformer type ready for inference.
    type Fitted: FittedTransformer;

    /// Fit the transformer to the training data.
    ///
    /// # Errors
    /// Returns [`PreprocessingError`] if:
    /// - Data is empty
    /// - Data contains invalid values (NaN, Inf)
    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<Self::Fitted, PreprocessingError>;

    /// Fit the transformer and transform the same data in one step.
    fn fit_transform(
        &self,
        data: ArrayView2<'_, f64>,
    ) -> Result<(Self::Fitted, Array2<f64>), PreprocessingError> {
        let fitted = self.fit(data)?;
        let transformed = fitted.transform(data)?;
        Ok((fitted, transformed))
    }
}

/// Trait for fitted transformers ready for inference.
///
/// A fitted transformer is plain data, so it serializes directly and is
/// persisted inside model artifacts.
pub trait FittedTransformer: Clone + Serialize + DeserializeOwned {
    /// Transform data using learned parameters.
    ///
    /// # Errors
    /// Returns [`PreprocessingError::FeatureMismatch`] if the input width differs
    /// from the width seen during fit.
    fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, PreprocessingError>;

    /// Reverse the transformation.
    fn inverse_transform(&self, data: ArrayView2<'_, f64>)
        -> Result<Array2<f64>, PreprocessingError>;

    /// Returns the number of features seen during fit.
    fn n_features_in(&self) -> usize;
}

/// Fails with [`PreprocessingError::InvalidValues`] on the first NaN or infinity.
pub(crate) fn ensure_finite(data: ArrayView2<'_, f64>) -> Result<(), PreprocessingError> {
    for ((row, col), value) in data.indexed_iter() {
        if !value.is_finite() {
            return Err(PreprocessingError::InvalidValues(format!(
                "non-finite value {value} at row {row}, column {col}"
            )));
        }
    }
    Ok(())
}
