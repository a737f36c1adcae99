//! Standard Scaler (Z-score normalization).
//!
//! Transforms features by removing the mean and scaling to unit variance.
//!
//! The standard score of a sample `x` is calculated as:
//! ```text
//! z = (x - u) / s
//! ```
//! where `u` is the mean of the training samples, and `s` is the population
//! standard deviation. Constant columns keep `s = 1`.

use ndarray::{Array1, Array2, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::preprocessing::error::PreprocessingError;
use crate::preprocessing::traits::{ensure_finite, FittedTransformer, Transformer};

/// Configuration for StandardScaler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StandardScalerConfig {
    /// If true, center the data before scaling.
    pub with_mean: bool,
    /// If true, scale the data to unit variance.
    pub with_std: bool,
}

impl Default for StandardScalerConfig {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

/// StandardScaler transformer (unfitted).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    config: StandardScalerConfig,
}

impl StandardScaler {
    /// Create a new StandardScaler with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set whether to center data by mean.
    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.config.with_mean = with_mean;
        self
    }

    /// Set whether to scale data to unit variance.
    pub fn with_std(mut self, with_std: bool) -> Self {
        self.config.with_std = with_std;
        self
    }
}

impl Transformer for StandardScaler {
    type Fitted = FittedStandardScaler;

    fn fit(&self, data: ArrayView2<'_, f64>) -> Result<Self::Fitted, PreprocessingError> {
        let (rows, cols) = data.dim();

        if rows == 0 {
            return Err(PreprocessingError::EmptyData(
                "Cannot fit StandardScaler on empty data".to_string(),
            ));
        }
        ensure_finite(data)?;

        let mean = if self.config.with_mean {
            data.mean_axis(Axis(0))
                .unwrap_or_else(|| Array1::zeros(cols))
        } else {
            Array1::zeros(cols)
        };

        let std = if self.config.with_std {
            // population std (ddof=0), constant features keep unit scale
            data.std_axis(Axis(0), 0.0)
                .mapv(|s| if s == 0.0 { 1.0 } else { s })
        } else {
            Array1::ones(cols)
        };

        Ok(FittedStandardScaler {
            config: self.config.clone(),
            mean,
            std,
            n_features: cols,
        })
    }
}

/// Fitted StandardScaler ready for inference.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedStandardScaler {
    config: StandardScalerConfig,
    mean: Array1<f64>,
    std: Array1<f64>,
    n_features: usize,
}

impl FittedStandardScaler {
    /// Get the mean values for each feature.
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Get the standard deviation values for each feature.
    pub fn std(&self) -> &Array1<f64> {
        &self.std
    }

    fn check_width(&self, cols: usize) -> Result<(), PreprocessingError> {
        if cols != self.n_features {
            return Err(PreprocessingError::FeatureMismatch {
                expected_features: self.n_features,
                got_features: cols,
            });
        }
        Ok(())
    }
}

impl FittedTransformer for FittedStandardScaler {
    fn transform(&self, data: ArrayView2<'_, f64>) -> Result<Array2<f64>, PreprocessingError> {
        self.check_width(data.ncols())?;

        let mut result = data.to_owned();
        if self.config.with_mean {
            result -= &self.mean;
        }
        if self.config.with_std {
            result /= &self.std;
        }
        Ok(result)
    }

    fn inverse_transform(
        &self,
        data: ArrayView2<'_, f64>,
    ) -> Result<Array2<f64>, PreprocessingError> {
        self.check_width(data.ncols())?;

        let mut result = data.to_owned();
        if self.config.with_std {
            result *= &self.std;
        }
        if self.config.with_mean {
            result += &self.mean;
        }
        Ok(result)
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }
}
