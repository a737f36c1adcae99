//! Data preprocessing transformers.
//!
//! Transformers follow a fit/fitted split: an unfitted [`Transformer`] holds
//! configuration only, and `fit` produces a [`FittedTransformer`] carrying
//! learned parameters that can be serialized next to a model.
//!
//! # Example
//!
//! ```
//! use multimodel::preprocessing::{FittedTransformer, StandardScaler, Transformer};
//! use ndarray::array;
//!
//! let train = array![[1.0, 10.0], [3.0, 30.0]];
//! let (fitted, scaled) = StandardScaler::new().fit_transform(train.view()).unwrap();
//! let restored = fitted.inverse_transform(scaled.view()).unwrap();
//! assert_eq!(restored, train);
//! ```

pub mod error;
pub mod standard;
pub mod traits;

pub use error::PreprocessingError;
pub use standard::{FittedStandardScaler, StandardScaler, StandardScalerConfig};
pub use traits::{FittedTransformer, Transformer};
