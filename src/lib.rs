//! Multi-output regression on tabular data.
//!
//! `multimodel` builds a regressor from a small menu of algorithms, fits it
//! either jointly on every target column or as one independent model per
//! column, and persists the fitted models so a fresh process can reload them
//! for prediction.
//!
//! ```
//! use multimodel::ModelManager;
//! use ndarray::array;
//!
//! let x = array![[0.0], [1.0], [2.0], [3.0]];
//! let y = array![[1.0, 0.0], [3.0, -1.0], [5.0, -2.0], [7.0, -3.0]];
//!
//! let mut manager = ModelManager::new();
//! manager.build_model("linear_model", false).unwrap();
//! manager.fit(x.view(), y.view(), false).unwrap();
//! let pred = manager.predict(array![[4.0]].view()).unwrap();
//! assert!((pred[[0, 0]] - 9.0).abs() < 1e-9);
//! ```

pub mod config;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod manager;
pub mod metrics;
pub mod model;
pub mod persist;
pub mod preprocessing;
pub mod serialization;
pub mod sweep;

pub use dataset::{load_csv, CsvLoader, Dataset, DatasetError};
pub use error::ModelError;
pub use manager::{ModelManager, ScalerPair, TrainedModels};
pub use metrics::Metrics;
pub use model::{Algorithm, Estimator, FittedEstimator, ParamValue, Predictor, Regressor};
pub use sweep::{ParamDistribution, ParamDistributions, SearchConfig, SearchResult, TrialResult};
