//! Error type shared by the model manager, estimators and persistence layer.

use std::path::PathBuf;

use thiserror::Error;

use crate::dataset::DatasetError;
use crate::preprocessing::PreprocessingError;

/// Error type for model building, fitting, prediction and persistence.
#[derive(Debug, Error)]
pub enum ModelError {
    /// The requested algorithm is not part of the registry.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// `fit` or `sweep` was called before `build_model`.
    #[error("No estimator built; call build_model first")]
    NotBuilt,

    /// `predict` or `save_model` was called before a successful fit or load.
    #[error("Model has not been fitted or loaded")]
    PredictBeforeFit,

    /// A single-output estimator was asked to fit a multi-column target jointly.
    #[error("{algorithm} supports a single output only, got {n_outputs} target columns")]
    IncompatibleShape {
        algorithm: String,
        n_outputs: usize,
    },

    /// Shape mismatch between expected and actual matrix dimensions.
    #[error("Invalid shape: expected {expected}, got {got}")]
    InvalidShape { expected: String, got: String },

    /// Empty data provided where non-empty was required.
    #[error("Empty data: {0}")]
    EmptyData(String),

    /// Feature dimension mismatch between training and prediction input.
    #[error("Feature mismatch: expected {expected_features} features, got {got_features}")]
    FeatureMismatch {
        expected_features: usize,
        got_features: usize,
    },

    /// Invalid hyperparameter or search distribution.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Numerical failure inside an estimator (singular system, divergence).
    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error(transparent)]
    Preprocessing(#[from] PreprocessingError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    /// Filesystem failure while reading or writing model artifacts.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Artifact could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Artifact exists but is malformed, truncated or not a model file.
    #[error("Failed to deserialize model at {path}: {reason}")]
    Deserialization { path: PathBuf, reason: String },

    /// Flags supplied on load disagree with the ones persisted in the artifact.
    #[error("Load option `{field}` mismatch: caller passed {requested}, artifact has {persisted}")]
    ConfigMismatch {
        field: &'static str,
        requested: String,
        persisted: String,
    },

    /// Per-column artifacts do not reload in training column order.
    #[error(
        "Model files out of order in {path}: position {position} holds column {column} of {count}"
    )]
    ArtifactOrder {
        path: PathBuf,
        position: usize,
        column: usize,
        count: usize,
    },

    /// A per-column model directory holds no model files.
    #[error("No model files found in {0}")]
    MissingModels(PathBuf),
}

impl ModelError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ModelError::Io {
            path: path.into(),
            source,
        }
    }
}
