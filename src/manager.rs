//! The model manager: build, fit, predict, save and load.
//!
//! A manager holds one estimator from the [`Algorithm`] menu. Fitting either
//! trains it once on the whole target matrix or trains one clone per target
//! column; the result is kept as a [`TrainedModels`] value, so the separate
//! flag can never disagree with the models actually held.
//!
//! ```no_run
//! use multimodel::ModelManager;
//! use ndarray::array;
//!
//! let x = array![[0.0, 1.0], [1.0, 0.0], [2.0, 2.0]];
//! let y = array![[1.0, 0.5], [2.0, 1.5], [5.0, 2.0]];
//!
//! let mut manager = ModelManager::new();
//! manager.build_model("linear_model", true).unwrap();
//! manager.fit(x.view(), y.view(), false).unwrap();
//! manager.save_model("models/joint.bin").unwrap();
//!
//! let mut loaded = ModelManager::new();
//! loaded.load_model("models/joint.bin", true, false).unwrap();
//! assert_eq!(loaded.predict(x.view()).unwrap(), manager.predict(x.view()).unwrap());
//! ```

use std::fs;
use std::path::Path;

use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::ModelError;
use crate::model::{check_fit_input, Algorithm, Estimator, FittedEstimator, Predictor};
use crate::persist::{
    list_model_files, model_file_name, read_artifact, stale_model_files, write_artifact,
    ArtifactHeader, ModelArtifact,
};
use crate::preprocessing::{FittedStandardScaler, FittedTransformer, StandardScaler, Transformer};
use crate::sweep::{self, ParamDistributions, SearchConfig, SearchResult};

/// Scalers fitted on the training features and targets.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScalerPair {
    pub input: FittedStandardScaler,
    pub output: FittedStandardScaler,
}

/// Fitted models held by a manager.
#[derive(Clone, Debug, PartialEq)]
pub enum TrainedModels {
    /// One model predicting every target column.
    Joint(FittedEstimator),
    /// Model `i` predicts target column `i` only.
    PerColumn(Vec<FittedEstimator>),
}

impl TrainedModels {
    pub fn is_separate(&self) -> bool {
        matches!(self, TrainedModels::PerColumn(_))
    }

    pub fn n_models(&self) -> usize {
        match self {
            TrainedModels::Joint(_) => 1,
            TrainedModels::PerColumn(models) => models.len(),
        }
    }

    pub fn n_outputs(&self) -> usize {
        match self {
            TrainedModels::Joint(model) => model.n_outputs(),
            TrainedModels::PerColumn(models) => models.len(),
        }
    }

    pub fn n_features_in(&self) -> usize {
        match self {
            TrainedModels::Joint(model) => model.n_features_in(),
            TrainedModels::PerColumn(models) => {
                models.first().map_or(0, |model| model.n_features_in())
            }
        }
    }

    fn algorithm(&self) -> Option<Algorithm> {
        match self {
            TrainedModels::Joint(model) => Some(model.algorithm()),
            TrainedModels::PerColumn(models) => models.first().map(|model| model.algorithm()),
        }
    }

    /// Predicts an `(n, n_outputs)` matrix, columns in training order.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        match self {
            TrainedModels::Joint(model) => model.predict(x),
            TrainedModels::PerColumn(models) => {
                let mut out = Array2::<f64>::zeros((x.nrows(), models.len()));
                for (i, model) in models.iter().enumerate() {
                    let column = model.predict(x)?;
                    debug!(model = i, rows = column.nrows(), "predicted column");
                    out.column_mut(i).assign(&column.column(0));
                }
                Ok(out)
            }
        }
    }
}

/// Whether per-model fitting progress is logged at `info` or `debug`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Progress {
    Info,
    Quiet,
}

/// Fits `estimator` on every target column at once, or once per column.
pub(crate) fn fit_models(
    estimator: &Estimator,
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    separate: bool,
    progress: Progress,
) -> Result<TrainedModels, ModelError> {
    if !separate {
        return Ok(TrainedModels::Joint(estimator.fit(x, y)?));
    }
    let n_models = y.ncols();
    let mut models = Vec::with_capacity(n_models);
    for i in 0..n_models {
        match progress {
            Progress::Info => info!("Fitting model {} of {}", i + 1, n_models),
            Progress::Quiet => debug!("Fitting model {} of {}", i + 1, n_models),
        }
        let column = y.slice(ndarray::s![.., i..i + 1]);
        models.push(estimator.fit(x, column)?);
    }
    Ok(TrainedModels::PerColumn(models))
}

/// [`fit_models`] on standardized `x` and `y` when `scale_data` is set.
pub(crate) fn fit_scaled(
    estimator: &Estimator,
    scale_data: bool,
    x: ArrayView2<'_, f64>,
    y: ArrayView2<'_, f64>,
    separate: bool,
    progress: Progress,
) -> Result<(TrainedModels, Option<ScalerPair>), ModelError> {
    if !scale_data {
        return Ok((fit_models(estimator, x, y, separate, progress)?, None));
    }
    let (input, x_scaled) = StandardScaler::new().fit_transform(x)?;
    let (output, y_scaled) = StandardScaler::new().fit_transform(y)?;
    let models = fit_models(estimator, x_scaled.view(), y_scaled.view(), separate, progress)?;
    Ok((models, Some(ScalerPair { input, output })))
}

/// Predicts in original target units, undoing the target scaling.
pub(crate) fn predict_scaled(
    models: &TrainedModels,
    scalers: Option<&ScalerPair>,
    x: ArrayView2<'_, f64>,
) -> Result<Array2<f64>, ModelError> {
    let expected = models.n_features_in();
    if x.ncols() != expected {
        return Err(ModelError::FeatureMismatch {
            expected_features: expected,
            got_features: x.ncols(),
        });
    }
    match scalers {
        Some(scalers) => {
            let x_scaled = scalers.input.transform(x)?;
            let y_scaled = models.predict(x_scaled.view())?;
            Ok(scalers.output.inverse_transform(y_scaled.view())?)
        }
        None => models.predict(x),
    }
}

struct LoadedModels {
    header: ArtifactHeader,
    scalers: Option<ScalerPair>,
    models: TrainedModels,
}

#[derive(Clone, Debug, Default)]
pub struct ModelManager {
    estimator: Option<Estimator>,
    scale_data: bool,
    scalers: Option<ScalerPair>,
    models: Option<TrainedModels>,
}

impl ModelManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects an algorithm by name and resets any trained state.
    ///
    /// On [`ModelError::UnsupportedAlgorithm`] the manager is left untouched.
    pub fn build_model(&mut self, algorithm: &str, scale_data: bool) -> Result<(), ModelError> {
        let algorithm: Algorithm = algorithm.parse()?;
        self.build_with(algorithm.default_estimator(), scale_data);
        Ok(())
    }

    /// Like [`build_model`](Self::build_model) with preconfigured hyperparameters.
    pub fn build_with(&mut self, estimator: Estimator, scale_data: bool) {
        info!(algorithm = %estimator.algorithm(), scale_data, "built estimator");
        self.estimator = Some(estimator);
        self.scale_data = scale_data;
        self.scalers = None;
        self.models = None;
    }

    pub fn algorithm(&self) -> Option<Algorithm> {
        self.estimator.as_ref().map(Estimator::algorithm)
    }

    pub fn estimator(&self) -> Option<&Estimator> {
        self.estimator.as_ref()
    }

    pub fn scale_data(&self) -> bool {
        self.scale_data
    }

    pub fn scalers(&self) -> Option<&ScalerPair> {
        self.scalers.as_ref()
    }

    pub fn trained(&self) -> Option<&TrainedModels> {
        self.models.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.models.is_some()
    }

    /// Whether the held models are one-per-column. `false` when unfitted.
    pub fn is_separate(&self) -> bool {
        self.models.as_ref().is_some_and(TrainedModels::is_separate)
    }

    pub fn n_models(&self) -> usize {
        self.models.as_ref().map_or(0, TrainedModels::n_models)
    }

    /// Fits on `x` `(n, f)` and `y` `(n, k)`.
    ///
    /// Algorithms without multi-output support are always fitted per column;
    /// asking for a joint fit of one logs a warning.
    pub fn fit(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        fit_separate: bool,
    ) -> Result<(), ModelError> {
        let estimator = self.estimator.as_ref().ok_or(ModelError::NotBuilt)?;
        self.models = None;
        self.scalers = None;
        check_fit_input(x, y)?;

        let separate = if !fit_separate && !estimator.supports_multi_output() {
            warn!(
                "{} does not support multi-output targets, fitting one model per column",
                estimator.algorithm()
            );
            true
        } else {
            fit_separate
        };

        let (models, scalers) =
            fit_scaled(estimator, self.scale_data, x, y, separate, Progress::Info)?;

        info!(
            algorithm = %estimator.algorithm(),
            models = models.n_models(),
            outputs = y.ncols(),
            "fit complete"
        );
        self.models = Some(models);
        self.scalers = scalers;
        Ok(())
    }

    /// Predicts an `(n, k)` matrix in original target units.
    pub fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        let models = self.models.as_ref().ok_or(ModelError::PredictBeforeFit)?;
        predict_scaled(models, self.scalers.as_ref(), x)
    }

    /// Writes the fitted models to `path`: a single file for joint models,
    /// a directory of `model{i}.bin` files for per-column models.
    pub fn save_model(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let models = self.models.as_ref().ok_or(ModelError::PredictBeforeFit)?;
        let algorithm = models.algorithm().ok_or(ModelError::PredictBeforeFit)?;
        let header = |separate, column, n_columns| ArtifactHeader {
            algorithm,
            scale_data: self.scale_data,
            separate,
            column,
            n_columns,
        };

        match models {
            TrainedModels::Joint(model) => {
                let artifact = ModelArtifact::new(
                    header(false, 0, model.n_outputs()),
                    self.scalers.clone(),
                    model.clone(),
                );
                write_artifact(path, &artifact)?;
            }
            TrainedModels::PerColumn(per_column) => {
                fs::create_dir_all(path).map_err(|e| ModelError::io(path, e))?;
                let n_columns = per_column.len();
                for (i, model) in per_column.iter().enumerate() {
                    let artifact = ModelArtifact::new(
                        header(true, i, n_columns),
                        self.scalers.clone(),
                        model.clone(),
                    );
                    write_artifact(&path.join(model_file_name(i)), &artifact)?;
                }
                for stale in stale_model_files(path, n_columns)? {
                    fs::remove_file(&stale).map_err(|e| ModelError::io(&stale, e))?;
                    debug!(path = %stale.display(), "removed stale model file");
                }
            }
        }
        info!(path = %path.display(), models = models.n_models(), "saved models");
        Ok(())
    }

    /// Loads models saved by [`save_model`](Self::save_model).
    ///
    /// `scale_data` and `separate_models` must match the flags the models
    /// were saved with, otherwise [`ModelError::ConfigMismatch`] is returned.
    /// On any error the manager is left untouched.
    pub fn load_model(
        &mut self,
        path: impl AsRef<Path>,
        scale_data: bool,
        separate_models: bool,
    ) -> Result<(), ModelError> {
        let path = path.as_ref();
        let loaded = read_models(path, separate_models)?;
        check_flag("scale_data", scale_data, loaded.header.scale_data)?;
        check_flag("separate_models", separate_models, loaded.header.separate)?;
        self.install(path, loaded);
        Ok(())
    }

    /// Loads models taking the flags from the artifacts: a directory is
    /// read as per-column models, a file as a joint model.
    pub fn restore(&mut self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let separate = path.is_dir();
        let loaded = read_models(path, separate)?;
        check_flag("separate_models", separate, loaded.header.separate)?;
        self.install(path, loaded);
        Ok(())
    }

    fn install(&mut self, path: &Path, loaded: LoadedModels) {
        let algorithm = loaded.header.algorithm;
        info!(
            path = %path.display(),
            algorithm = %algorithm,
            models = loaded.models.n_models(),
            "loaded models"
        );
        self.estimator = Some(algorithm.default_estimator());
        self.scale_data = loaded.header.scale_data;
        self.scalers = loaded.scalers;
        self.models = Some(loaded.models);
    }

    /// Randomized hyperparameter search over the built estimator.
    pub fn sweep(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
        params: &ParamDistributions,
        config: &SearchConfig,
    ) -> Result<SearchResult, ModelError> {
        let estimator = self.estimator.as_ref().ok_or(ModelError::NotBuilt)?;
        sweep::search(estimator, self.scale_data, x, y, params, config)
    }
}

fn check_flag(field: &'static str, requested: bool, persisted: bool) -> Result<(), ModelError> {
    if requested != persisted {
        return Err(ModelError::ConfigMismatch {
            field,
            requested: requested.to_string(),
            persisted: persisted.to_string(),
        });
    }
    Ok(())
}

fn read_models(path: &Path, separate: bool) -> Result<LoadedModels, ModelError> {
    if !separate {
        let artifact = read_artifact(path)?;
        check_scalers(path, &artifact)?;
        return Ok(LoadedModels {
            header: artifact.header,
            scalers: artifact.scalers,
            models: TrainedModels::Joint(artifact.estimator),
        });
    }

    let files = list_model_files(path)?;
    if files.is_empty() {
        return Err(ModelError::MissingModels(path.to_path_buf()));
    }
    let count = files.len();
    let mut header: Option<ArtifactHeader> = None;
    let mut scalers = None;
    let mut models = Vec::with_capacity(count);
    for (position, file) in files.iter().enumerate() {
        let artifact = read_artifact(file)?;
        check_scalers(file, &artifact)?;
        let h = &artifact.header;
        let first = header.get_or_insert_with(|| h.clone());
        let misplaced =
            h.column != position || h.column >= h.n_columns || h.n_columns != first.n_columns;
        if h.separate && misplaced {
            return Err(ModelError::ArtifactOrder {
                path: file.clone(),
                position,
                column: h.column,
                count: first.n_columns,
            });
        }
        if first.algorithm != h.algorithm || first.scale_data != h.scale_data {
            return Err(ModelError::Deserialization {
                path: file.clone(),
                reason: format!(
                    "artifact trained with {} (scale_data = {}) does not match {} \
                     (scale_data = {})",
                    h.algorithm, h.scale_data, first.algorithm, first.scale_data
                ),
            });
        }
        if position == 0 {
            scalers = artifact.scalers;
        } else if artifact.scalers != scalers {
            return Err(ModelError::Deserialization {
                path: file.clone(),
                reason: "scalers differ from the first model file".to_string(),
            });
        }
        models.push(artifact.estimator);
    }
    let header = header.ok_or_else(|| ModelError::MissingModels(path.to_path_buf()))?;
    if header.separate && count != header.n_columns {
        return Err(ModelError::Deserialization {
            path: path.to_path_buf(),
            reason: format!("found {count} model files, expected {}", header.n_columns),
        });
    }
    Ok(LoadedModels {
        header,
        scalers,
        models: TrainedModels::PerColumn(models),
    })
}

fn check_scalers(path: &Path, artifact: &ModelArtifact) -> Result<(), ModelError> {
    if artifact.header.scale_data != artifact.scalers.is_some() {
        return Err(ModelError::Deserialization {
            path: path.to_path_buf(),
            reason: "scale_data flag disagrees with stored scalers".to_string(),
        });
    }
    Ok(())
}
