//! TOML run configuration for the command-line driver.
//!
//! ```toml
//! [data]
//! path = "data/log.csv"
//! max_rows = 1000
//! augm_cols = ["action_command"]
//!
//! [model]
//! algorithm = "linear_model"
//! scale_data = true
//! output = "models/linear.bin"
//!
//! [sweep]
//! n_trials = 3
//! [sweep.params.fit_intercept]
//! type = "choice"
//! values = [true, false]
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::dataset::CsvLoader;
use crate::model::Algorithm;
use crate::sweep::{ParamDistributions, SearchConfig};

/// Errors raised while loading a run configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    ParseToml {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

fn default_prefix() -> String {
    "state".to_string()
}

fn default_episode_col() -> Option<String> {
    Some("episode".to_string())
}

fn default_true() -> bool {
    true
}

/// `[data]`: where and how to read the training table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    pub path: PathBuf,
    #[serde(default)]
    pub max_rows: Option<usize>,
    /// Extra input columns appended after the prefixed ones.
    #[serde(default)]
    pub augm_cols: Vec<String>,
    #[serde(default = "default_prefix")]
    pub input_prefix: String,
    #[serde(default = "default_prefix")]
    pub output_prefix: String,
    #[serde(default = "default_episode_col")]
    pub episode_col: Option<String>,
    /// Pair each row's inputs with the next row's outputs.
    #[serde(default = "default_true")]
    pub next_step: bool,
}

impl DataConfig {
    pub fn loader(&self) -> CsvLoader {
        let loader = CsvLoader::new()
            .input_prefix(self.input_prefix.clone())
            .output_prefix(self.output_prefix.clone())
            .augm_cols(&self.augm_cols)
            .episode_col(self.episode_col.clone())
            .with_next_step(self.next_step);
        match self.max_rows {
            Some(max_rows) => loader.max_rows(max_rows),
            None => loader,
        }
    }
}

/// `[model]`: which estimator to build and where to save it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub algorithm: String,
    #[serde(default)]
    pub scale_data: bool,
    #[serde(default)]
    pub fit_separate: bool,
    pub output: PathBuf,
}

/// `[sweep]`: search budget plus one distribution per hyperparameter.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SweepConfig {
    #[serde(flatten)]
    pub search: SearchConfig,
    #[serde(default)]
    pub params: ParamDistributions,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub data: DataConfig,
    pub model: ModelConfig,
    #[serde(default)]
    pub sweep: Option<SweepConfig>,
}

impl RunConfig {
    /// Reads and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: RunConfig = toml::from_str(&text).map_err(|source| ConfigError::ParseToml {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.algorithm()?;
        if self.data.max_rows == Some(0) {
            return Err(ConfigError::Invalid("data.max_rows must be > 0".to_string()));
        }
        Ok(())
    }

    pub fn algorithm(&self) -> Result<Algorithm, ConfigError> {
        self.model
            .algorithm
            .parse()
            .map_err(|e: crate::error::ModelError| ConfigError::Invalid(e.to_string()))
    }
}
