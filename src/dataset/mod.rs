//! Dataset abstractions for tabular regression.
//!
//! A [`Dataset`] holds an aligned pair of matrices:
//!
//! - **records** — feature matrix with shape `(n_samples, n_features)`
//! - **targets** — target matrix with shape `(n_samples, n_outputs)`; a single
//!   output is still a one-column matrix
//!
//! plus the column names they were read from. CSV files are turned into
//! datasets by [`CsvLoader`].
//!
//! # Example
//!
//! ```
//! use multimodel::dataset::Dataset;
//! use ndarray::array;
//!
//! let x = array![[1.0], [2.0], [3.0], [4.0]];
//! let y = array![[2.0], [4.0], [6.0], [8.0]];
//! let ds = Dataset::new(x, y).unwrap();
//! let folds = ds.kfold(2).unwrap();
//! assert_eq!(folds.len(), 2);
//! assert_eq!(folds[0].1.n_samples(), 2);
//! ```

use ndarray::{s, Array2, ArrayView2, Axis};
use std::path::PathBuf;
use thiserror::Error;

pub mod loader;
pub use self::loader::{load_csv, CsvLoader};

/// Errors raised while reading or reshaping datasets.
#[derive(Debug, Error)]
pub enum DatasetError {
    /// The CSV reader failed (missing file, malformed record, bad UTF-8).
    #[error("CSV error in {path}: {source}")]
    Csv {
        path: PathBuf,
        source: ::csv::Error,
    },
    /// A named column is absent from the CSV header.
    #[error("Column `{0}` not found in CSV header")]
    MissingColumn(String),
    /// No header matches the configured column prefix.
    #[error("No columns match prefix `{0}`")]
    NoColumns(String),
    /// A cell could not be parsed as a number.
    #[error("Cannot parse `{value}` in column `{column}` at data row {row}")]
    ParseValue {
        row: usize,
        column: String,
        value: String,
    },
    /// Dataset would contain no samples.
    #[error("Dataset is empty: {0}")]
    Empty(String),
    /// Records and targets disagree in shape.
    #[error("Shape mismatch: {0}")]
    ShapeMismatch(String),
}

/// In-memory feature/target pair with column names.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    records: Array2<f64>,
    targets: Array2<f64>,
    feature_names: Vec<String>,
    target_names: Vec<String>,
}

impl Dataset {
    /// Creates a dataset from aligned matrices.
    ///
    /// Column names default to `x0..` and `y0..`.
    pub fn new(records: Array2<f64>, targets: Array2<f64>) -> Result<Self, DatasetError> {
        if records.nrows() != targets.nrows() {
            return Err(DatasetError::ShapeMismatch(format!(
                "records have {} rows, targets have {}",
                records.nrows(),
                targets.nrows()
            )));
        }
        let feature_names = (0..records.ncols()).map(|j| format!("x{j}")).collect();
        let target_names = (0..targets.ncols()).map(|j| format!("y{j}")).collect();
        Ok(Self {
            records,
            targets,
            feature_names,
            target_names,
        })
    }

    /// Replaces the feature column names.
    pub fn with_feature_names(mut self, names: Vec<String>) -> Result<Self, DatasetError> {
        if names.len() != self.records.ncols() {
            return Err(DatasetError::ShapeMismatch(format!(
                "{} feature names for {} columns",
                names.len(),
                self.records.ncols()
            )));
        }
        self.feature_names = names;
        Ok(self)
    }

    /// Replaces the target column names.
    pub fn with_target_names(mut self, names: Vec<String>) -> Result<Self, DatasetError> {
        if names.len() != self.targets.ncols() {
            return Err(DatasetError::ShapeMismatch(format!(
                "{} target names for {} columns",
                names.len(),
                self.targets.ncols()
            )));
        }
        self.target_names = names;
        Ok(self)
    }

    pub fn records(&self) -> ArrayView2<'_, f64> {
        self.records.view()
    }

    pub fn targets(&self) -> ArrayView2<'_, f64> {
        self.targets.view()
    }

    pub fn n_samples(&self) -> usize {
        self.records.nrows()
    }

    /// Input dimension.
    pub fn n_features(&self) -> usize {
        self.records.ncols()
    }

    /// Output dimension.
    pub fn n_outputs(&self) -> usize {
        self.targets.ncols()
    }

    pub fn is_empty(&self) -> bool {
        self.n_samples() == 0
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_names(&self) -> &[String] {
        &self.target_names
    }

    /// Consumes the dataset, returning `(records, targets)`.
    pub fn into_parts(self) -> (Array2<f64>, Array2<f64>) {
        (self.records, self.targets)
    }

    /// Builds a new dataset from the given row indices, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            records: self.records.select(Axis(0), indices),
            targets: self.targets.select(Axis(0), indices),
            feature_names: self.feature_names.clone(),
            target_names: self.target_names.clone(),
        }
    }

    /// Splits into leading train rows and trailing test rows.
    pub fn split(&self, train_ratio: f64) -> (Self, Self) {
        let n_train = ((self.n_samples() as f64) * train_ratio.clamp(0.0, 1.0)) as usize;
        let head = Self {
            records: self.records.slice(s![..n_train, ..]).to_owned(),
            targets: self.targets.slice(s![..n_train, ..]).to_owned(),
            feature_names: self.feature_names.clone(),
            target_names: self.target_names.clone(),
        };
        let tail = Self {
            records: self.records.slice(s![n_train.., ..]).to_owned(),
            targets: self.targets.slice(s![n_train.., ..]).to_owned(),
            feature_names: self.feature_names.clone(),
            target_names: self.target_names.clone(),
        };
        (head, tail)
    }

    /// Contiguous K-fold split without shuffling.
    ///
    /// Returns `(train, validation)` pairs. The first `n % k` folds hold one
    /// extra sample, matching scikit-learn's `KFold`.
    pub fn kfold(&self, k: usize) -> Result<Vec<(Self, Self)>, DatasetError> {
        let n = self.n_samples();
        if k < 2 || k > n {
            return Err(DatasetError::ShapeMismatch(format!(
                "cannot split {n} samples into {k} folds"
            )));
        }

        let mut folds = Vec::with_capacity(k);
        let mut start = 0;
        for fold in 0..k {
            let size = n / k + usize::from(fold < n % k);
            let end = start + size;
            let train: Vec<usize> = (0..start).chain(end..n).collect();
            let valid: Vec<usize> = (start..end).collect();
            folds.push((self.select_rows(&train), self.select_rows(&valid)));
            start = end;
        }
        Ok(folds)
    }
}
