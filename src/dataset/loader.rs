//! CSV loading for simulator-style logs.
//!
//! A log holds one row per step. Feature columns are the ones whose header
//! starts with the input prefix (`state` by default), followed by any extra
//! "augmented" columns (actions, configuration). Targets are the output-prefix
//! columns of the *next* row in the same episode, so the model learns the
//! transition `state(t), action(t) -> state(t + 1)`. The last row of each
//! episode has no successor and is dropped.

use std::path::Path;

use ndarray::Array2;
use tracing::{debug, info};

use super::{Dataset, DatasetError};

/// Configurable CSV reader producing a [`Dataset`].
#[derive(Debug, Clone)]
pub struct CsvLoader {
    input_prefix: String,
    output_prefix: String,
    augm_cols: Vec<String>,
    episode_col: Option<String>,
    max_rows: Option<usize>,
    next_step: bool,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self {
            input_prefix: "state".to_string(),
            output_prefix: "state".to_string(),
            augm_cols: Vec::new(),
            episode_col: Some("episode".to_string()),
            max_rows: None,
            next_step: true,
        }
    }
}

impl CsvLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn input_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.input_prefix = prefix.into();
        self
    }

    pub fn output_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.output_prefix = prefix.into();
        self
    }

    /// Extra feature columns appended after the input-prefix columns.
    pub fn augm_cols<S: AsRef<str>>(mut self, cols: &[S]) -> Self {
        self.augm_cols = cols.iter().map(|c| c.as_ref().to_string()).collect();
        self
    }

    /// Column that groups rows into episodes; `None` treats the file as one episode.
    pub fn episode_col(mut self, col: Option<String>) -> Self {
        self.episode_col = col;
        self
    }

    /// Reads at most this many data rows (header excluded).
    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// When false, targets come from the same row as the features.
    pub fn with_next_step(mut self, next_step: bool) -> Self {
        self.next_step = next_step;
        self
    }

    /// Reads the CSV at `path`.
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Dataset, DatasetError> {
        let path = path.as_ref();
        let csv_err = |source: ::csv::Error| DatasetError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut rdr = ::csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(::csv::Trim::All)
            .from_path(path)
            .map_err(csv_err)?;
        let headers = rdr.headers().map_err(csv_err)?.clone();

        let mut input_idx: Vec<usize> = prefixed(&headers, &self.input_prefix);
        if input_idx.is_empty() && self.augm_cols.is_empty() {
            return Err(DatasetError::NoColumns(self.input_prefix.clone()));
        }
        for col in &self.augm_cols {
            let idx = headers
                .iter()
                .position(|h| h == col)
                .ok_or_else(|| DatasetError::MissingColumn(col.clone()))?;
            if !input_idx.contains(&idx) {
                input_idx.push(idx);
            }
        }
        let output_idx = prefixed(&headers, &self.output_prefix);
        if output_idx.is_empty() {
            return Err(DatasetError::NoColumns(self.output_prefix.clone()));
        }
        let episode_idx = self
            .episode_col
            .as_ref()
            .and_then(|name| headers.iter().position(|h| h == name));

        let limit = self.max_rows.unwrap_or(usize::MAX);
        let mut episodes: Vec<String> = Vec::new();
        let mut inputs: Vec<Vec<f64>> = Vec::new();
        let mut outputs: Vec<Vec<f64>> = Vec::new();
        for (row, record) in rdr.records().take(limit).enumerate() {
            let record = record.map_err(csv_err)?;
            let parse = |idx: usize| -> Result<f64, DatasetError> {
                let raw = record.get(idx).unwrap_or("");
                raw.parse::<f64>().map_err(|_| DatasetError::ParseValue {
                    row,
                    column: headers.get(idx).unwrap_or("").to_string(),
                    value: raw.to_string(),
                })
            };
            inputs.push(input_idx.iter().map(|&i| parse(i)).collect::<Result<_, _>>()?);
            outputs.push(output_idx.iter().map(|&i| parse(i)).collect::<Result<_, _>>()?);
            episodes.push(
                episode_idx
                    .and_then(|i| record.get(i))
                    .unwrap_or_default()
                    .to_string(),
            );
        }
        debug!(rows = inputs.len(), path = %path.display(), "read csv rows");

        let pairs: Vec<(usize, usize)> = if self.next_step {
            (0..inputs.len().saturating_sub(1))
                .filter(|&t| episodes[t] == episodes[t + 1])
                .map(|t| (t, t + 1))
                .collect()
        } else {
            (0..inputs.len()).map(|t| (t, t)).collect()
        };
        if pairs.is_empty() {
            return Err(DatasetError::Empty(format!(
                "{} yields no samples",
                path.display()
            )));
        }

        let n = pairs.len();
        let mut records = Array2::<f64>::zeros((n, input_idx.len()));
        let mut targets = Array2::<f64>::zeros((n, output_idx.len()));
        for (row, &(src, dst)) in pairs.iter().enumerate() {
            for (j, v) in inputs[src].iter().enumerate() {
                records[[row, j]] = *v;
            }
            for (j, v) in outputs[dst].iter().enumerate() {
                targets[[row, j]] = *v;
            }
        }

        let names = |idx: &[usize]| -> Vec<String> {
            idx.iter()
                .map(|&i| headers.get(i).unwrap_or("").to_string())
                .collect()
        };
        info!(
            samples = n,
            input_dim = input_idx.len(),
            output_dim = output_idx.len(),
            "loaded dataset from {}",
            path.display()
        );
        Dataset::new(records, targets)?
            .with_feature_names(names(&input_idx))?
            .with_target_names(names(&output_idx))
    }
}

fn prefixed(headers: &::csv::StringRecord, prefix: &str) -> Vec<usize> {
    headers
        .iter()
        .enumerate()
        .filter(|(_, h)| h.starts_with(prefix))
        .map(|(i, _)| i)
        .collect()
}

/// Loads `(X, y)` transitions from a CSV log with the default column layout.
pub fn load_csv<P: AsRef<Path>, S: AsRef<str>>(
    dataset_path: P,
    max_rows: usize,
    augm_cols: &[S],
) -> Result<Dataset, DatasetError> {
    CsvLoader::new()
        .max_rows(max_rows)
        .augm_cols(augm_cols)
        .load(dataset_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use std::io::Write;

    fn write_csv(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
        let path = dir.path().join("log.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    const LOG: &str = "\
episode,iteration,state_x,state_v,action_command,config_length
1,0,0.0,1.0,0.5,2.0
1,1,1.0,1.5,-0.5,2.0
1,2,2.5,1.0,0.0,2.0
2,0,10.0,0.0,1.0,3.0
2,1,10.0,1.0,1.0,3.0
";

    #[test]
    fn test_pairs_transitions_within_episodes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, LOG);

        let ds = load_csv(&path, 1000, &["action_command", "config_length"]).unwrap();

        // 5 rows, 2 episodes -> 3 transitions
        assert_eq!(ds.n_samples(), 3);
        assert_eq!(ds.n_features(), 4);
        assert_eq!(ds.n_outputs(), 2);
        assert_eq!(
            ds.feature_names(),
            &["state_x", "state_v", "action_command", "config_length"]
        );
        assert_eq!(ds.target_names(), &["state_x", "state_v"]);
        assert_eq!(ds.records().row(0).to_vec(), vec![0.0, 1.0, 0.5, 2.0]);
        assert_eq!(ds.targets(), array![[1.0, 1.5], [2.5, 1.0], [10.0, 1.0]]);
    }

    #[test]
    fn test_max_rows_limits_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, LOG);
        let ds = load_csv(&path, 2, &["action_command"]).unwrap();
        assert_eq!(ds.n_samples(), 1);
    }

    #[test]
    fn test_same_row_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, LOG);
        let ds = CsvLoader::new()
            .input_prefix("action")
            .with_next_step(false)
            .load(&path)
            .unwrap();
        assert_eq!(ds.n_samples(), 5);
        assert_eq!(ds.n_features(), 1);
        assert_eq!(ds.targets()[[3, 0]], 10.0);
    }

    #[test]
    fn test_without_episode_column_is_single_episode() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, LOG);
        let ds = CsvLoader::new().episode_col(None).load(&path).unwrap();
        assert_eq!(ds.n_samples(), 4);
    }

    #[test]
    fn test_missing_augm_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, LOG);
        let result = load_csv(&path, 10, &["config_masspole"]);
        assert!(matches!(result, Err(DatasetError::MissingColumn(c)) if c == "config_masspole"));
    }

    #[test]
    fn test_unparsable_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(&dir, "episode,state_x\n1,0.0\n1,oops\n");
        let result = load_csv(&path, 10, &[] as &[&str]);
        assert!(matches!(
            result,
            Err(DatasetError::ParseValue { row: 1, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load_csv("does/not/exist.csv", 10, &[] as &[&str]);
        assert!(matches!(result, Err(DatasetError::Csv { .. })));
    }
}
