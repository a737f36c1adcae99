//! On-disk model artifacts.
//!
//! Every artifact is a single bincode-encoded [`ModelArtifact`]: a magic tag
//! and format version, a header describing how the model was trained, the
//! fitted scalers (if any) and the fitted estimator. Joint models are written
//! as one file; per-column models as one `model{i}.bin` per target column in
//! a directory, reloaded in natural file name order.

use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ModelError;
use crate::manager::ScalerPair;
use crate::model::{Algorithm, FittedEstimator};
use crate::serialization::SerializableParams;

pub const MAGIC: [u8; 4] = *b"MMGR";
pub const FORMAT_VERSION: u32 = 1;

/// How the persisted model was trained.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub algorithm: Algorithm,
    pub scale_data: bool,
    pub separate: bool,
    /// Target column this model predicts; 0 for joint models.
    pub column: usize,
    /// Number of target columns of the training data.
    pub n_columns: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    magic: [u8; 4],
    format_version: u32,
    pub header: ArtifactHeader,
    pub scalers: Option<ScalerPair>,
    pub estimator: FittedEstimator,
}

impl ModelArtifact {
    pub fn new(
        header: ArtifactHeader,
        scalers: Option<ScalerPair>,
        estimator: FittedEstimator,
    ) -> Self {
        Self {
            magic: MAGIC,
            format_version: FORMAT_VERSION,
            header,
            scalers,
            estimator,
        }
    }
}

/// File name of the per-column model `index`.
pub fn model_file_name(index: usize) -> String {
    format!("model{index}.bin")
}

/// Natural ordering: runs of ASCII digits compare by numeric value, so
/// `model2.bin < model10.bin`. Equal values with more leading zeros sort
/// later. Everything else compares bytewise.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i].is_ascii_digit() && b[j].is_ascii_digit() {
            let (a_end, b_end) = (digit_run_end(a, i), digit_run_end(b, j));
            let (a_run, b_run) = (&a[i..a_end], &b[j..b_end]);
            let (a_trim, b_trim) = (trim_zeros(a_run), trim_zeros(b_run));
            let ord = a_trim
                .len()
                .cmp(&b_trim.len())
                .then_with(|| a_trim.cmp(b_trim))
                .then_with(|| a_run.len().cmp(&b_run.len()));
            if ord != Ordering::Equal {
                return ord;
            }
            i = a_end;
            j = b_end;
        } else {
            match a[i].cmp(&b[j]) {
                Ordering::Equal => {
                    i += 1;
                    j += 1;
                }
                ord => return ord,
            }
        }
    }
    (a.len() - i).cmp(&(b.len() - j))
}

fn digit_run_end(s: &[u8], start: usize) -> usize {
    s[start..]
        .iter()
        .position(|c| !c.is_ascii_digit())
        .map_or(s.len(), |offset| start + offset)
}

fn trim_zeros(run: &[u8]) -> &[u8] {
    let first = run.iter().position(|&c| c != b'0').unwrap_or(run.len());
    &run[first..]
}

/// Regular files in `dir`, naturally sorted by file name.
pub fn list_model_files(dir: &Path) -> Result<Vec<PathBuf>, ModelError> {
    let entries = fs::read_dir(dir).map_err(|e| ModelError::io(dir, e))?;
    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ModelError::io(dir, e))?;
        let file_type = entry.file_type().map_err(|e| ModelError::io(entry.path(), e))?;
        if file_type.is_file() {
            files.push(entry.path());
        }
    }
    files.sort_by(|a, b| natural_cmp(&file_name_lossy(a), &file_name_lossy(b)));
    Ok(files)
}

/// Files in `dir` named `model{j}.bin` with `j >= n_columns`.
pub fn stale_model_files(dir: &Path, n_columns: usize) -> Result<Vec<PathBuf>, ModelError> {
    let files = list_model_files(dir)?;
    Ok(files
        .into_iter()
        .filter(|file| {
            let name = file_name_lossy(file);
            name.strip_prefix("model")
                .and_then(|rest| rest.strip_suffix(".bin"))
                .and_then(|index| index.parse::<usize>().ok())
                .is_some_and(|index| index >= n_columns && model_file_name(index) == name)
        })
        .collect())
}

fn file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Writes `artifact` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, artifact: &ModelArtifact) -> Result<(), ModelError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ModelError::io(parent, e))?;
    }
    let bytes = artifact
        .to_bytes()
        .map_err(|e| ModelError::Serialization(e.to_string()))?;
    fs::write(path, &bytes).map_err(|e| ModelError::io(path, e))?;
    debug!(path = %path.display(), bytes = bytes.len(), "wrote model artifact");
    Ok(())
}

/// Reads and checks one artifact.
pub fn read_artifact(path: &Path) -> Result<ModelArtifact, ModelError> {
    let bytes = fs::read(path).map_err(|e| ModelError::io(path, e))?;
    let malformed = |reason: String| ModelError::Deserialization {
        path: path.to_path_buf(),
        reason,
    };
    if bytes.len() < MAGIC.len() || bytes[..MAGIC.len()] != MAGIC {
        return Err(malformed("not a model artifact".to_string()));
    }
    let artifact = ModelArtifact::from_bytes(&bytes).map_err(|e| malformed(e.to_string()))?;
    if artifact.format_version != FORMAT_VERSION {
        return Err(malformed(format!(
            "unsupported format version {}, expected {FORMAT_VERSION}",
            artifact.format_version
        )));
    }
    Ok(artifact)
}
