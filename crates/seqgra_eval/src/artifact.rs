//! Evaluator output files.
//!
//! Artifacts are first written next to their destination with a `.part`
//! suffix and only renamed once every artifact of a split has been written.
//! Staged files that were never committed are removed when the
//! [`StagedArtifacts`] is dropped.

use std::fs;
use std::path::{Path, PathBuf};

use ndarray::ArrayD;

use crate::agreement::AgreementRow;
use crate::error::{EvalError, Result};

/// Suffix of staged files.
const STAGING_SUFFIX: &str = "part";

/// Header of agreement tables.
pub const AGREEMENT_HEADER: [&str; 4] = ["example", "position", "group", "label"];

/// Artifacts written but not yet moved into place.
#[derive(Debug, Default)]
pub struct StagedArtifacts {
    staged: Vec<(PathBuf, PathBuf)>,
}

impl StagedArtifacts {
    /// Create an empty staging area.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the raw importance tensor as `.npy`.
    pub fn write_importance(&mut self, path: impl AsRef<Path>, importance: &ArrayD<f32>) -> Result<()> {
        let staging = self.stage(path.as_ref());
        ndarray_npy::write_npy(&staging, importance).map_err(|e| EvalError::Npy(e.to_string()))
    }

    /// Stage an agreement table.
    pub fn write_agreement(&mut self, path: impl AsRef<Path>, rows: &[AgreementRow]) -> Result<()> {
        let staging = self.stage(path.as_ref());
        write_agreement_table(&staging, rows)
    }

    /// Move every staged file to its destination.
    ///
    /// When a rename fails, the destinations already written by this call are
    /// removed again.
    pub fn commit(mut self) -> Result<Vec<PathBuf>> {
        let staged = std::mem::take(&mut self.staged);
        let mut committed = Vec::with_capacity(staged.len());
        for (i, (staging, destination)) in staged.iter().enumerate() {
            if let Err(e) = fs::rename(staging, destination) {
                for (remaining, _) in &staged[i..] {
                    let _ = fs::remove_file(remaining);
                }
                for path in &committed {
                    let _ = fs::remove_file(path);
                }
                return Err(e.into());
            }
            committed.push(destination.clone());
        }
        Ok(committed)
    }

    fn stage(&mut self, destination: &Path) -> PathBuf {
        let mut name = destination.as_os_str().to_owned();
        name.push(".");
        name.push(STAGING_SUFFIX);
        let staging = PathBuf::from(name);
        self.staged.push((staging.clone(), destination.to_path_buf()));
        staging
    }
}

impl Drop for StagedArtifacts {
    fn drop(&mut self) {
        for (staging, _) in &self.staged {
            if staging.exists() {
                tracing::debug!("Removing staged artifact {:?}", staging);
                let _ = fs::remove_file(staging);
            }
        }
    }
}

/// Write agreement rows as a tab-delimited table with a header.
pub fn write_agreement_table(path: impl AsRef<Path>, rows: &[AgreementRow]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(AGREEMENT_HEADER)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;
    Ok(())
}

/// Read an agreement table written by [`write_agreement_table`].
pub fn read_agreement_table(path: impl AsRef<Path>) -> Result<Vec<AgreementRow>> {
    let mut reader = csv::ReaderBuilder::new().delimiter(b'\t').from_path(path)?;
    reader
        .deserialize()
        .map(|row| row.map_err(EvalError::from))
        .collect()
}
