//! Tab-separated example and annotation tables.
//!
//! Example tables have the header `x	y`, annotation tables `annotation	y`.
//! Empty cells are read as empty strings.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{DataError, Result};

/// One row of an example table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleRecord {
    /// Sequence.
    pub x: String,
    /// Label string.
    #[serde(default)]
    pub y: String,
}

/// One row of an annotation table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    /// Annotation over `{_, G, C}`.
    #[serde(default)]
    pub annotation: String,
    /// Label string.
    #[serde(default)]
    pub y: String,
}

fn tsv_reader(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    if !path.is_file() {
        return Err(DataError::FormatError(format!(
            "{} does not exist or is not a file",
            path.display()
        )));
    }
    Ok(csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_path(path)?)
}

fn tsv_writer(path: &Path) -> Result<csv::Writer<std::fs::File>> {
    Ok(csv::WriterBuilder::new().delimiter(b'\t').from_path(path)?)
}

/// Read an example table.
///
/// # Arguments
///
/// * `path` - Path to a `<split>.txt` file
pub fn read_examples<P: AsRef<Path>>(path: P) -> Result<Vec<ExampleRecord>> {
    let mut reader = tsv_reader(path.as_ref())?;
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<ExampleRecord>, csv::Error>>()?;
    tracing::debug!("Read {} examples from {:?}", records.len(), path.as_ref());
    Ok(records)
}

/// Read an annotation table.
///
/// # Arguments
///
/// * `path` - Path to a `<split>-annotation.txt` file
pub fn read_annotations<P: AsRef<Path>>(path: P) -> Result<Vec<AnnotationRecord>> {
    let mut reader = tsv_reader(path.as_ref())?;
    let records = reader
        .deserialize()
        .collect::<std::result::Result<Vec<AnnotationRecord>, csv::Error>>()?;
    tracing::debug!("Read {} annotations from {:?}", records.len(), path.as_ref());
    Ok(records)
}

/// Write an example table.
pub fn write_examples<P: AsRef<Path>>(path: P, records: &[ExampleRecord]) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write an annotation table.
pub fn write_annotations<P: AsRef<Path>>(path: P, records: &[AnnotationRecord]) -> Result<()> {
    let mut writer = tsv_writer(path.as_ref())?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}
