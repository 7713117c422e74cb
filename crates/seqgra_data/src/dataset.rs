//! Dataset splits and the parallel example/label/annotation columns.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use seqgra_core::CoreError;

use crate::error::{DataError, Result};

/// One of the three data splits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSet {
    /// Training split.
    Training,
    /// Validation split.
    Validation,
    /// Test split.
    Test,
}

impl DataSet {
    /// All splits in evaluation order.
    pub const ALL: [DataSet; 3] = [DataSet::Training, DataSet::Validation, DataSet::Test];

    /// The split name used in file names.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Training => "training",
            Self::Validation => "validation",
            Self::Test => "test",
        }
    }

    /// File name of the example table, `<split>.txt`.
    pub fn examples_file(&self) -> String {
        format!("{}.txt", self.as_str())
    }

    /// File name of the annotation table, `<split>-annotation.txt`.
    pub fn annotations_file(&self) -> String {
        format!("{}-annotation.txt", self.as_str())
    }
}

impl fmt::Display for DataSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSet {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "training" | "train" => Ok(Self::Training),
            "validation" | "valid" => Ok(Self::Validation),
            "test" => Ok(Self::Test),
            other => Err(DataError::MissingSplit(format!(
                "unknown split '{other}' (expected training, validation or test)"
            ))),
        }
    }
}

/// Examples, labels and annotations of one split.
///
/// The three columns are parallel: entry `i` of each describes example `i`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitData {
    /// Raw sequences.
    pub x: Vec<String>,
    /// Raw label strings.
    pub y: Vec<String>,
    /// Annotation strings over `{_, G, C}`.
    pub annotations: Vec<String>,
}

impl SplitData {
    /// Create a split, checking that the columns are parallel.
    ///
    /// # Errors
    ///
    /// [`CoreError::DataMismatch`] when the column lengths differ.
    pub fn new(x: Vec<String>, y: Vec<String>, annotations: Vec<String>) -> Result<Self> {
        let data = Self { x, y, annotations };
        data.check_counts()?;
        Ok(data)
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Whether the split holds no examples.
    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    /// Check that examples, labels and annotations have equal counts.
    pub fn check_counts(&self) -> Result<()> {
        if self.x.len() != self.y.len() || self.x.len() != self.annotations.len() {
            return Err(CoreError::DataMismatch(format!(
                "{} examples, {} labels and {} annotations",
                self.x.len(),
                self.y.len(),
                self.annotations.len()
            ))
            .into());
        }
        Ok(())
    }
}
