//! Data access for evaluators.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::dataset::{DataSet, SplitData};
use crate::error::{DataError, Result};
use crate::io::{read_annotations, read_examples};
use crate::validation::{check_annotations, DataValidation};

/// Something that can hand out the examples of a split.
pub trait ExampleSource {
    /// Load examples, labels and annotations of `set`.
    fn load_split(&self, set: DataSet) -> Result<SplitData>;
}

/// A directory holding `<split>.txt` and `<split>-annotation.txt` tables.
///
/// Annotations are always checked (warnings only). Sequences and labels are
/// checked when a [`DataValidation`] is set.
#[derive(Debug, Clone)]
pub struct DataDirectory {
    root: PathBuf,
    validation: Option<DataValidation>,
}

impl DataDirectory {
    /// Create a source rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            validation: None,
        }
    }

    /// Check sequences and labels of every loaded split.
    #[must_use]
    pub fn with_validation(mut self, validation: DataValidation) -> Self {
        self.validation = Some(validation);
        self
    }

    /// The directory this source reads from.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Splits that have an example table in the directory.
    pub fn available_splits(&self) -> Vec<DataSet> {
        DataSet::ALL
            .into_iter()
            .filter(|set| self.root.join(set.examples_file()).is_file())
            .collect()
    }
}

impl ExampleSource for DataDirectory {
    fn load_split(&self, set: DataSet) -> Result<SplitData> {
        let examples_path = self.root.join(set.examples_file());
        if !examples_path.is_file() {
            return Err(DataError::MissingSplit(format!(
                "no {} examples at {}",
                set,
                examples_path.display()
            )));
        }
        let examples = read_examples(&examples_path)?;
        let annotations = read_annotations(self.root.join(set.annotations_file()))?;

        let (x, y): (Vec<String>, Vec<String>) = examples.into_iter().map(|r| (r.x, r.y)).unzip();
        let annotations: Vec<String> = annotations.into_iter().map(|r| r.annotation).collect();

        if let Some(validation) = &self.validation {
            validation.check(&x, &y)?;
        }
        check_annotations(&annotations);
        tracing::info!("Loaded {} {} examples from {:?}", x.len(), set, self.root);
        SplitData::new(x, y, annotations)
    }
}

/// Splits held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    splits: HashMap<DataSet, SplitData>,
}

impl InMemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a split.
    #[must_use]
    pub fn with_split(mut self, set: DataSet, data: SplitData) -> Self {
        self.splits.insert(set, data);
        self
    }
}

impl ExampleSource for InMemorySource {
    fn load_split(&self, set: DataSet) -> Result<SplitData> {
        let data = self
            .splits
            .get(&set)
            .cloned()
            .ok_or_else(|| DataError::MissingSplit(set.to_string()))?;
        data.check_counts()?;
        check_annotations(&data.annotations);
        Ok(data)
    }
}
