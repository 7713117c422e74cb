//! Upstream checks on examples, labels and annotations.
//!
//! Sequence symbols are always fatal. Annotation symbols only produce
//! warnings. Labels are fatal or warnings depending on the caller.

use seqgra_core::{annotation, split_labels, ModelMetadata, SequenceSpace, TaskType};

use crate::error::{DataError, Result};

/// Checks a source runs on every split it loads.
#[derive(Debug, Clone, PartialEq)]
pub struct DataValidation {
    /// Alphabet the sequences must use.
    pub space: SequenceSpace,
    /// Labels the model knows.
    pub labels: Vec<String>,
    /// Task type, controls multi-label splitting.
    pub task: TaskType,
    /// Fail instead of warn on unknown labels.
    pub throw_exception: bool,
}

impl DataValidation {
    /// Validate against `labels`, failing on unknown labels.
    pub fn new(space: SequenceSpace, labels: Vec<String>, task: TaskType) -> Self {
        Self {
            space,
            labels,
            task,
            throw_exception: true,
        }
    }

    /// Validate against the alphabet, labels and task of a model.
    pub fn for_model(metadata: &ModelMetadata) -> Self {
        Self::new(metadata.sequence_space, metadata.labels.clone(), metadata.task)
    }

    /// Fail (`true`) or warn (`false`) on unknown labels.
    #[must_use]
    pub fn with_throw_exception(mut self, throw_exception: bool) -> Self {
        self.throw_exception = throw_exception;
        self
    }

    /// Check sequences and labels of a split.
    ///
    /// # Errors
    ///
    /// [`DataError::FormatError`] for a symbol outside the alphabet, and
    /// [`DataError::InvalidLabels`] for unknown labels when `throw_exception`
    /// is set.
    pub fn check<S: AsRef<str>>(&self, x: &[S], y: &[S]) -> Result<()> {
        check_sequences(x, self.space)?;
        check_labels(y, &self.labels, self.task, self.throw_exception)?;
        Ok(())
    }
}

/// Check every sequence against the alphabet.
pub fn check_sequences<S: AsRef<str>>(sequences: &[S], space: SequenceSpace) -> Result<()> {
    for (i, sequence) in sequences.iter().enumerate() {
        space
            .check_sequence(sequence.as_ref())
            .map_err(|e| DataError::FormatError(format!("example {i}: {e}")))?;
    }
    Ok(())
}

/// Check annotations for symbols outside `{_, G, C}`.
///
/// Returns `true` when every annotation is valid; invalid ones are logged.
pub fn check_annotations<S: AsRef<str>>(annotations: &[S]) -> bool {
    let mut valid = true;
    for (i, a) in annotations.iter().enumerate() {
        if let Some((position, symbol)) = annotation::find_invalid_symbol(a.as_ref()) {
            tracing::warn!(
                "annotation {} contains invalid symbol '{}' at position {}",
                i,
                symbol,
                position + 1
            );
            valid = false;
        }
    }
    valid
}

/// Check that every label is one the model knows.
///
/// # Arguments
///
/// * `y` - Raw label strings
/// * `labels` - Labels of the model
/// * `task` - Task type, controls multi-label splitting
/// * `throw_exception` - Fail instead of warn on unknown labels
///
/// # Returns
///
/// `true` when all labels are known.
pub fn check_labels<S: AsRef<str>>(
    y: &[S],
    labels: &[String],
    task: TaskType,
    throw_exception: bool,
) -> Result<bool> {
    if !task.is_classification() {
        return Ok(true);
    }

    let mut unknown: Vec<String> = y
        .iter()
        .flat_map(|raw| split_labels(raw.as_ref(), task))
        .filter(|label| !labels.iter().any(|l| l.as_str() == *label))
        .map(str::to_string)
        .collect();
    unknown.sort();
    unknown.dedup();

    if unknown.is_empty() {
        return Ok(true);
    }

    let message = format!("labels {unknown:?} are not among the model labels {labels:?}");
    if throw_exception {
        Err(DataError::InvalidLabels(message))
    } else {
        tracing::warn!("{}", message);
        Ok(false)
    }
}
