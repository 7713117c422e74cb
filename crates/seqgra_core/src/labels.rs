//! Task types and label encoding.

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};

/// Separator between labels of a multi-label example.
pub const MULTI_LABEL_SEPARATOR: char = '|';

/// The learning task a model was trained for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    /// Exactly one label per example.
    #[serde(rename = "multi-class classification")]
    MultiClass,
    /// Any number of labels per example, separated by `|`.
    #[serde(rename = "multi-label classification")]
    MultiLabel,
    /// Several independent scalar targets.
    #[serde(rename = "multiple regression")]
    MultipleRegression,
    /// One vector-valued target.
    #[serde(rename = "multivariate regression")]
    MultivariateRegression,
}

impl TaskType {
    /// Whether the task predicts categorical labels.
    pub const fn is_classification(&self) -> bool {
        matches!(self, Self::MultiClass | Self::MultiLabel)
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MultiClass => "multi-class classification",
            Self::MultiLabel => "multi-label classification",
            Self::MultipleRegression => "multiple regression",
            Self::MultivariateRegression => "multivariate regression",
        };
        f.write_str(name)
    }
}

impl FromStr for TaskType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "multi-class classification" => Ok(Self::MultiClass),
            "multi-label classification" => Ok(Self::MultiLabel),
            "multiple regression" => Ok(Self::MultipleRegression),
            "multivariate regression" => Ok(Self::MultivariateRegression),
            other => Err(CoreError::Configuration(format!("unknown task '{other}'"))),
        }
    }
}

/// Split a raw label string into its individual labels.
///
/// Multi-class labels are returned as-is; multi-label strings are split on `|`
/// and empty parts are dropped.
pub fn split_labels(raw: &str, task: TaskType) -> Vec<&str> {
    match task {
        TaskType::MultiLabel => raw
            .split(MULTI_LABEL_SEPARATOR)
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect(),
        _ => vec![raw.trim()],
    }
}

/// Encode raw label strings as an `(N, K)` indicator matrix over `labels`.
///
/// # Errors
///
/// [`CoreError::Configuration`] for regression tasks and
/// [`CoreError::DataMismatch`] for labels the model does not know.
pub fn encode_labels<S: AsRef<str>>(raw: &[S], labels: &[String], task: TaskType) -> Result<Array2<bool>> {
    if !task.is_classification() {
        return Err(CoreError::Configuration(format!(
            "labels of a {task} task cannot be encoded as classes"
        )));
    }

    let mut encoded = Array2::from_elem((raw.len(), labels.len()), false);
    for (i, example) in raw.iter().enumerate() {
        for label in split_labels(example.as_ref(), task) {
            let k = labels.iter().position(|l| l == label).ok_or_else(|| {
                CoreError::DataMismatch(format!(
                    "example {i} has label '{label}', which is not one of {labels:?}"
                ))
            })?;
            encoded[[i, k]] = true;
        }
    }
    Ok(encoded)
}
