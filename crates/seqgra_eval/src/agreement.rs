//! Agreement between attributions and ground-truth annotations.
//!
//! Every annotated position gets one of four groups from its annotation
//! symbol and whether its strongest channel reaches the relevance threshold:
//!
//! | symbol | important | group |
//! |--------|-----------|-------|
//! | `G`    | yes       | TP    |
//! | `G`    | no        | FN    |
//! | other  | yes       | FP    |
//! | other  | no        | TN    |

use std::fmt;

use ndarray::{ArrayD, Axis};
use serde::{Deserialize, Serialize};

use seqgra_core::{annotation, CoreError, LayoutNormalizer, TensorConvention};

use crate::error::Result;

/// Default relevance threshold.
pub const DEFAULT_THRESHOLD: f32 = 0.1;

/// Agreement of one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgreementGroup {
    /// Grammar position scored important.
    #[serde(rename = "TP")]
    TruePositive,
    /// Grammar position scored unimportant.
    #[serde(rename = "FN")]
    FalseNegative,
    /// Non-grammar position scored important.
    #[serde(rename = "FP")]
    FalsePositive,
    /// Non-grammar position scored unimportant.
    #[serde(rename = "TN")]
    TrueNegative,
}

impl AgreementGroup {
    /// Group of a position from its two flags.
    pub const fn from_flags(grammar: bool, important: bool) -> Self {
        match (grammar, important) {
            (true, true) => Self::TruePositive,
            (true, false) => Self::FalseNegative,
            (false, true) => Self::FalsePositive,
            (false, false) => Self::TrueNegative,
        }
    }

    /// Short name as written in agreement tables.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TruePositive => "TP",
            Self::FalseNegative => "FN",
            Self::FalsePositive => "FP",
            Self::TrueNegative => "TN",
        }
    }
}

impl fmt::Display for AgreementGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of an agreement table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementRow {
    /// 0-based example index.
    pub example: usize,
    /// 1-based position.
    pub position: usize,
    /// Agreement group.
    pub group: AgreementGroup,
    /// Label of the example.
    pub label: String,
}

/// Converts importance tensors into agreement rows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AgreementClassifier {
    threshold: f32,
}

impl Default for AgreementClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl AgreementClassifier {
    /// Create a classifier calling positions with max importance `>= threshold` important.
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    /// The relevance threshold.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify every annotated position.
    ///
    /// NaN scores are ignored when taking the per-position maximum; a position
    /// whose scores are all NaN is not important. Empty annotations produce no
    /// rows.
    ///
    /// # Arguments
    ///
    /// * `importance` - Importance tensor in `convention`, rank 3 or 4
    /// * `convention` - Axis order of `importance`
    /// * `labels` - One label string per example
    /// * `annotations` - One annotation per example, as long as the tensor width or empty
    ///
    /// # Errors
    ///
    /// - [`CoreError::InvalidShape`] when the tensor does not fit `convention`
    /// - [`CoreError::DataMismatch`] when counts or annotation lengths disagree
    pub fn classify<S: AsRef<str>>(
        &self,
        importance: &ArrayD<f32>,
        convention: TensorConvention,
        labels: &[S],
        annotations: &[S],
    ) -> Result<Vec<AgreementRow>> {
        let scores = LayoutNormalizer::channel_major(importance, convention)?;
        let (n, _, width) = scores.dim();
        if labels.len() != n || annotations.len() != n {
            return Err(CoreError::DataMismatch(format!(
                "{n} importance rows, {} labels, {} annotations",
                labels.len(),
                annotations.len()
            ))
            .into());
        }

        let mut rows = Vec::with_capacity(n * width);
        for (example, (example_scores, (annotation, label))) in scores
            .axis_iter(Axis(0))
            .zip(annotations.iter().zip(labels))
            .enumerate()
        {
            let annotation = annotation.as_ref();
            let length = annotation.chars().count();
            if length == 0 {
                continue;
            }
            if length != width {
                return Err(CoreError::DataMismatch(format!(
                    "annotation of example {example} has {length} positions, importance has {width}"
                ))
                .into());
            }

            for (p, symbol) in annotation.chars().enumerate() {
                let max = example_scores.column(p).iter().copied().fold(f32::NEG_INFINITY, f32::max);
                rows.push(AgreementRow {
                    example,
                    position: p + 1,
                    group: AgreementGroup::from_flags(annotation::is_grammar(symbol), max >= self.threshold),
                    label: label.as_ref().to_string(),
                });
            }
        }

        tracing::debug!("classified {} positions of {} examples", rows.len(), n);
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvalError;
    use ndarray::{Array3, IxDyn};

    /// `(N, W, C)` DNA importance with `scores[p]` on channel `p % 4`.
    fn channels_last(rows: &[&[f32]]) -> ArrayD<f32> {
        let width = rows[0].len();
        let mut a = Array3::<f32>::zeros((rows.len(), width, 4));
        for (e, scores) in rows.iter().enumerate() {
            for (p, s) in scores.iter().enumerate() {
                a[[e, p, p % 4]] = *s;
            }
        }
        a.into_dyn()
    }

    #[test]
    fn test_truth_table() {
        let classifier = AgreementClassifier::new(0.5);
        let importance = channels_last(&[&[0.9, 0.1, 0.9, 0.1]]);
        let rows = classifier
            .classify(&importance, TensorConvention::ChannelsLast, &["x"], &["GG__"])
            .unwrap();
        let groups: Vec<_> = rows.iter().map(|r| r.group).collect();
        assert_eq!(
            groups,
            vec![
                AgreementGroup::TruePositive,
                AgreementGroup::FalseNegative,
                AgreementGroup::FalsePositive,
                AgreementGroup::TrueNegative
            ]
        );
    }

    #[test]
    fn test_acgt_example() {
        let importance = channels_last(&[&[0.01, 0.5, 0.05, 0.02]]);
        let rows = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["c1"], &["_GG_"])
            .unwrap();
        let groups: Vec<&str> = rows.iter().map(|r| r.group.as_str()).collect();
        assert_eq!(groups, vec!["TN", "TP", "FN", "TN"]);
        assert_eq!(rows[0].example, 0);
        assert_eq!(rows.iter().map(|r| r.position).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
        assert!(rows.iter().all(|r| r.label == "c1"));
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let importance = channels_last(&[&[0.1, 0.0999]]);
        let rows = AgreementClassifier::new(0.1)
            .classify(&importance, TensorConvention::ChannelsLast, &["c"], &["GG"])
            .unwrap();
        assert_eq!(rows[0].group, AgreementGroup::TruePositive);
        assert_eq!(rows[1].group, AgreementGroup::FalseNegative);
    }

    #[test]
    fn test_max_over_channels() {
        let mut importance = ArrayD::<f32>::zeros(IxDyn(&[1, 4, 1, 2]));
        importance[[0, 0, 0, 0]] = -3.0;
        importance[[0, 3, 0, 0]] = 0.2;
        importance[[0, 1, 0, 1]] = -0.5;
        let rows = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsFirst, &["c"], &["__"])
            .unwrap();
        assert_eq!(rows[0].group, AgreementGroup::FalsePositive);
        assert_eq!(rows[1].group, AgreementGroup::TrueNegative);
    }

    #[test]
    fn test_nan_is_not_important() {
        let importance = channels_last(&[&[f32::NAN, 0.5]]);
        let mut all_nan = importance.clone();
        all_nan.fill(f32::NAN);
        let rows = AgreementClassifier::default()
            .classify(&all_nan, TensorConvention::ChannelsLast, &["c"], &["GG"])
            .unwrap();
        assert!(rows.iter().all(|r| r.group == AgreementGroup::FalseNegative));

        let rows = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["c"], &["GG"])
            .unwrap();
        assert_eq!(rows[0].group, AgreementGroup::FalseNegative);
        assert_eq!(rows[1].group, AgreementGroup::TruePositive);
    }

    #[test]
    fn test_empty_annotation_gives_no_rows() {
        let importance = channels_last(&[&[0.5, 0.5], &[0.5, 0.0]]);
        let rows = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["a", "b"], &["", "_G"])
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.example == 1));
    }

    #[test]
    fn test_background_only_gives_negatives_or_false_positives() {
        let importance = channels_last(&[&[0.5, 0.0, 0.3]]);
        let rows = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["a"], &["_C_"])
            .unwrap();
        assert!(rows
            .iter()
            .all(|r| matches!(r.group, AgreementGroup::TrueNegative | AgreementGroup::FalsePositive)));
    }

    #[test]
    fn test_annotation_length_mismatch() {
        let importance = channels_last(&[&[0.5, 0.5, 0.5]]);
        let err = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["a"], &["G_"])
            .unwrap_err();
        assert!(matches!(err, EvalError::Core(CoreError::DataMismatch(_))));
    }

    #[test]
    fn test_count_mismatch() {
        let importance = channels_last(&[&[0.5], &[0.5]]);
        let err = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["a"], &["G"])
            .unwrap_err();
        assert!(matches!(err, EvalError::Core(CoreError::DataMismatch(_))));
    }

    #[test]
    fn test_example_major_order() {
        let importance = channels_last(&[&[0.0, 0.0], &[0.0, 0.0]]);
        let rows = AgreementClassifier::default()
            .classify(&importance, TensorConvention::ChannelsLast, &["a", "b"], &["__", "__"])
            .unwrap();
        let order: Vec<(usize, usize)> = rows.iter().map(|r| (r.example, r.position)).collect();
        assert_eq!(order, vec![(0, 1), (0, 2), (1, 1), (1, 2)]);
    }
}
