//! Aggregate metrics over agreement rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::agreement::{AgreementGroup, AgreementRow};

/// TP/FN/FP/TN counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementCounts {
    /// Grammar positions scored important.
    pub true_positives: usize,
    /// Grammar positions scored unimportant.
    pub false_negatives: usize,
    /// Non-grammar positions scored important.
    pub false_positives: usize,
    /// Non-grammar positions scored unimportant.
    pub true_negatives: usize,
}

impl AgreementCounts {
    /// Count one position.
    pub fn add(&mut self, group: AgreementGroup) {
        match group {
            AgreementGroup::TruePositive => self.true_positives += 1,
            AgreementGroup::FalseNegative => self.false_negatives += 1,
            AgreementGroup::FalsePositive => self.false_positives += 1,
            AgreementGroup::TrueNegative => self.true_negatives += 1,
        }
    }

    /// Number of counted positions.
    pub fn total(&self) -> usize {
        self.true_positives + self.false_negatives + self.false_positives + self.true_negatives
    }

    /// TP / (TP + FP).
    pub fn precision(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// TP / (TP + FN), also called sensitivity.
    pub fn recall(&self) -> f32 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    /// TN / (TN + FP).
    pub fn specificity(&self) -> f32 {
        ratio(self.true_negatives, self.true_negatives + self.false_positives)
    }

    /// Harmonic mean of precision and recall.
    pub fn f1(&self) -> f32 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// (TP + TN) / total.
    pub fn accuracy(&self) -> f32 {
        ratio(self.true_positives + self.true_negatives, self.total())
    }
}

fn ratio(numerator: usize, denominator: usize) -> f32 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f32 / denominator as f32
    }
}

/// Agreement counts overall and per example label.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgreementSummary {
    /// All positions.
    pub overall: AgreementCounts,
    /// Positions of examples with each label.
    pub per_label: BTreeMap<String, AgreementCounts>,
}

impl AgreementSummary {
    /// Summarize agreement rows.
    pub fn from_rows(rows: &[AgreementRow]) -> Self {
        let mut summary = Self::default();
        for row in rows {
            summary.overall.add(row.group);
            summary.per_label.entry(row.label.clone()).or_default().add(row.group);
        }
        summary
    }

    /// Get a text representation.
    pub fn to_string_table(&self) -> String {
        let mut s = String::new();
        s.push_str(&format!(
            "{:>12} {:>9} {:>9} {:>11} {:>9} {:>9} {:>9}\n",
            "label", "precision", "recall", "specificity", "f1", "accuracy", "positions"
        ));
        for (label, counts) in &self.per_label {
            s.push_str(&table_row(label, counts));
        }
        s.push_str(&table_row("overall", &self.overall));
        s
    }
}

fn table_row(name: &str, counts: &AgreementCounts) -> String {
    format!(
        "{:>12} {:>9.3} {:>9.3} {:>11.3} {:>9.3} {:>9.3} {:>9}\n",
        name.chars().take(12).collect::<String>(),
        counts.precision(),
        counts.recall(),
        counts.specificity(),
        counts.f1(),
        counts.accuracy(),
        counts.total()
    )
}
