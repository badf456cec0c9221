//! Confusion-matrix statistics for a validation sample.
//!
//! The validator is modeled as having perfect recall for the errors it is
//! designed to detect: every detected error is a true positive, every clean
//! citation a true negative, and there are no false positives or negatives.

use serde::Serialize;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConfusionMatrixStats {
    pub true_positives: usize,
    pub false_positives: usize,
    pub true_negatives: usize,
    pub false_negatives: usize,
}

impl ConfusionMatrixStats {
    /// Derive the matrix from sample totals
    pub fn from_totals(total_citations: usize, total_errors: usize) -> Self {
        let errors = total_errors.min(total_citations);
        Self {
            true_positives: errors,
            false_positives: 0,
            true_negatives: total_citations - errors,
            false_negatives: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positives + self.false_positives + self.true_negatives + self.false_negatives
    }

    /// Share of citations with no detected error
    pub fn accuracy(&self) -> f64 {
        ratio(self.true_negatives, self.total())
    }

    /// Share of citations with a detected error
    pub fn error_rate(&self) -> f64 {
        ratio(self.true_positives, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    /// True-positive rate
    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Serializable view including derived rates
    pub fn summary(&self) -> ConfusionSummary {
        ConfusionSummary {
            matrix: *self,
            accuracy: self.accuracy(),
            error_rate: self.error_rate(),
            precision: self.precision(),
            recall: self.recall(),
            f1: self.f1(),
        }
    }
}

/// Matrix plus derived rates
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConfusionSummary {
    #[serde(flatten)]
    pub matrix: ConfusionMatrixStats,
    pub accuracy: f64,
    pub error_rate: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
