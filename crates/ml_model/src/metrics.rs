//! Binary classification metrics on hard predictions.
//!
//! Label `1` is the positive class. Ratios with a zero denominator evaluate
//! to 0.0 instead of failing.

use std::fmt;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

/// Label treated as the positive class.
pub const POSITIVE_LABEL: usize = 1;

/// Error type for metric computation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("Got {truth} true labels but {predicted} predictions")]
    LengthMismatch { truth: usize, predicted: usize },
}

/// Counts of the four outcome cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    /// Tallies outcomes; any label other than [`POSITIVE_LABEL`] is negative.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::LengthMismatch`] if the inputs differ in length.
    pub fn from_labels(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<Self, MetricsError> {
        check_lengths(y_true, y_pred)?;

        let mut matrix = Self::default();
        for (&truth, &predicted) in y_true.iter().zip(y_pred.iter()) {
            match (truth == POSITIVE_LABEL, predicted == POSITIVE_LABEL) {
                (false, false) => matrix.tn += 1,
                (false, true) => matrix.fp += 1,
                (true, false) => matrix.fn_ += 1,
                (true, true) => matrix.tp += 1,
            }
        }
        Ok(matrix)
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    #[must_use]
    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    #[must_use]
    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    #[must_use]
    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// Harmonic mean of precision and recall.
    #[must_use]
    pub fn f1(&self) -> f64 {
        ratio(2 * self.tp, 2 * self.tp + self.fp + self.fn_)
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[[tn={} fp={}] [fn={} tp={}]]",
            self.tn, self.fp, self.fn_, self.tp
        )
    }
}

/// Test-partition scores of one fitted model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the true labels hold a single class.
    pub roc_auc: Option<f64>,
    pub confusion: ConfusionMatrix,
}

impl ClassificationMetrics {
    /// Scores `y_pred` against `y_true`.
    ///
    /// ROC-AUC is computed from the hard predictions, so it equals the
    /// balanced accuracy of the positive/negative decision.
    ///
    /// # Errors
    ///
    /// Returns [`MetricsError::LengthMismatch`] if the inputs differ in length.
    pub fn evaluate(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<Self, MetricsError> {
        let confusion = ConfusionMatrix::from_labels(y_true, y_pred)?;
        let scores: Vec<f64> = y_pred
            .iter()
            .map(|&p| if p == POSITIVE_LABEL { 1.0 } else { 0.0 })
            .collect();
        let truth: Vec<usize> = y_true.to_vec();

        Ok(Self {
            accuracy: confusion.accuracy(),
            precision: confusion.precision(),
            recall: confusion.recall(),
            f1: confusion.f1(),
            roc_auc: roc_auc(&truth, &scores),
            confusion,
        })
    }
}

/// Area under the ROC curve via the Mann-Whitney U statistic.
///
/// Tied scores share their average rank. Returns `None` unless both classes
/// are present in `y_true`, or if the slices differ in length.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn roc_auc(y_true: &[usize], scores: &[f64]) -> Option<f64> {
    if y_true.len() != scores.len() {
        return None;
    }

    let n_pos = y_true.iter().filter(|&&y| y == POSITIVE_LABEL).count();
    let n_neg = y_true.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]].total_cmp(&scores[order[start]]).is_eq() {
            end += 1;
        }
        // 1-based ranks start+1..=end share their mean.
        let average = (start + 1 + end) as f64 / 2.0;
        for &index in &order[start..end] {
            ranks[index] = average;
        }
        start = end;
    }

    let positive_rank_sum: f64 = y_true
        .iter()
        .zip(&ranks)
        .filter(|(&y, _)| y == POSITIVE_LABEL)
        .map(|(_, &rank)| rank)
        .sum();

    let n_pos = n_pos as f64;
    let n_neg = n_neg as f64;
    let u = positive_rank_sum - n_pos * (n_pos + 1.0) / 2.0;
    Some(u / (n_pos * n_neg))
}

fn check_lengths(y_true: &Array1<usize>, y_pred: &Array1<usize>) -> Result<(), MetricsError> {
    if y_true.len() == y_pred.len() {
        Ok(())
    } else {
        Err(MetricsError::LengthMismatch {
            truth: y_true.len(),
            predicted: y_pred.len(),
        })
    }
}

#[allow(clippy::cast_precision_loss)]
fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
