//! Confusion matrices over match records.
//!
//! The matrix carries one row and column per class plus a trailing
//! "missing" bucket: unmatched ground truths land in the missing column,
//! unmatched predictions in the missing row. Row sums therefore equal
//! per-class ground-truth counts and column sums equal per-class
//! prediction counts.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::types::MatchRecord;

/// Averaging strategy for summary metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Average {
    /// Pool counts over all classes before computing metrics.
    Micro,
    /// Compute metrics per class and average them unweighted.
    Macro,
}

/// Derived metrics for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassReport {
    pub label: String,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    /// Ground-truth count for the class.
    pub support: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Precision, recall and F1 aggregated over all classes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryReport {
    pub average: Average,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Square confusion matrix with a trailing missing bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    /// Row-major counts, (labels + 1) squared. Rows index ground truth,
    /// columns index predictions, the last index on each axis is the
    /// missing bucket.
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    /// Build a matrix from match records.
    ///
    /// With `classes` given, the matrix uses that label order; otherwise
    /// the labels observed in the records are used in ascending order.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` if `classes` contains
    /// duplicates, or `EvalError::ClassNotFound` if a record carries a
    /// label outside `classes`.
    ///
    /// # Example
    ///
    /// ```
    /// use spatial_eval::metrics::ConfusionMatrix;
    /// use spatial_eval::{BoundingBox, GeometricObject, Geometry, MatchRecord};
    ///
    /// let gt = GeometricObject::new("g1", "cat", Geometry::Box(BoundingBox::new(0.0, 0.0, 2.0, 2.0)));
    /// let pred = gt.clone().with_confidence(0.9);
    /// let records = vec![MatchRecord::matched(&gt, &pred, 1.0)];
    ///
    /// let matrix = ConfusionMatrix::from_records(&records, None).unwrap();
    /// assert_eq!(matrix.count(Some("cat"), Some("cat")).unwrap(), 1);
    /// ```
    pub fn from_records(records: &[MatchRecord], classes: Option<&[String]>) -> Result<Self> {
        let labels: Vec<String> = match classes {
            Some(given) => {
                let unique: BTreeSet<&String> = given.iter().collect();
                if unique.len() != given.len() {
                    return Err(EvalError::Configuration(
                        "confusion matrix class list contains duplicates".to_string(),
                    ));
                }
                given.to_vec()
            }
            None => {
                let observed: BTreeSet<&String> = records
                    .iter()
                    .flat_map(|r| r.gt_label.iter().chain(r.pred_label.iter()))
                    .collect();
                observed.into_iter().cloned().collect()
            }
        };

        let mut matrix = Self {
            counts: vec![0; (labels.len() + 1) * (labels.len() + 1)],
            labels,
        };
        for record in records {
            let row = matrix.axis_index(record.gt_label.as_deref())?;
            let col = matrix.axis_index(record.pred_label.as_deref())?;
            let side = matrix.side();
            matrix.counts[row * side + col] += 1;
        }
        Ok(matrix)
    }

    /// Class labels in matrix order, without the missing bucket.
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn num_classes(&self) -> usize {
        self.labels.len()
    }

    /// Count for one cell. `None` on either side addresses the missing
    /// bucket.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ClassNotFound` for an unknown label.
    pub fn count(&self, gt_label: Option<&str>, pred_label: Option<&str>) -> Result<usize> {
        let row = self.axis_index(gt_label)?;
        let col = self.axis_index(pred_label)?;
        Ok(self.counts[row * self.side() + col])
    }

    /// Total ground truths for one row, which equals the class's
    /// ground-truth count.
    pub fn row_sum(&self, gt_label: Option<&str>) -> Result<usize> {
        let row = self.axis_index(gt_label)?;
        let side = self.side();
        Ok(self.counts[row * side..(row + 1) * side].iter().sum())
    }

    /// Total predictions for one column, which equals the class's
    /// prediction count.
    pub fn col_sum(&self, pred_label: Option<&str>) -> Result<usize> {
        let col = self.axis_index(pred_label)?;
        let side = self.side();
        Ok((0..side).map(|row| self.counts[row * side + col]).sum())
    }

    /// Add another matrix's counts into this one.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` if the label sets differ.
    pub fn merge(&mut self, other: &ConfusionMatrix) -> Result<()> {
        if self.labels != other.labels {
            return Err(EvalError::Configuration(
                "cannot merge confusion matrices with different classes".to_string(),
            ));
        }
        for (mine, theirs) in self.counts.iter_mut().zip(other.counts.iter()) {
            *mine += theirs;
        }
        Ok(())
    }

    /// Per-class derived metrics, in matrix label order.
    ///
    /// False positives for a class count every prediction of that class
    /// that did not match a ground truth of the same class, including
    /// cross-label matches; false negatives mirror that on the
    /// ground-truth side.
    pub fn per_class(&self) -> Vec<ClassReport> {
        self.labels
            .iter()
            .enumerate()
            .map(|(idx, label)| {
                let side = self.side();
                let tp = self.counts[idx * side + idx];
                let row: usize = self.counts[idx * side..(idx + 1) * side].iter().sum();
                let col: usize = (0..side).map(|r| self.counts[r * side + idx]).sum();
                let fp = col - tp;
                let fn_ = row - tp;
                ClassReport {
                    label: label.clone(),
                    true_positives: tp,
                    false_positives: fp,
                    false_negatives: fn_,
                    support: row,
                    precision: precision_from_counts(tp, fp),
                    recall: recall_from_counts(tp, fn_),
                    f1: f1_from_counts(tp, fp, fn_),
                }
            })
            .collect()
    }

    /// Summary metrics under the chosen averaging strategy.
    pub fn summary(&self, average: Average) -> SummaryReport {
        let per_class = self.per_class();
        match average {
            Average::Micro => {
                let tp: usize = per_class.iter().map(|c| c.true_positives).sum();
                let fp: usize = per_class.iter().map(|c| c.false_positives).sum();
                let fn_: usize = per_class.iter().map(|c| c.false_negatives).sum();
                SummaryReport {
                    average,
                    precision: precision_from_counts(tp, fp),
                    recall: recall_from_counts(tp, fn_),
                    f1: f1_from_counts(tp, fp, fn_),
                }
            }
            Average::Macro => {
                let n = per_class.len().max(1) as f64;
                SummaryReport {
                    average,
                    precision: per_class.iter().map(|c| c.precision).sum::<f64>() / n,
                    recall: per_class.iter().map(|c| c.recall).sum::<f64>() / n,
                    f1: per_class.iter().map(|c| c.f1).sum::<f64>() / n,
                }
            }
        }
    }

    fn side(&self) -> usize {
        self.labels.len() + 1
    }

    fn axis_index(&self, label: Option<&str>) -> Result<usize> {
        match label {
            None => Ok(self.labels.len()),
            Some(name) => self
                .labels
                .iter()
                .position(|l| l == name)
                .ok_or_else(|| {
                    EvalError::ClassNotFound(format!("class '{name}' is not in the matrix"))
                }),
        }
    }
}

/// Precision from raw counts.
///
/// Returns 0.0 when there are no positive predictions.
#[must_use]
pub fn precision_from_counts(true_positives: usize, false_positives: usize) -> f64 {
    if true_positives + false_positives == 0 {
        return 0.0;
    }
    true_positives as f64 / (true_positives + false_positives) as f64
}

/// Recall from raw counts.
///
/// Returns 0.0 when there are no ground truths.
#[must_use]
pub fn recall_from_counts(true_positives: usize, false_negatives: usize) -> f64 {
    if true_positives + false_negatives == 0 {
        return 0.0;
    }
    true_positives as f64 / (true_positives + false_negatives) as f64
}

/// F1 score from raw counts.
#[must_use]
pub fn f1_from_counts(true_positives: usize, false_positives: usize, false_negatives: usize) -> f64 {
    let precision = precision_from_counts(true_positives, false_positives);
    let recall = recall_from_counts(true_positives, false_negatives);
    if precision + recall == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / (precision + recall)
}
