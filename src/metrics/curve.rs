//! Precision-recall curves and average precision.
//!
//! Match records from threshold sweeps are folded into a
//! [`CurveAccumulator`], which can absorb any number of samples (and merge
//! with accumulators built elsewhere) before being finalized into a
//! [`CurveSet`].

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::types::{CurveStyle, EvaluationConfig, MatchRecord};

/// Precision-recall curve for one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PRCurve {
    pub label: String,
    /// Precision at each curve point.
    pub precision: Vec<f64>,
    /// Recall at each curve point.
    pub recall: Vec<f64>,
    /// Decision confidence at each curve point.
    pub confidences: Vec<f64>,
    /// Average precision across the swept IoU thresholds.
    pub ap: f64,
    /// Ground-truth count backing the curve.
    pub num_gt: usize,
}

/// Finalized per-class curves plus their mean average precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveSet {
    /// IoU thresholds the sweep ran at.
    pub iou_thresholds: Vec<f64>,
    /// Curve shape the set was built with.
    pub style: CurveStyle,
    /// Per-class curves in ascending label order. Only classes with at
    /// least one ground truth appear.
    pub curves: Vec<PRCurve>,
    /// Mean of the per-class average precisions, 0.0 when no class
    /// qualified.
    pub map: f64,
}

impl CurveSet {
    /// Curve for one class.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::ClassNotFound` if the class has no curve, which
    /// includes classes that never appeared as ground truth.
    pub fn class_curve(&self, label: &str) -> Result<&PRCurve> {
        self.curves
            .iter()
            .find(|c| c.label == label)
            .ok_or_else(|| EvalError::ClassNotFound(format!("no curve for class '{label}'")))
    }

    /// Average precision for one class, or the -1.0 sentinel when the
    /// class has no curve.
    pub fn class_ap(&self, label: &str) -> f64 {
        self.class_curve(label).map(|c| c.ap).unwrap_or(-1.0)
    }

    /// Labels with curves, in ascending order.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.curves.iter().map(|c| c.label.as_str())
    }
}

/// Per-class tallies at one IoU threshold.
#[derive(Debug, Clone, Default)]
struct ClassTally {
    true_positive_confidences: Vec<f64>,
    false_positive_confidences: Vec<f64>,
    num_gt: usize,
}

/// Streaming accumulator for sweep outputs.
///
/// One accumulator absorbs the per-threshold match records of any number
/// of samples; accumulators built over disjoint sample sets with the same
/// configuration merge associatively.
#[derive(Debug, Clone)]
pub struct CurveAccumulator {
    iou_thresholds: Vec<f64>,
    style: CurveStyle,
    /// One label-to-tally map per swept threshold.
    tallies: Vec<BTreeMap<String, ClassTally>>,
}

impl CurveAccumulator {
    /// Create an accumulator for the configured sweep.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` if the configuration fails
    /// validation.
    pub fn new(config: &EvaluationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            iou_thresholds: config.iou_thresholds.clone(),
            style: config.curve_style,
            tallies: vec![BTreeMap::new(); config.iou_thresholds.len()],
        })
    }

    /// IoU thresholds this accumulator sweeps.
    pub fn iou_thresholds(&self) -> &[f64] {
        &self.iou_thresholds
    }

    /// Fold in one sample's records, one record list per swept threshold.
    ///
    /// True-positive records count toward their class tally on both sides;
    /// cross-label matches count the ground-truth side as a miss and the
    /// prediction side as a false positive under the prediction's label.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` if the list count does not match
    /// the sweep, or `EvalError::MissingConfidence` if a prediction-side
    /// record lacks a confidence.
    pub fn add_sample(&mut self, per_threshold_records: &[Vec<MatchRecord>]) -> Result<()> {
        if per_threshold_records.len() != self.iou_thresholds.len() {
            return Err(EvalError::Configuration(format!(
                "sample has {} record lists for a sweep of {} thresholds",
                per_threshold_records.len(),
                self.iou_thresholds.len()
            )));
        }

        for (threshold_idx, records) in per_threshold_records.iter().enumerate() {
            for record in records {
                match (&record.gt_label, &record.pred_label) {
                    (Some(gt_label), Some(pred_label)) => {
                        let confidence = required_confidence(record)?;
                        self.tally(threshold_idx, gt_label).num_gt += 1;
                        if gt_label == pred_label {
                            self.tally(threshold_idx, gt_label)
                                .true_positive_confidences
                                .push(confidence);
                        } else {
                            self.tally(threshold_idx, pred_label)
                                .false_positive_confidences
                                .push(confidence);
                        }
                    }
                    (None, Some(pred_label)) => {
                        let confidence = required_confidence(record)?;
                        self.tally(threshold_idx, pred_label)
                            .false_positive_confidences
                            .push(confidence);
                    }
                    (Some(gt_label), None) => {
                        self.tally(threshold_idx, gt_label).num_gt += 1;
                    }
                    (None, None) => {}
                }
            }
        }
        Ok(())
    }

    /// Merge another accumulator built with the same configuration.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` if thresholds or curve style
    /// differ.
    pub fn merge(&mut self, other: CurveAccumulator) -> Result<()> {
        if self.iou_thresholds != other.iou_thresholds || self.style != other.style {
            return Err(EvalError::Configuration(
                "cannot merge accumulators with different sweeps".to_string(),
            ));
        }
        for (mine, theirs) in self.tallies.iter_mut().zip(other.tallies) {
            for (label, tally) in theirs {
                let target = mine.entry(label).or_default();
                target.true_positive_confidences.extend(tally.true_positive_confidences);
                target.false_positive_confidences.extend(tally.false_positive_confidences);
                target.num_gt += tally.num_gt;
            }
        }
        Ok(())
    }

    /// Finalize into per-class curves and mAP.
    ///
    /// Only classes with at least one ground truth get a curve; a class
    /// with ground truths but no predictions gets an all-zero curve and an
    /// AP of 0.0. Per-class AP averages over the swept thresholds. For the
    /// interpolated style the curve's precision is the element-wise mean
    /// across thresholds; the native style keeps the first threshold's
    /// curve points.
    pub fn finalize(&self) -> CurveSet {
        let labels: BTreeSet<&String> = self
            .tallies
            .iter()
            .flat_map(|m| m.iter().filter(|(_, t)| t.num_gt > 0).map(|(l, _)| l))
            .collect();

        let mut curves = Vec::with_capacity(labels.len());
        for label in labels {
            if let Some(curve) = self.class_curve_for(label) {
                curves.push(curve);
            }
        }

        let map = if curves.is_empty() {
            0.0
        } else {
            curves.iter().map(|c| c.ap).sum::<f64>() / curves.len() as f64
        };

        CurveSet {
            iou_thresholds: self.iou_thresholds.clone(),
            style: self.style,
            curves,
            map,
        }
    }

    fn tally(&mut self, threshold_idx: usize, label: &str) -> &mut ClassTally {
        self.tallies[threshold_idx].entry(label.to_string()).or_default()
    }

    fn class_curve_for(&self, label: &str) -> Option<PRCurve> {
        let mut aps = Vec::new();
        let mut precisions_101: Vec<Vec<f64>> = Vec::new();
        let mut confidences_101: Option<Vec<f64>> = None;
        let mut native: Option<(Vec<f64>, Vec<f64>, Vec<f64>)> = None;
        let mut num_gt = 0usize;

        for tally_map in &self.tallies {
            let Some(tally) = tally_map.get(label) else {
                continue;
            };
            if tally.num_gt == 0 {
                continue;
            }
            num_gt = num_gt.max(tally.num_gt);

            let (precision, recall, confidence) = cumulative_curve(
                &tally.true_positive_confidences,
                &tally.false_positive_confidences,
                tally.num_gt,
            );

            match self.style {
                CurveStyle::Interpolated101 => {
                    let (p101, c101) = resample_curve(&precision, &recall, &confidence);
                    aps.push(p101.iter().sum::<f64>() / p101.len() as f64);
                    if confidences_101.is_none() {
                        confidences_101 = Some(c101);
                    }
                    precisions_101.push(p101);
                }
                CurveStyle::Native => {
                    let (p, r, c) = pad_native(&precision, &recall, &confidence);
                    aps.push(average_precision(&r, &p));
                    if native.is_none() {
                        native = Some((p, r, c));
                    }
                }
            }
        }

        if aps.is_empty() {
            return None;
        }
        let ap = aps.iter().sum::<f64>() / aps.len() as f64;

        let curve = match self.style {
            CurveStyle::Interpolated101 => {
                let grid = recall_grid();
                let mut precision = vec![0.0; grid.len()];
                for p101 in &precisions_101 {
                    for (acc, &p) in precision.iter_mut().zip(p101.iter()) {
                        *acc += p;
                    }
                }
                for p in &mut precision {
                    *p /= precisions_101.len() as f64;
                }
                PRCurve {
                    label: label.to_string(),
                    precision,
                    recall: grid,
                    confidences: confidences_101.unwrap_or_default(),
                    ap,
                    num_gt,
                }
            }
            CurveStyle::Native => {
                let (precision, recall, confidences) = native.unwrap_or_default();
                PRCurve { label: label.to_string(), precision, recall, confidences, ap, num_gt }
            }
        };
        Some(curve)
    }
}

fn required_confidence(record: &MatchRecord) -> Result<f64> {
    record.confidence.ok_or_else(|| {
        EvalError::MissingConfidence(format!(
            "prediction {} has no confidence for curve accumulation",
            record.pred_id.as_deref().unwrap_or("<unknown>")
        ))
    })
}

/// The 101-point recall grid, 0.00 to 1.00.
pub fn recall_grid() -> Vec<f64> {
    (0..=100).map(|i| i as f64 / 100.0).collect()
}

/// Cumulative precision, recall and confidence arrays from one class's
/// scored predictions, sorted by confidence descending. Precision is
/// monotonized right to left.
fn cumulative_curve(
    tp_confidences: &[f64],
    fp_confidences: &[f64],
    num_gt: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    debug_assert!(num_gt > 0);

    let mut entries: Vec<(f64, bool)> = tp_confidences
        .iter()
        .map(|&c| (c, true))
        .chain(fp_confidences.iter().map(|&c| (c, false)))
        .collect();
    entries.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut precision = Vec::with_capacity(entries.len());
    let mut recall = Vec::with_capacity(entries.len());
    let mut confidence = Vec::with_capacity(entries.len());
    let mut tp = 0usize;

    for (i, &(conf, is_tp)) in entries.iter().enumerate() {
        if is_tp {
            tp += 1;
        }
        precision.push(tp as f64 / (i + 1) as f64);
        recall.push(tp as f64 / num_gt as f64);
        confidence.push(conf);
    }

    monotonize_precision(&mut precision);
    (precision, recall, confidence)
}

/// Replace each precision with the maximum precision at equal or higher
/// recall, in place.
pub fn monotonize_precision(precision: &mut [f64]) {
    for i in (0..precision.len().saturating_sub(1)).rev() {
        if precision[i] < precision[i + 1] {
            precision[i] = precision[i + 1];
        }
    }
}

/// Resample a monotonized curve onto the 101-point recall grid.
///
/// For each grid recall the precision and confidence of the first curve
/// point at or beyond that recall are taken; grid points beyond the
/// curve's final recall get zeros.
pub fn resample_curve(
    precision: &[f64],
    recall: &[f64],
    confidence: &[f64],
) -> (Vec<f64>, Vec<f64>) {
    let grid = recall_grid();
    let mut precision_out = vec![0.0; grid.len()];
    let mut confidence_out = vec![0.0; grid.len()];

    for (i, &level) in grid.iter().enumerate() {
        let idx = recall.partition_point(|&r| r < level);
        if idx < precision.len() {
            precision_out[i] = precision[idx];
            confidence_out[i] = confidence[idx];
        }
    }
    (precision_out, confidence_out)
}

/// Pad a native curve with a starting point at zero recall.
fn pad_native(
    precision: &[f64],
    recall: &[f64],
    confidence: &[f64],
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    if precision.is_empty() {
        return (vec![0.0], vec![0.0], vec![1.0]);
    }
    let mut p = Vec::with_capacity(precision.len() + 1);
    let mut r = Vec::with_capacity(recall.len() + 1);
    let mut c = Vec::with_capacity(confidence.len() + 1);
    p.push(precision[0]);
    r.push(0.0);
    c.push(confidence[0]);
    p.extend_from_slice(precision);
    r.extend_from_slice(recall);
    c.extend_from_slice(confidence);
    (p, r, c)
}

/// Step-integral average precision over a curve whose recall is
/// non-decreasing.
pub fn average_precision(recall: &[f64], precision: &[f64]) -> f64 {
    debug_assert_eq!(recall.len(), precision.len());
    let mut ap = 0.0;
    let mut prev = 0.0;
    for (&r, &p) in recall.iter().zip(precision.iter()) {
        if r > prev {
            ap += (r - prev) * p;
            prev = r;
        }
    }
    ap
}
