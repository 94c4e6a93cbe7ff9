//! Temporal overlap between closed intervals.

use crate::types::FrameInterval;

/// Calculate the temporal IoU between a prediction interval and a
/// ground-truth interval: intersection length over union length.
///
/// Zero-length intervals follow exact-position rules: two instants match
/// with 1.0 when they coincide and 0.0 otherwise, and an instant never
/// matches an interval of positive length.
///
/// For crowd ground truths the denominator is the prediction's own length.
///
/// # Arguments
///
/// * `pred` - Prediction interval
/// * `gt` - Ground-truth interval
/// * `gt_is_crowd` - Whether the ground truth is a crowd region
///
/// # Returns
///
/// IoU value between 0.0 and 1.0
pub fn interval_iou(pred: &FrameInterval, gt: &FrameInterval, gt_is_crowd: bool) -> f64 {
    if pred.is_instant() || gt.is_instant() {
        if pred.is_instant() && gt.is_instant() && pred.start == gt.start {
            return 1.0;
        }
        return 0.0;
    }

    let inter_start = pred.start.max(gt.start);
    let inter_end = pred.end.min(gt.end);
    let intersection = (inter_end - inter_start).max(0.0);

    let denominator = if gt_is_crowd {
        pred.length()
    } else {
        pred.length() + gt.length() - intersection
    };

    if denominator <= 0.0 {
        return 0.0;
    }

    intersection / denominator
}
