//! Axis-aligned box overlap.

use crate::types::BoundingBox;

/// Calculate the Intersection over Union (IoU) between a prediction box and
/// a ground-truth box.
///
/// For crowd ground truths the denominator is the prediction's own area
/// instead of the union, so a prediction fully inside a crowd region scores
/// 1.0 regardless of the crowd's extent.
///
/// Degenerate boxes with a non-positive denominator yield 0.0.
///
/// # Arguments
///
/// * `pred` - Prediction bounding box
/// * `gt` - Ground-truth bounding box
/// * `gt_is_crowd` - Whether the ground truth is a crowd region
///
/// # Returns
///
/// IoU value between 0.0 and 1.0
///
/// # Examples
///
/// ```
/// use spatial_eval::types::BoundingBox;
/// use spatial_eval::geometry::box_iou;
///
/// let pred = BoundingBox::new(0.1, 0.1, 0.4, 0.4);
/// let gt = BoundingBox::new(0.1, 0.1, 0.4, 0.4);
/// assert!((box_iou(&pred, &gt, false) - 1.0).abs() < 1e-9);
/// ```
pub fn box_iou(pred: &BoundingBox, gt: &BoundingBox, gt_is_crowd: bool) -> f64 {
    let x_left = pred.x.max(gt.x);
    let y_top = pred.y.max(gt.y);
    let x_right = pred.right().min(gt.right());
    let y_bottom = pred.bottom().min(gt.bottom());

    if x_right < x_left || y_bottom < y_top {
        return 0.0;
    }

    let intersection_area = (x_right - x_left) * (y_bottom - y_top);
    let denominator = if gt_is_crowd {
        pred.area()
    } else {
        pred.area() + gt.area() - intersection_area
    };

    if denominator <= 0.0 {
        return 0.0;
    }

    intersection_area / denominator
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_boxes() {
        let bbox = BoundingBox::new(0.1, 0.1, 0.3, 0.3);
        assert!((box_iou(&bbox, &bbox, false) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_boxes() {
        let pred = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let gt = BoundingBox::new(0.5, 0.5, 0.2, 0.2);
        assert_eq!(box_iou(&pred, &gt, false), 0.0);
    }

    #[test]
    fn test_touching_boxes() {
        let pred = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let gt = BoundingBox::new(0.2, 0.0, 0.2, 0.2);
        assert_eq!(box_iou(&pred, &gt, false), 0.0);
    }

    #[test]
    fn test_half_overlap() {
        let pred = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let gt = BoundingBox::new(0.1, 0.0, 0.2, 0.2);
        // intersection 0.1x0.2, union 0.04 + 0.04 - 0.02
        assert!((box_iou(&pred, &gt, false) - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_area_box() {
        let pred = BoundingBox::new(0.1, 0.1, 0.0, 0.2);
        let gt = BoundingBox::new(0.0, 0.0, 0.4, 0.4);
        assert_eq!(box_iou(&pred, &gt, false), 0.0);
        assert_eq!(box_iou(&gt, &pred, false), 0.0);
    }

    #[test]
    fn test_crowd_containment() {
        // Prediction fully inside a large crowd region
        let pred = BoundingBox::new(0.4, 0.4, 0.1, 0.1);
        let crowd = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        assert!((box_iou(&pred, &crowd, true) - 1.0).abs() < 1e-9);
        // Same pair without the crowd flag scores far below 1.0
        assert!(box_iou(&pred, &crowd, false) < 0.05);
    }

    #[test]
    fn test_crowd_partial_overlap() {
        let pred = BoundingBox::new(0.0, 0.0, 0.2, 0.2);
        let crowd = BoundingBox::new(0.1, 0.0, 0.4, 0.4);
        // intersection 0.1x0.2 = 0.02, denominator pred area 0.04
        assert!((box_iou(&pred, &crowd, true) - 0.5).abs() < 1e-9);
    }
}
