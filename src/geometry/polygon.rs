//! Polygon region repair and overlap.

use geo::{Area, BooleanOps, LineString, MultiPolygon, Polygon};

use crate::error::{EvalError, Result};
use crate::types::PolygonShape;

/// Build a clean region from a polygon shape.
///
/// Rings with fewer than 3 vertices are dropped as degenerate.
/// Self-intersecting rings are repaired with a union-with-self pass, and
/// all rings are unioned into a single region, so mutually overlapping
/// rings do not double-count area.
///
/// # Errors
///
/// Returns `EvalError::Geometry` if any coordinate is non-finite.
pub fn build_region(shape: &PolygonShape) -> Result<MultiPolygon<f64>> {
    let mut region: MultiPolygon<f64> = MultiPolygon::new(vec![]);

    for ring in &shape.rings {
        for &(x, y) in ring {
            if !x.is_finite() || !y.is_finite() {
                return Err(EvalError::Geometry(
                    "polygon ring contains a non-finite coordinate".to_string(),
                ));
            }
        }
        if ring.len() < 3 {
            continue;
        }

        let polygon = Polygon::new(LineString::from(ring.clone()), vec![]);
        let single = MultiPolygon::new(vec![polygon]);
        // Union with itself resolves self-intersections
        let cleaned = single.union(&single);
        region = region.union(&cleaned);
    }

    Ok(region)
}

/// Area of a repaired region.
pub fn region_area(region: &MultiPolygon<f64>) -> f64 {
    region.unsigned_area()
}

/// Calculate the IoU between two repaired polygon regions: boolean
/// intersection area over union area.
///
/// For crowd ground truths the denominator is the prediction region's own
/// area. Regions with zero area yield 0.0.
///
/// # Arguments
///
/// * `pred` - Prediction region
/// * `gt` - Ground-truth region
/// * `gt_is_crowd` - Whether the ground truth is a crowd region
///
/// # Returns
///
/// IoU value between 0.0 and 1.0
pub fn polygon_iou(pred: &MultiPolygon<f64>, gt: &MultiPolygon<f64>, gt_is_crowd: bool) -> f64 {
    let pred_area = pred.unsigned_area();
    let gt_area = gt.unsigned_area();
    if pred_area <= 0.0 || gt_area <= 0.0 {
        return 0.0;
    }

    let intersection = pred.intersection(gt).unsigned_area();
    let denominator = if gt_is_crowd {
        pred_area
    } else {
        pred_area + gt_area - intersection
    };

    if denominator <= 0.0 {
        return 0.0;
    }

    (intersection / denominator).clamp(0.0, 1.0)
}
