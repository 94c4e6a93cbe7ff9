//! Gaussian keypoint similarity.

use crate::types::KeypointSet;

/// Calculate the object keypoint similarity between a predicted point set
/// and a ground-truth point set.
///
/// Points are paired by index. Each pair scores `exp(-d^2 / (2 * s^2))`
/// where `d` is the Euclidean distance and the scale `s` is the square root
/// of the ground-truth point cloud's bounding-box area; the similarity is
/// the mean over scored pairs.
///
/// Pairs whose ground-truth point is non-finite are excluded from the mean.
/// A non-finite prediction point against a finite ground-truth point takes
/// the maximum penalty distance of 1.0. When the ground-truth scale is zero
/// (a single point or fully coincident points) the kernel degenerates to
/// exact-match scoring: 1.0 at zero distance, 0.0 otherwise.
///
/// # Arguments
///
/// * `pred` - Predicted keypoint set
/// * `gt` - Ground-truth keypoint set
///
/// # Returns
///
/// Similarity between 0.0 and 1.0; 0.0 when no pair could be scored
pub fn keypoint_similarity(pred: &KeypointSet, gt: &KeypointSet) -> f64 {
    let denom = 2.0 * bounding_box_area(&gt.points);

    let mut total = 0.0;
    let mut scored = 0usize;
    for (p, g) in pred.points.iter().zip(gt.points.iter()) {
        if !g.0.is_finite() || !g.1.is_finite() {
            continue;
        }
        scored += 1;
        // A non-finite predicted point takes the maximum penalty distance
        let dist_sq = if !p.0.is_finite() || !p.1.is_finite() {
            1.0
        } else {
            let dx = p.0 - g.0;
            let dy = p.1 - g.1;
            dx * dx + dy * dy
        };
        total += if denom > 0.0 {
            (-dist_sq / denom).exp()
        } else if dist_sq == 0.0 {
            1.0
        } else {
            0.0
        };
    }

    if scored == 0 {
        return 0.0;
    }
    (total / scored as f64).clamp(0.0, 1.0)
}

/// Bounding-box area of the finite points in a cloud, 0.0 when fewer than
/// one finite point exists.
fn bounding_box_area(points: &[(f64, f64)]) -> f64 {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut any = false;

    for &(x, y) in points {
        if !x.is_finite() || !y.is_finite() {
            continue;
        }
        any = true;
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    if !any {
        return 0.0;
    }
    (max_x - min_x) * (max_y - min_y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(coords: &[(f64, f64)]) -> KeypointSet {
        KeypointSet::new(coords.to_vec())
    }

    #[test]
    fn test_identical_point_sets() {
        let kps = points(&[(0.1, 0.1), (0.5, 0.2), (0.3, 0.8)]);
        assert!((keypoint_similarity(&kps, &kps) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_similarity_decays_with_distance() {
        let gt = points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let near = points(&[(0.05, 0.0), (1.0, 0.05), (1.0, 1.0), (0.0, 1.0)]);
        let far = points(&[(0.5, 0.0), (1.0, 0.5), (1.0, 1.0), (0.0, 1.0)]);

        let s_near = keypoint_similarity(&near, &gt);
        let s_far = keypoint_similarity(&far, &gt);
        assert!(s_near > s_far);
        assert!(s_near > 0.9 && s_near < 1.0);
        assert!(s_far > 0.0);
    }

    #[test]
    fn test_non_finite_gt_point_excluded() {
        let gt = points(&[(0.0, 0.0), (f64::NAN, 0.5), (1.0, 1.0)]);
        let pred = points(&[(0.0, 0.0), (0.9, 0.9), (1.0, 1.0)]);
        // The NaN pair is skipped entirely, the rest match exactly
        assert!((keypoint_similarity(&pred, &gt) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_finite_pred_point_penalized() {
        let gt = points(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let pred = points(&[(0.0, 0.0), (f64::NAN, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        // Three exact pairs plus one pair at the penalty distance: the unit
        // square has bounding-box area 1, so the penalized pair scores
        // exp(-1 / 2).
        let expected = (3.0 + (-0.5f64).exp()) / 4.0;
        assert!((keypoint_similarity(&pred, &gt) - expected).abs() < 1e-9);
    }

    #[test]
    fn test_zero_scale_exact_match() {
        let gt = points(&[(0.5, 0.5), (0.5, 0.5)]);
        let exact = points(&[(0.5, 0.5), (0.5, 0.5)]);
        let offset = points(&[(0.5, 0.5), (0.6, 0.5)]);
        assert_eq!(keypoint_similarity(&exact, &gt), 1.0);
        assert_eq!(keypoint_similarity(&offset, &gt), 0.5);
    }

    #[test]
    fn test_empty_sets() {
        let empty = points(&[]);
        let some = points(&[(0.1, 0.1)]);
        assert_eq!(keypoint_similarity(&empty, &empty), 0.0);
        assert_eq!(keypoint_similarity(&empty, &some), 0.0);
        assert_eq!(keypoint_similarity(&some, &empty), 0.0);
    }

    #[test]
    fn test_scale_invariance() {
        let gt = points(&[(0.0, 0.0), (2.0, 0.0), (2.0, 2.0)]);
        let pred = points(&[(0.1, 0.0), (2.0, 0.1), (1.9, 2.0)]);
        let gt_scaled = points(&[(0.0, 0.0), (20.0, 0.0), (20.0, 20.0)]);
        let pred_scaled = points(&[(1.0, 0.0), (20.0, 1.0), (19.0, 20.0)]);

        let a = keypoint_similarity(&pred, &gt);
        let b = keypoint_similarity(&pred_scaled, &gt_scaled);
        assert!((a - b).abs() < 1e-9);
    }
}
