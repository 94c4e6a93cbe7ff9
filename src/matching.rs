//! Greedy matching of predictions to ground truths.

use std::collections::BTreeMap;

use crate::types::{EvaluationConfig, GeometricObject, MatchPolicy, MatchRecord};

/// Per-ground-truth scratch state for one matching pass. Inputs stay
/// immutable; all bookkeeping lives here.
#[derive(Debug, Clone, Default)]
struct MatchState {
    /// Position of the first prediction to claim this ground truth.
    claimed_by: Option<usize>,
}

impl MatchState {
    fn is_claimed(&self) -> bool {
        self.claimed_by.is_some()
    }
}

/// Match predictions to ground truths at one IoU threshold.
///
/// Uses greedy matching: within each label group (or one global group when
/// `classwise` is off), predictions are visited in descending confidence
/// order (missing confidence sorts as -1.0) and each takes the highest-IoU
/// unclaimed non-crowd candidate at or above the threshold. Crowd ground
/// truths only absorb a prediction when none of its non-crowd candidates
/// qualify; they stay available forever, and only their first match marks
/// them claimed. Under
/// [`MatchPolicy::OpenImagesStrict`], a prediction whose chosen candidate
/// is outscored by an already-claimed non-crowd ground truth matches
/// nothing.
///
/// Every prediction emits exactly one record, and every ground truth left
/// unclaimed emits a false-negative record after its group's predictions.
/// Output order is deterministic: groups in ascending label order,
/// predictions by descending confidence within each group.
///
/// # Arguments
///
/// * `ground_truths` - Ground-truth objects
/// * `predictions` - Prediction objects
/// * `candidates` - Per-prediction candidate lists from
///   [`crate::similarity::compute_candidates`]
/// * `iou_threshold` - Minimum IoU for a pair to match
/// * `config` - Evaluation configuration
///
/// # Returns
///
/// One [`MatchRecord`] per prediction plus one per unclaimed ground truth.
pub fn match_candidates(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    candidates: &[Vec<(usize, f64)>],
    iou_threshold: f64,
    config: &EvaluationConfig,
) -> Vec<MatchRecord> {
    debug_assert_eq!(candidates.len(), predictions.len());

    let groups: Vec<(Vec<usize>, Vec<usize>)> = if config.classwise {
        let mut by_label: BTreeMap<&str, (Vec<usize>, Vec<usize>)> = BTreeMap::new();
        for (pos, gt) in ground_truths.iter().enumerate() {
            by_label.entry(gt.label.as_str()).or_default().0.push(pos);
        }
        for (pos, pred) in predictions.iter().enumerate() {
            by_label.entry(pred.label.as_str()).or_default().1.push(pos);
        }
        by_label.into_values().collect()
    } else {
        vec![(
            (0..ground_truths.len()).collect(),
            (0..predictions.len()).collect(),
        )]
    };

    let mut states: Vec<MatchState> = vec![MatchState::default(); ground_truths.len()];
    let mut records = Vec::with_capacity(predictions.len() + ground_truths.len());

    for (gt_positions, pred_positions) in groups {
        // Visit predictions by confidence, descending; stable on ties
        let mut order = pred_positions;
        order.sort_by(|&a, &b| {
            predictions[b]
                .confidence
                .unwrap_or(-1.0)
                .partial_cmp(&predictions[a].confidence.unwrap_or(-1.0))
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        for &pred_pos in &order {
            let pred = &predictions[pred_pos];

            // Non-crowd candidates take priority; a crowd only absorbs a
            // prediction when no non-crowd candidate qualifies.
            let mut best_plain: Option<(usize, f64)> = None;
            let mut best_crowd: Option<(usize, f64)> = None;
            let mut highest_claimed_iou = 0.0;

            for &(gt_pos, iou) in &candidates[pred_pos] {
                if iou < iou_threshold {
                    continue;
                }
                let gt = &ground_truths[gt_pos];
                if config.classwise && gt.label != pred.label {
                    continue;
                }
                if (config.crowd_predicate)(gt) {
                    if best_crowd.map_or(true, |(_, best)| iou > best) {
                        best_crowd = Some((gt_pos, iou));
                    }
                    continue;
                }
                if states[gt_pos].is_claimed() {
                    if iou > highest_claimed_iou {
                        highest_claimed_iou = iou;
                    }
                    continue;
                }
                if best_plain.map_or(true, |(_, best)| iou > best) {
                    best_plain = Some((gt_pos, iou));
                }
            }

            let mut best = best_plain.or(best_crowd);
            if config.match_policy == MatchPolicy::OpenImagesStrict {
                if let Some((_, iou)) = best {
                    if highest_claimed_iou > iou {
                        best = None;
                    }
                }
            }

            match best {
                Some((gt_pos, iou)) => {
                    let gt = &ground_truths[gt_pos];
                    let state = &mut states[gt_pos];
                    if state.claimed_by.is_none() {
                        state.claimed_by = Some(pred_pos);
                    }
                    records.push(MatchRecord::matched(gt, pred, iou));
                }
                None => records.push(MatchRecord::unmatched_prediction(pred)),
            }
        }

        for &gt_pos in &gt_positions {
            if !states[gt_pos].is_claimed() {
                records.push(MatchRecord::unmatched_ground_truth(&ground_truths[gt_pos]));
            }
        }
    }

    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Geometry};

    fn object(id: &str, label: &str) -> GeometricObject {
        GeometricObject::new(id, label, Geometry::Box(BoundingBox::new(0.0, 0.0, 0.1, 0.1)))
    }

    fn prediction(id: &str, label: &str, confidence: f64) -> GeometricObject {
        object(id, label).with_confidence(confidence)
    }

    #[test]
    fn test_perfect_match() {
        let gts = vec![object("g0", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9)];
        let candidates = vec![vec![(0, 1.0)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_true_positive());
        assert_eq!(records[0].iou, Some(1.0));
    }

    #[test]
    fn test_sub_threshold_candidate_ignored() {
        let gts = vec![object("g0", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9)];
        let candidates = vec![vec![(0, 0.3)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pred_id.as_deref(), Some("p0"));
        assert!(records[0].gt_id.is_none());
        assert_eq!(records[1].gt_id.as_deref(), Some("g0"));
        assert!(records[1].pred_id.is_none());
    }

    #[test]
    fn test_higher_confidence_claims_first() {
        let gts = vec![object("g0", "cat")];
        let preds = vec![prediction("p0", "cat", 0.5), prediction("p1", "cat", 0.9)];
        // The lower-confidence prediction has the better IoU
        let candidates = vec![vec![(0, 0.95)], vec![(0, 0.8)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        // p1 is visited first and claims the ground truth at its own IoU
        assert_eq!(records[0].pred_id.as_deref(), Some("p1"));
        assert_eq!(records[0].iou, Some(0.8));
        assert!(records[0].is_true_positive());
        // p0 is left unmatched
        assert_eq!(records[1].pred_id.as_deref(), Some("p0"));
        assert!(!records[1].is_match());
    }

    #[test]
    fn test_prediction_takes_highest_iou_candidate() {
        let gts = vec![object("g0", "cat"), object("g1", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9)];
        let candidates = vec![vec![(0, 0.6), (1, 0.85)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        assert_eq!(records[0].gt_id.as_deref(), Some("g1"));
        assert_eq!(records[0].iou, Some(0.85));
    }

    #[test]
    fn test_standard_policy_falls_through_to_lower_iou() {
        let gts = vec![object("g0", "cat"), object("g1", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9), prediction("p1", "cat", 0.8)];
        let candidates = vec![vec![(0, 0.9)], vec![(0, 0.9), (1, 0.6)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        assert_eq!(records[0].gt_id.as_deref(), Some("g0"));
        // g0 is claimed, so p1 falls through to g1 despite the lower IoU
        assert_eq!(records[1].gt_id.as_deref(), Some("g1"));
        assert_eq!(records[1].iou, Some(0.6));
    }

    #[test]
    fn test_open_images_policy_blocks_fallthrough() {
        let gts = vec![object("g0", "cat"), object("g1", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9), prediction("p1", "cat", 0.8)];
        let candidates = vec![vec![(0, 0.9)], vec![(0, 0.9), (1, 0.6)]];

        let config = EvaluationConfig {
            match_policy: MatchPolicy::OpenImagesStrict,
            ..Default::default()
        };
        let records = match_candidates(&gts, &preds, &candidates, 0.5, &config);
        assert_eq!(records[0].gt_id.as_deref(), Some("g0"));
        // The claimed g0 outscores g1, so p1 is barred from matching at all
        assert!(!records[1].is_match());
        assert_eq!(records[1].pred_id.as_deref(), Some("p1"));
        // g1 goes unmatched
        let fn_record = records.iter().find(|r| r.gt_id.as_deref() == Some("g1")).unwrap();
        assert!(fn_record.pred_id.is_none());
    }

    #[test]
    fn test_crowd_absorbs_multiple_predictions() {
        let gts = vec![object("g0", "cat").with_crowd(true)];
        let preds = vec![
            prediction("p0", "cat", 0.9),
            prediction("p1", "cat", 0.8),
            prediction("p2", "cat", 0.7),
        ];
        let candidates = vec![vec![(0, 0.9)], vec![(0, 0.85)], vec![(0, 0.8)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        // All three predictions match, and the crowd emits no false negative
        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|r| r.is_true_positive()));
    }

    #[test]
    fn test_non_crowd_preferred_over_higher_iou_crowd() {
        let gts = vec![object("g0", "cat").with_crowd(true), object("g1", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9)];
        // The crowd candidate has the better IoU
        let candidates = vec![vec![(0, 0.95), (1, 0.6)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        assert_eq!(records[0].gt_id.as_deref(), Some("g1"));
        assert_eq!(records[0].iou, Some(0.6));
        // The passed-over crowd counts as a miss
        let crowd = records.iter().find(|r| r.gt_id.as_deref() == Some("g0")).unwrap();
        assert!(crowd.pred_id.is_none());
    }

    #[test]
    fn test_claimed_crowd_does_not_block_open_images() {
        let gts = vec![object("g0", "cat").with_crowd(true), object("g1", "cat")];
        let preds = vec![prediction("p0", "cat", 0.9), prediction("p1", "cat", 0.8)];
        // p1's crowd candidate scores below its g1 candidate
        let candidates = vec![vec![(0, 0.9)], vec![(0, 0.55), (1, 0.6)]];

        let config = EvaluationConfig {
            match_policy: MatchPolicy::OpenImagesStrict,
            ..Default::default()
        };
        let records = match_candidates(&gts, &preds, &candidates, 0.5, &config);
        assert_eq!(records[0].gt_id.as_deref(), Some("g0"));
        // The claimed crowd never bars anything; p1 matches g1
        assert_eq!(records[1].gt_id.as_deref(), Some("g1"));
        assert_eq!(records[1].iou, Some(0.6));
    }

    #[test]
    fn test_classwise_groups_emit_in_label_order() {
        let gts = vec![object("g-dog", "dog"), object("g-cat", "cat")];
        let preds = vec![
            prediction("p-dog", "dog", 0.9),
            prediction("p-cat", "cat", 0.8),
        ];
        let candidates = vec![vec![(0, 0.9)], vec![(1, 0.9)]];

        let records =
            match_candidates(&gts, &preds, &candidates, 0.5, &EvaluationConfig::default());
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].pred_label.as_deref(), Some("cat"));
        assert_eq!(records[1].pred_label.as_deref(), Some("dog"));
    }

    #[test]
    fn test_cross_label_match_when_classwise_off() {
        let gts = vec![object("g0", "dog")];
        let preds = vec![prediction("p0", "cat", 0.9)];
        let candidates = vec![vec![(0, 0.9)]];

        let config = EvaluationConfig { classwise: false, ..Default::default() };
        let records = match_candidates(&gts, &preds, &candidates, 0.5, &config);
        assert_eq!(records.len(), 1);
        assert!(records[0].is_match());
        assert!(!records[0].is_true_positive());
        assert_eq!(records[0].gt_label.as_deref(), Some("dog"));
        assert_eq!(records[0].pred_label.as_deref(), Some("cat"));
    }

    #[test]
    fn test_empty_inputs() {
        let config = EvaluationConfig::default();
        assert!(match_candidates(&[], &[], &[], 0.5, &config).is_empty());

        let gts = vec![object("g0", "cat")];
        let records = match_candidates(&gts, &[], &[], 0.5, &config);
        assert_eq!(records.len(), 1);
        assert!(records[0].pred_id.is_none());

        let preds = vec![prediction("p0", "cat", 0.9)];
        let records = match_candidates(&[], &preds, &vec![vec![]], 0.5, &config);
        assert_eq!(records.len(), 1);
        assert!(records[0].gt_id.is_none());
    }

    #[test]
    fn test_matching_is_deterministic() {
        let gts = vec![object("g0", "cat"), object("g1", "cat"), object("g2", "cat")];
        let preds = vec![
            prediction("p0", "cat", 0.9),
            prediction("p1", "cat", 0.9),
            prediction("p2", "cat", 0.4),
        ];
        let candidates = vec![
            vec![(0, 0.8), (1, 0.8)],
            vec![(0, 0.8), (2, 0.7)],
            vec![(1, 0.9), (2, 0.9)],
        ];

        let config = EvaluationConfig::default();
        let first = match_candidates(&gts, &preds, &candidates, 0.5, &config);
        let second = match_candidates(&gts, &preds, &candidates, 0.5, &config);
        assert_eq!(first, second);
    }
}
