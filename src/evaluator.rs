//! Top-level evaluation entry points.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{EvalError, Result};
use crate::matching::match_candidates;
use crate::metrics::curve::{CurveAccumulator, CurveSet};
use crate::similarity::compute_candidates;
use crate::types::{EvaluationConfig, GeometricObject, MatchRecord};

/// Match records at the primary threshold plus the finalized curves of a
/// threshold sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepOutcome {
    /// Records at the configured primary IoU threshold.
    pub records: Vec<MatchRecord>,
    pub curves: CurveSet,
}

/// Evaluate predictions against ground truth at the configured primary
/// IoU threshold.
///
/// Similarities are computed once for the sample, then matched greedily
/// in confidence order. The returned records cover every prediction and
/// every ground truth exactly once (crowd ground truths may back multiple
/// matched records).
///
/// # Arguments
///
/// * `ground_truths` - Annotated objects for one sample
/// * `predictions` - Predicted objects, each carrying a confidence
/// * `config` - Evaluation configuration
///
/// # Errors
///
/// Returns `EvalError::Configuration` for an invalid configuration,
/// `EvalError::MissingConfidence` if a prediction has no confidence, or
/// `EvalError::Geometry` when degenerate geometry is encountered under
/// `ErrorLevel::Fail`.
///
/// # Example
///
/// ```
/// use spatial_eval::{evaluate, BoundingBox, EvaluationConfig, GeometricObject, Geometry};
///
/// let gt = GeometricObject::new("g1", "cat", Geometry::Box(BoundingBox::new(0.0, 0.0, 4.0, 4.0)));
/// let pred = gt.clone().with_confidence(0.9);
///
/// let records = evaluate(&[gt], &[pred], &EvaluationConfig::default()).unwrap();
/// assert!(records[0].is_true_positive());
/// ```
pub fn evaluate(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    config: &EvaluationConfig,
) -> Result<Vec<MatchRecord>> {
    config.validate()?;
    require_confidences(predictions)?;
    let predictions = cap_predictions(predictions, config.max_predictions);

    let candidates = compute_candidates(ground_truths, &predictions, config)?;
    Ok(match_candidates(
        ground_truths,
        &predictions,
        &candidates,
        config.iou_threshold,
        config,
    ))
}

/// Evaluate one sample at every configured sweep threshold.
///
/// Similarities are computed once and reused across thresholds, so the
/// sweep costs little more than a single evaluation. One record list per
/// threshold is returned in `config.iou_thresholds` order, suitable for
/// feeding a [`CurveAccumulator`] when aggregating over many samples.
pub fn sweep(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    config: &EvaluationConfig,
) -> Result<Vec<Vec<MatchRecord>>> {
    config.validate()?;
    require_confidences(predictions)?;
    let predictions = cap_predictions(predictions, config.max_predictions);

    let candidates = compute_candidates(ground_truths, &predictions, config)?;
    Ok(config
        .iou_thresholds
        .iter()
        .map(|&threshold| {
            match_candidates(ground_truths, &predictions, &candidates, threshold, config)
        })
        .collect())
}

/// Evaluate one sample and produce both its primary match records and the
/// precision-recall curves of the configured threshold sweep.
///
/// If the primary threshold appears in the sweep its record list is
/// reused; otherwise one extra matching pass runs at the primary
/// threshold.
///
/// # Errors
///
/// Same conditions as [`evaluate`].
pub fn evaluate_with_curves(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    config: &EvaluationConfig,
) -> Result<SweepOutcome> {
    config.validate()?;
    require_confidences(predictions)?;
    let predictions = cap_predictions(predictions, config.max_predictions);

    let candidates = compute_candidates(ground_truths, &predictions, config)?;
    let per_threshold: Vec<Vec<MatchRecord>> = config
        .iou_thresholds
        .iter()
        .map(|&threshold| {
            match_candidates(ground_truths, &predictions, &candidates, threshold, config)
        })
        .collect();

    let mut accumulator = CurveAccumulator::new(config)?;
    accumulator.add_sample(&per_threshold)?;
    let curves = accumulator.finalize();

    let primary_idx = config
        .iou_thresholds
        .iter()
        .position(|&t| (t - config.iou_threshold).abs() < 1e-9);
    let records = match primary_idx {
        Some(idx) => per_threshold.into_iter().nth(idx).unwrap_or_default(),
        None => match_candidates(
            ground_truths,
            &predictions,
            &candidates,
            config.iou_threshold,
            config,
        ),
    };

    Ok(SweepOutcome { records, curves })
}

/// Evaluate at one specific IoU threshold, overriding the configured
/// primary threshold.
pub fn evaluate_at_iou(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    config: &EvaluationConfig,
    iou_threshold: f64,
) -> Result<Vec<MatchRecord>> {
    let config = config.clone().with_iou_threshold(iou_threshold);
    evaluate(ground_truths, predictions, &config)
}

fn require_confidences(predictions: &[GeometricObject]) -> Result<()> {
    for pred in predictions {
        if pred.confidence.is_none() {
            return Err(EvalError::MissingConfidence(format!(
                "prediction '{}' has no confidence score",
                pred.id
            )));
        }
    }
    Ok(())
}

/// Keep only the `limit` highest-confidence predictions, preserving their
/// original relative order.
fn cap_predictions(
    predictions: &[GeometricObject],
    limit: Option<usize>,
) -> Cow<'_, [GeometricObject]> {
    let Some(limit) = limit else {
        return Cow::Borrowed(predictions);
    };
    if predictions.len() <= limit {
        return Cow::Borrowed(predictions);
    }

    let mut order: Vec<usize> = (0..predictions.len()).collect();
    order.sort_by(|&a, &b| {
        let conf_a = predictions[a].confidence.unwrap_or(-1.0);
        let conf_b = predictions[b].confidence.unwrap_or(-1.0);
        conf_b.partial_cmp(&conf_a).unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep = vec![false; predictions.len()];
    for &idx in order.iter().take(limit) {
        keep[idx] = true;
    }
    Cow::Owned(
        predictions
            .iter()
            .enumerate()
            .filter(|(idx, _)| keep[*idx])
            .map(|(_, pred)| pred.clone())
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BoundingBox, Geometry};

    fn create_box(id: &str, label: &str, x: f64, y: f64) -> GeometricObject {
        GeometricObject::new(id, label, Geometry::Box(BoundingBox::new(x, y, 10.0, 10.0)))
    }

    #[test]
    fn test_evaluate_perfect_predictions() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0), create_box("g2", "dog", 50.0, 50.0)];
        let preds: Vec<GeometricObject> =
            gts.iter().map(|g| g.clone().with_confidence(0.9)).collect();

        let records = evaluate(&gts, &preds, &EvaluationConfig::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.is_true_positive()));
    }

    #[test]
    fn test_evaluate_requires_confidence() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0)];
        let preds = vec![create_box("p1", "cat", 0.0, 0.0)];

        let err = evaluate(&gts, &preds, &EvaluationConfig::default());
        assert!(matches!(err, Err(EvalError::MissingConfidence(msg)) if msg.contains("p1")));
    }

    #[test]
    fn test_evaluate_rejects_invalid_config() {
        let config = EvaluationConfig {
            iou_thresholds: vec![],
            ..Default::default()
        };
        assert!(evaluate(&[], &[], &config).is_err());
    }

    #[test]
    fn test_max_predictions_drops_lowest_confidence() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0)];
        let preds = vec![
            create_box("p1", "cat", 0.0, 0.0).with_confidence(0.9),
            create_box("p2", "cat", 100.0, 100.0).with_confidence(0.2),
            create_box("p3", "cat", 200.0, 200.0).with_confidence(0.5),
        ];

        let config = EvaluationConfig {
            max_predictions: Some(2),
            ..Default::default()
        };
        let records = evaluate(&gts, &preds, &config).unwrap();

        let pred_ids: Vec<&str> =
            records.iter().filter_map(|r| r.pred_id.as_deref()).collect();
        assert!(pred_ids.contains(&"p1"));
        assert!(pred_ids.contains(&"p3"));
        assert!(!pred_ids.contains(&"p2"));
    }

    #[test]
    fn test_cap_preserves_input_order() {
        let preds = vec![
            create_box("p1", "cat", 0.0, 0.0).with_confidence(0.2),
            create_box("p2", "cat", 0.0, 0.0).with_confidence(0.9),
            create_box("p3", "cat", 0.0, 0.0).with_confidence(0.5),
        ];
        let capped = cap_predictions(&preds, Some(2));
        let ids: Vec<&str> = capped.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p2", "p3"]);
    }

    #[test]
    fn test_sweep_returns_one_list_per_threshold() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0)];
        let preds = vec![create_box("p1", "cat", 0.0, 0.0).with_confidence(0.9)];

        let lists = sweep(&gts, &preds, &EvaluationConfig::default()).unwrap();
        assert_eq!(lists.len(), 10);
        assert!(lists.iter().all(|records| records[0].is_true_positive()));
    }

    #[test]
    fn test_evaluate_with_curves_perfect() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0)];
        let preds = vec![create_box("p1", "cat", 0.0, 0.0).with_confidence(0.9)];

        let outcome = evaluate_with_curves(&gts, &preds, &EvaluationConfig::default()).unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert!(outcome.records[0].is_true_positive());
        assert!((outcome.curves.map - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_primary_threshold_outside_sweep() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0)];
        let preds = vec![create_box("p1", "cat", 2.0, 0.0).with_confidence(0.9)];

        // Shifted box overlaps 8/12 = 0.667: matched at the primary
        // threshold but absent from the strict sweep
        let config = EvaluationConfig {
            iou_threshold: 0.6,
            iou_thresholds: vec![0.9],
            ..Default::default()
        };
        let outcome = evaluate_with_curves(&gts, &preds, &config).unwrap();
        assert!(outcome.records[0].is_true_positive());
        assert_eq!(outcome.curves.class_ap("cat"), 0.0);
    }

    #[test]
    fn test_evaluate_at_iou_overrides_threshold() {
        let gts = vec![create_box("g1", "cat", 0.0, 0.0)];
        let preds = vec![create_box("p1", "cat", 2.0, 0.0).with_confidence(0.9)];

        let config = EvaluationConfig::default();
        let lenient = evaluate_at_iou(&gts, &preds, &config, 0.5).unwrap();
        let strict = evaluate_at_iou(&gts, &preds, &config, 0.9).unwrap();

        assert!(lenient.iter().any(|r| r.is_true_positive()));
        assert!(strict.iter().all(|r| !r.is_true_positive()));
    }
}
