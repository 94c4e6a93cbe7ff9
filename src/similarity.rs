//! Pairwise similarity between ground truths and predictions.
//!
//! Objects are adapted once for the configured mode, ground-truth
//! envelopes go into a broad-phase index, and each prediction is scored
//! only against ground truths whose envelopes intersect its own. The
//! sparse candidate lists produced here are reused across every matching
//! pass of a threshold sweep.

use crate::error::{ErrorLevel, EvalError, Result};
use crate::geometry::{
    adapt, planar_envelope, shape_similarity, volumetric_envelope, AdaptedShape,
};
use crate::index::{PlanarIndex, VolumetricIndex};
use crate::types::{EvaluationConfig, GeometricObject, GeometryMode};

/// Per-prediction candidate lists: positions of ground truths with
/// non-zero similarity and their scores, in ascending ground-truth
/// position.
pub type CandidateLists = Vec<Vec<(usize, f64)>>;

/// Score every prediction against its candidate ground truths.
///
/// Candidates are pruned by bounding-envelope intersection for planar and
/// volumetric modes and scored densely for keypoint and interval modes.
/// When `classwise` is set, pairs with differing labels are skipped
/// entirely. Only non-zero scores are kept.
///
/// Malformed objects and failed pairs are handled per the configured
/// error level: failing the call, or logging and contributing zero
/// overlap, or silently contributing zero overlap.
///
/// # Errors
///
/// Returns `EvalError::Geometry` under [`ErrorLevel::Fail`] when any
/// object or pair cannot be scored.
pub fn compute_candidates(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    config: &EvaluationConfig,
) -> Result<CandidateLists> {
    let gt_shapes = adapt_all(ground_truths, config)?;
    let pred_shapes = adapt_all(predictions, config)?;
    let positions = candidate_positions(&gt_shapes, &pred_shapes, config.geometry_mode);

    let mut candidates = Vec::with_capacity(predictions.len());
    for (pred_pos, pred) in predictions.iter().enumerate() {
        let mut row = Vec::new();
        if let Some(pred_shape) = &pred_shapes[pred_pos] {
            for &gt_pos in &positions[pred_pos] {
                let gt = &ground_truths[gt_pos];
                if config.classwise && gt.label != pred.label {
                    continue;
                }
                let Some(gt_shape) = &gt_shapes[gt_pos] else {
                    continue;
                };
                let gt_is_crowd = (config.crowd_predicate)(gt);
                let score = match shape_similarity(pred_shape, gt_shape, gt_is_crowd) {
                    Ok(score) => score,
                    Err(err) => {
                        demote_pair(err, config.error_level, &pred.id, &gt.id)?;
                        0.0
                    }
                };
                if score > 0.0 {
                    row.push((gt_pos, score));
                }
            }
        }
        candidates.push(row);
    }
    Ok(candidates)
}

/// Score every prediction against every ground truth into a dense
/// `num_predictions x num_ground_truths` matrix.
///
/// Entries pruned by the broad phase, skipped by the classwise gate or
/// scoring zero are all 0.0.
///
/// # Errors
///
/// Same contract as [`compute_candidates`].
pub fn compute_similarity_matrix(
    ground_truths: &[GeometricObject],
    predictions: &[GeometricObject],
    config: &EvaluationConfig,
) -> Result<Vec<Vec<f64>>> {
    let candidates = compute_candidates(ground_truths, predictions, config)?;
    let mut matrix = vec![vec![0.0; ground_truths.len()]; predictions.len()];
    for (pred_pos, row) in candidates.iter().enumerate() {
        for &(gt_pos, score) in row {
            matrix[pred_pos][gt_pos] = score;
        }
    }
    Ok(matrix)
}

/// Adapt every object for the configured mode, demoting failures to
/// `None` when the error level allows it.
fn adapt_all(
    objects: &[GeometricObject],
    config: &EvaluationConfig,
) -> Result<Vec<Option<AdaptedShape>>> {
    objects
        .iter()
        .map(|obj| match adapt(obj, config.geometry_mode, config.tolerance) {
            Ok(shape) => Ok(Some(shape)),
            Err(err) => demote_object(err, config.error_level, &obj.id).map(|()| None),
        })
        .collect()
}

fn demote_object(err: EvalError, level: ErrorLevel, object_id: &str) -> Result<()> {
    match level {
        ErrorLevel::Fail => Err(err),
        ErrorLevel::WarnAndZero => {
            log::warn!("object {object_id}: {err}; scoring zero overlap");
            Ok(())
        }
        ErrorLevel::SilentZero => Ok(()),
    }
}

fn demote_pair(err: EvalError, level: ErrorLevel, pred_id: &str, gt_id: &str) -> Result<()> {
    match level {
        ErrorLevel::Fail => Err(err),
        ErrorLevel::WarnAndZero => {
            log::warn!("pair {pred_id}/{gt_id}: {err}; scoring zero overlap");
            Ok(())
        }
        ErrorLevel::SilentZero => Ok(()),
    }
}

/// Candidate ground-truth positions per prediction, before label gating
/// and scoring.
fn candidate_positions(
    gt_shapes: &[Option<AdaptedShape>],
    pred_shapes: &[Option<AdaptedShape>],
    mode: GeometryMode,
) -> Vec<Vec<usize>> {
    match mode {
        GeometryMode::Boxes | GeometryMode::Polygons | GeometryMode::Masks => {
            let entries = gt_shapes
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().and_then(planar_envelope).map(|e| (i, e)))
                .collect();
            let index = PlanarIndex::build(entries);
            pred_shapes
                .iter()
                .map(|s| {
                    s.as_ref()
                        .and_then(planar_envelope)
                        .map(|e| index.intersecting(&e))
                        .unwrap_or_default()
                })
                .collect()
        }
        GeometryMode::Cuboids => {
            let entries = gt_shapes
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().and_then(volumetric_envelope).map(|e| (i, e)))
                .collect();
            let index = VolumetricIndex::build(entries);
            pred_shapes
                .iter()
                .map(|s| {
                    s.as_ref()
                        .and_then(volumetric_envelope)
                        .map(|e| index.intersecting(&e))
                        .unwrap_or_default()
                })
                .collect()
        }
        GeometryMode::Keypoints | GeometryMode::Intervals => {
            let all: Vec<usize> = gt_shapes
                .iter()
                .enumerate()
                .filter_map(|(i, s)| s.as_ref().map(|_| i))
                .collect();
            pred_shapes
                .iter()
                .map(|s| if s.is_some() { all.clone() } else { Vec::new() })
                .collect()
        }
    }
}
