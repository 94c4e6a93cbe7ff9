//! # spatial-eval
//!
//! A Rust library for evaluating spatial predictions against ground truth
//! across geometry kinds, with greedy confidence-ordered matching and
//! threshold-sweep metrics.
//!
//! The engine matches predictions to ground truth and derives standard
//! detection metrics:
//! - **Match records** (true positives, false positives, misses) at a
//!   primary IoU threshold
//! - **Precision-recall curves** and **(m)AP** over an IoU threshold sweep
//! - **Confusion matrices** with per-class and averaged summaries
//!
//! ## Features
//!
//! - Six geometry kinds: axis-aligned boxes, polygons with holes, bit
//!   masks, rotated cuboids, keypoint sets, and frame intervals
//! - Evaluation modes that adapt compatible kinds, so boxes, polygons and
//!   masks can be scored against each other
//! - Crowd ground truth that absorbs any number of predictions
//! - Protocol presets for standard box, strict claim-once, and temporal
//!   interval evaluation
//! - Spatial pre-filtering so dense scenes skip far-apart pairs
//!
//! ## Quick Start
//!
//! ```rust
//! use spatial_eval::{
//!     evaluate_with_curves, BoundingBox, EvaluationConfig, GeometricObject, Geometry,
//! };
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let ground_truths = vec![GeometricObject::new(
//!     "gt-1",
//!     "cat",
//!     Geometry::Box(BoundingBox::new(10.0, 10.0, 50.0, 50.0)),
//! )];
//! let predictions = vec![GeometricObject::new(
//!     "pred-1",
//!     "cat",
//!     Geometry::Box(BoundingBox::new(12.0, 12.0, 50.0, 50.0)),
//! )
//! .with_confidence(0.95)];
//!
//! let outcome = evaluate_with_curves(&ground_truths, &predictions, &EvaluationConfig::coco())?;
//!
//! println!("matches: {}", outcome.records.iter().filter(|r| r.is_match()).count());
//! println!("mAP: {:.4}", outcome.curves.map);
//! # Ok(())
//! # }
//! ```
//!
//! ## Objects
//!
//! Every evaluated object is a [`GeometricObject`]: an id, a class label,
//! one [`Geometry`], an optional confidence (required for predictions)
//! and a crowd flag. The [`EvaluationConfig`] selects the geometry mode,
//! thresholds and matching policy; [`EvaluationConfig::coco`],
//! [`EvaluationConfig::open_images`] and
//! [`EvaluationConfig::activity_net`] provide the common presets.

pub mod error;
pub mod evaluator;
pub mod geometry;
pub mod index;
pub mod matching;
pub mod metrics;
pub mod similarity;
pub mod types;

// Re-export commonly used types and functions
pub use error::{ErrorLevel, EvalError, Result};
pub use evaluator::{evaluate, evaluate_at_iou, evaluate_with_curves, sweep, SweepOutcome};
pub use matching::match_candidates;
pub use metrics::{Average, ConfusionMatrix, CurveAccumulator, CurveSet, PRCurve};
pub use similarity::{compute_candidates, compute_similarity_matrix, CandidateLists};
pub use types::{
    BitMask, BoundingBox, Cuboid, CurveStyle, EvaluationConfig, FrameInterval, GeometricObject,
    Geometry, GeometryMode, KeypointSet, MatchPolicy, MatchRecord, PolygonShape,
};
