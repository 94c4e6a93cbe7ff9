//! Core data types for spatial annotations and evaluation runs.

use serde::{Deserialize, Serialize};

use crate::error::{ErrorLevel, EvalError, Result};

/// Axis-aligned bounding box in LTWH (Left-Top-Width-Height) format where:
/// - x: Left coordinate
/// - y: Top coordinate
/// - width: Box width
/// - height: Box height
///
/// Coordinates are normalized to `[0, 1]` relative to the frame, matching
/// the convention used by the other planar geometry kinds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Create a new bounding box.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Get the area of the bounding box.
    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Get the right coordinate (x + width).
    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    /// Get the bottom coordinate (y + height).
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Check if the bounding box is valid (finite, positive dimensions).
    pub fn is_valid(&self) -> bool {
        self.x.is_finite()
            && self.y.is_finite()
            && self.width > 0.0
            && self.height > 0.0
            && self.width.is_finite()
            && self.height.is_finite()
    }
}

/// One or more closed polygon rings.
///
/// Each ring is a list of `(x, y)` vertices; the closing edge from the last
/// vertex back to the first is implicit. Rings may be self-intersecting or
/// mutually overlapping; they are repaired into a clean region before any
/// overlap is computed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolygonShape {
    pub rings: Vec<Vec<(f64, f64)>>,
    /// Whether the enclosed region is filled. Unfilled polylines still
    /// evaluate by enclosed area.
    #[serde(default)]
    pub filled: bool,
}

impl PolygonShape {
    /// Create a filled polygon from its rings.
    pub fn new(rings: Vec<Vec<(f64, f64)>>) -> Self {
        Self { rings, filled: true }
    }

    /// Create a polygon from a single ring.
    pub fn from_ring(ring: Vec<(f64, f64)>) -> Self {
        Self::new(vec![ring])
    }

    /// Whether the shape has no rings at all.
    pub fn is_empty(&self) -> bool {
        self.rings.is_empty()
    }
}

/// A dense binary pixel mask with an origin offset placing it in the frame.
///
/// Pixels are stored row-major; `pixels[y * width + x]` is the pixel at
/// column `x`, row `y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BitMask {
    pub pixels: Vec<bool>,
    pub width: usize,
    pub height: usize,
    /// Offset of the mask's top-left pixel in frame coordinates.
    #[serde(default)]
    pub origin: (f64, f64),
}

impl BitMask {
    /// Create an empty mask of the given dimensions.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            pixels: vec![false; width * height],
            width,
            height,
            origin: (0.0, 0.0),
        }
    }

    /// Create a mask from a row-major pixel buffer.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Geometry` if the buffer length does not equal
    /// `width * height`.
    pub fn from_pixels(pixels: Vec<bool>, width: usize, height: usize) -> Result<Self> {
        if pixels.len() != width * height {
            return Err(EvalError::Geometry(format!(
                "mask buffer has {} pixels, expected {}x{} = {}",
                pixels.len(),
                width,
                height,
                width * height
            )));
        }
        Ok(Self { pixels, width, height, origin: (0.0, 0.0) })
    }

    /// Set the origin offset, consuming and returning the mask.
    pub fn with_origin(mut self, x: f64, y: f64) -> Self {
        self.origin = (x, y);
        self
    }

    /// Get the pixel at (x, y), or `false` when out of bounds.
    pub fn get(&self, x: usize, y: usize) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.pixels[y * self.width + x]
    }

    /// Set the pixel at (x, y).
    pub fn set(&mut self, x: usize, y: usize, value: bool) {
        debug_assert!(x < self.width && y < self.height);
        self.pixels[y * self.width + x] = value;
    }

    /// Number of set pixels.
    pub fn filled_pixels(&self) -> usize {
        self.pixels.iter().filter(|p| **p).count()
    }
}

/// An oriented 3D box described by center, side lengths and Euler rotation.
///
/// Rotation angles are roll-pitch-yaw Euler angles in radians, applied
/// about the x, y and z axes in that order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cuboid {
    pub center: [f64; 3],
    pub dimensions: [f64; 3],
    pub rotation: [f64; 3],
}

impl Cuboid {
    /// Create a new cuboid.
    pub fn new(center: [f64; 3], dimensions: [f64; 3], rotation: [f64; 3]) -> Self {
        Self { center, dimensions, rotation }
    }

    /// Create an axis-aligned cuboid.
    pub fn axis_aligned(center: [f64; 3], dimensions: [f64; 3]) -> Self {
        Self::new(center, dimensions, [0.0; 3])
    }

    /// Volume of the cuboid.
    pub fn volume(&self) -> f64 {
        self.dimensions[0] * self.dimensions[1] * self.dimensions[2]
    }
}

/// An ordered list of 2D points, optionally with per-point confidences.
///
/// Points are matched to another set by index position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeypointSet {
    pub points: Vec<(f64, f64)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidences: Option<Vec<f64>>,
}

impl KeypointSet {
    /// Create a keypoint set without per-point confidences.
    pub fn new(points: Vec<(f64, f64)>) -> Self {
        Self { points, confidences: None }
    }
}

/// A closed interval on a frame or time axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInterval {
    pub start: f64,
    pub end: f64,
}

impl FrameInterval {
    /// Create a new interval.
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Length of the interval.
    pub fn length(&self) -> f64 {
        self.end - self.start
    }

    /// Whether the interval is a single instant (zero length).
    pub fn is_instant(&self) -> bool {
        self.start == self.end
    }
}

/// The concrete shape carried by a [`GeometricObject`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    Box(BoundingBox),
    Polygon(PolygonShape),
    Mask(BitMask),
    Cuboid(Cuboid),
    Keypoints(KeypointSet),
    Interval(FrameInterval),
}

impl Geometry {
    /// Human-readable kind name, used in error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Geometry::Box(_) => "box",
            Geometry::Polygon(_) => "polygon",
            Geometry::Mask(_) => "mask",
            Geometry::Cuboid(_) => "cuboid",
            Geometry::Keypoints(_) => "keypoints",
            Geometry::Interval(_) => "interval",
        }
    }
}

/// A single annotated object: a ground truth or a prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometricObject {
    pub id: String,
    pub label: String,
    pub geometry: Geometry,
    /// Detection confidence. Required on predictions entering an
    /// evaluation, optional on ground truths.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    /// Marks a crowd region: a ground truth that may absorb any number of
    /// overlapping predictions.
    #[serde(default)]
    pub is_crowd: bool,
}

impl GeometricObject {
    /// Create a new object with no confidence and no crowd flag.
    pub fn new(id: impl Into<String>, label: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            geometry,
            confidence: None,
            is_crowd: false,
        }
    }

    /// Set the confidence, consuming and returning the object.
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Set the crowd flag, consuming and returning the object.
    pub fn with_crowd(mut self, is_crowd: bool) -> Self {
        self.is_crowd = is_crowd;
        self
    }
}

/// One row of a matching outcome.
///
/// Every prediction and every ground truth contributes exactly one record
/// per matching pass, except crowd ground truths which may appear in
/// several predictions' records:
/// - matched pair: all six fields populated
/// - unmatched prediction (false positive): ground-truth fields `None`
/// - unmatched ground truth (false negative): prediction fields `None`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pred_label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iou: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pred_id: Option<String>,
}

impl MatchRecord {
    /// Record for a prediction matched to a ground truth.
    pub fn matched(gt: &GeometricObject, pred: &GeometricObject, iou: f64) -> Self {
        Self {
            gt_label: Some(gt.label.clone()),
            pred_label: Some(pred.label.clone()),
            iou: Some(iou),
            confidence: pred.confidence,
            gt_id: Some(gt.id.clone()),
            pred_id: Some(pred.id.clone()),
        }
    }

    /// Record for a prediction that matched nothing.
    pub fn unmatched_prediction(pred: &GeometricObject) -> Self {
        Self {
            gt_label: None,
            pred_label: Some(pred.label.clone()),
            iou: None,
            confidence: pred.confidence,
            gt_id: None,
            pred_id: Some(pred.id.clone()),
        }
    }

    /// Record for a ground truth that no prediction claimed.
    pub fn unmatched_ground_truth(gt: &GeometricObject) -> Self {
        Self {
            gt_label: Some(gt.label.clone()),
            pred_label: None,
            iou: None,
            confidence: None,
            gt_id: Some(gt.id.clone()),
            pred_id: None,
        }
    }

    /// Whether both sides are present (a matched pair).
    pub fn is_match(&self) -> bool {
        self.gt_id.is_some() && self.pred_id.is_some()
    }

    /// Whether the record is a true positive: a matched pair whose labels
    /// agree.
    pub fn is_true_positive(&self) -> bool {
        self.is_match() && self.gt_label == self.pred_label
    }
}

/// Which geometry kind an evaluation run operates on.
///
/// All objects entering a run must carry geometry evaluable under the
/// configured mode; the mode also selects the overlap measure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GeometryMode {
    /// Axis-aligned box IoU.
    #[default]
    Boxes,
    /// Boolean-operation IoU over repaired polygon regions.
    Polygons,
    /// Mask pixels converted to polygon regions, then polygon IoU.
    Masks,
    /// Volumetric IoU of oriented 3D boxes.
    Cuboids,
    /// Gaussian keypoint similarity.
    Keypoints,
    /// Temporal IoU of closed intervals.
    Intervals,
}

/// How the greedy matcher resolves contested ground truths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchPolicy {
    /// Highest-IoU unmatched ground truth wins; crowds may be matched
    /// repeatedly.
    #[default]
    Standard,
    /// Open Images rule: a higher-IoU ground truth that is already claimed
    /// bars the prediction from matching any lower-IoU ground truth.
    OpenImagesStrict,
}

/// Shape of the precision-recall curves produced by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CurveStyle {
    /// Precision resampled onto a fixed 101-point recall grid.
    #[default]
    Interpolated101,
    /// Native curve points, padded at the endpoints.
    Native,
}

/// Configuration for an evaluation run.
#[derive(Debug, Clone)]
pub struct EvaluationConfig {
    /// Geometry kind and overlap measure for this run.
    pub geometry_mode: GeometryMode,
    /// IoU threshold for the primary matching pass.
    pub iou_threshold: f64,
    /// IoU thresholds swept when building curves.
    pub iou_thresholds: Vec<f64>,
    /// When true, only same-label pairs may match.
    pub classwise: bool,
    /// Keep only this many predictions per call, highest confidence first.
    pub max_predictions: Option<usize>,
    /// Boundary simplification tolerance, in pixels, for mask conversion.
    pub tolerance: Option<u32>,
    /// Handling of per-object and per-pair geometry failures.
    pub error_level: ErrorLevel,
    /// Contested ground-truth resolution rule.
    pub match_policy: MatchPolicy,
    /// Curve shape produced by sweeps.
    pub curve_style: CurveStyle,
    /// Decides which ground truths act as crowd regions.
    pub crowd_predicate: fn(&GeometricObject) -> bool,
}

/// Default crowd rule: the object's own crowd flag.
fn crowd_flag(obj: &GeometricObject) -> bool {
    obj.is_crowd
}

/// The ten COCO IoU thresholds, 0.5 to 0.95 in steps of 0.05.
pub fn default_iou_thresholds() -> Vec<f64> {
    (0..10).map(|i| 0.5 + 0.05 * i as f64).collect()
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            geometry_mode: GeometryMode::Boxes,
            iou_threshold: 0.5,
            iou_thresholds: default_iou_thresholds(),
            classwise: true,
            max_predictions: None,
            tolerance: None,
            error_level: ErrorLevel::default(),
            match_policy: MatchPolicy::Standard,
            curve_style: CurveStyle::Interpolated101,
            crowd_predicate: crowd_flag,
        }
    }
}

impl EvaluationConfig {
    /// COCO-style evaluation: classwise greedy matching, the 0.5:0.05:0.95
    /// threshold sweep and 101-point interpolated curves.
    pub fn coco() -> Self {
        Self::default()
    }

    /// Open Images-style evaluation: single 0.5 threshold, the strict
    /// contested-match rule and native curves.
    pub fn open_images() -> Self {
        Self {
            iou_threshold: 0.5,
            iou_thresholds: vec![0.5],
            match_policy: MatchPolicy::OpenImagesStrict,
            curve_style: CurveStyle::Native,
            ..Self::default()
        }
    }

    /// ActivityNet-style evaluation: temporal IoU over intervals with the
    /// COCO threshold sweep.
    pub fn activity_net() -> Self {
        Self {
            geometry_mode: GeometryMode::Intervals,
            ..Self::default()
        }
    }

    /// Set the geometry mode, consuming and returning the config.
    pub fn with_mode(mut self, mode: GeometryMode) -> Self {
        self.geometry_mode = mode;
        self
    }

    /// Set the primary IoU threshold, consuming and returning the config.
    pub fn with_iou_threshold(mut self, iou: f64) -> Self {
        self.iou_threshold = iou;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Configuration` if the primary threshold or any
    /// sweep threshold lies outside the open interval (0, 1), or if the
    /// sweep threshold list is empty.
    pub fn validate(&self) -> Result<()> {
        validate_iou_threshold(self.iou_threshold)?;
        if self.iou_thresholds.is_empty() {
            return Err(EvalError::Configuration(
                "iou threshold sweep list must not be empty".to_string(),
            ));
        }
        for &t in &self.iou_thresholds {
            validate_iou_threshold(t)?;
        }
        Ok(())
    }
}

/// Check that an IoU threshold lies strictly between 0 and 1.
///
/// # Errors
///
/// Returns `EvalError::Configuration` otherwise.
pub fn validate_iou_threshold(iou: f64) -> Result<()> {
    if !iou.is_finite() || iou <= 0.0 || iou >= 1.0 {
        return Err(EvalError::Configuration(format!(
            "iou threshold must lie in (0, 1), got {iou}"
        )));
    }
    Ok(())
}
