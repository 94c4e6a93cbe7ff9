//! Geometry kinds, their overlap measures, and the per-mode adapter.
//!
//! Every evaluation mode resolves incoming objects into an
//! [`AdaptedShape`] exactly once, so expensive per-object work (polygon
//! repair, mask tracing, cuboid rotation) is not repeated across pairs.

pub mod boxes;
pub mod cuboid;
pub mod interval;
pub mod keypoints;
pub mod mask;
pub mod polygon;

pub use boxes::box_iou;
pub use cuboid::{cuboid_iou, solid_iou, CuboidSolid};
pub use interval::interval_iou;
pub use keypoints::keypoint_similarity;
pub use mask::{mask_iou, mask_to_region};
pub use polygon::{build_region, polygon_iou, region_area};

use geo::{BoundingRect, MultiPolygon};
use rstar::AABB;

use crate::error::{EvalError, Result};
use crate::types::{
    BitMask, BoundingBox, FrameInterval, GeometricObject, Geometry, GeometryMode, KeypointSet,
    PolygonShape,
};

/// A geometry resolved for one evaluation mode.
#[derive(Debug, Clone)]
pub enum AdaptedShape {
    /// Axis-aligned box, used by [`GeometryMode::Boxes`].
    Rect(BoundingBox),
    /// Repaired planar region, used by [`GeometryMode::Polygons`] and
    /// [`GeometryMode::Masks`].
    Region(MultiPolygon<f64>),
    /// Resolved cuboid, used by [`GeometryMode::Cuboids`].
    Solid(CuboidSolid),
    /// Keypoint cloud, used by [`GeometryMode::Keypoints`].
    Points(KeypointSet),
    /// Closed interval, used by [`GeometryMode::Intervals`].
    Span(FrameInterval),
}

/// Resolve an object's geometry for the given evaluation mode.
///
/// Box mode accepts boxes directly and reduces polygons and masks to their
/// bounding boxes. Polygon and mask modes evaluate boxes, polygons and
/// masks through a shared region representation. Cuboid, keypoint and
/// interval modes accept only their own kind.
///
/// # Errors
///
/// Returns `EvalError::Geometry` when the kind cannot be evaluated under
/// the mode, or when the geometry itself is malformed.
pub fn adapt(
    obj: &GeometricObject,
    mode: GeometryMode,
    tolerance: Option<u32>,
) -> Result<AdaptedShape> {
    match (mode, &obj.geometry) {
        (GeometryMode::Boxes, Geometry::Box(b)) => {
            check_box_finite(b)?;
            Ok(AdaptedShape::Rect(b.clone()))
        }
        (GeometryMode::Boxes, Geometry::Polygon(p)) => Ok(AdaptedShape::Rect(polygon_bounds(p)?)),
        (GeometryMode::Boxes, Geometry::Mask(m)) => Ok(AdaptedShape::Rect(mask_bounds(m)?)),
        (GeometryMode::Polygons | GeometryMode::Masks, Geometry::Polygon(p)) => {
            Ok(AdaptedShape::Region(build_region(p)?))
        }
        (GeometryMode::Polygons | GeometryMode::Masks, Geometry::Box(b)) => {
            check_box_finite(b)?;
            Ok(AdaptedShape::Region(box_region(b)?))
        }
        (GeometryMode::Polygons | GeometryMode::Masks, Geometry::Mask(m)) => {
            Ok(AdaptedShape::Region(mask_to_region(m, tolerance)?))
        }
        (GeometryMode::Cuboids, Geometry::Cuboid(c)) => {
            Ok(AdaptedShape::Solid(CuboidSolid::build(c)?))
        }
        (GeometryMode::Keypoints, Geometry::Keypoints(k)) => Ok(AdaptedShape::Points(k.clone())),
        (GeometryMode::Intervals, Geometry::Interval(iv)) => {
            if !iv.start.is_finite() || !iv.end.is_finite() {
                return Err(EvalError::Geometry(format!(
                    "interval [{}, {}] has a non-finite endpoint",
                    iv.start, iv.end
                )));
            }
            if iv.start > iv.end {
                return Err(EvalError::Geometry(format!(
                    "interval start {} exceeds end {}",
                    iv.start, iv.end
                )));
            }
            Ok(AdaptedShape::Span(*iv))
        }
        (mode, geometry) => Err(EvalError::Geometry(format!(
            "cannot evaluate {} geometry in {:?} mode",
            geometry.kind_name(),
            mode
        ))),
    }
}

/// Similarity between two shapes adapted under the same mode.
///
/// # Errors
///
/// Returns `EvalError::Geometry` if the shapes were adapted under
/// different modes.
pub fn shape_similarity(pred: &AdaptedShape, gt: &AdaptedShape, gt_is_crowd: bool) -> Result<f64> {
    match (pred, gt) {
        (AdaptedShape::Rect(p), AdaptedShape::Rect(g)) => Ok(box_iou(p, g, gt_is_crowd)),
        (AdaptedShape::Region(p), AdaptedShape::Region(g)) => Ok(polygon_iou(p, g, gt_is_crowd)),
        (AdaptedShape::Solid(p), AdaptedShape::Solid(g)) => Ok(solid_iou(p, g, gt_is_crowd)),
        (AdaptedShape::Points(p), AdaptedShape::Points(g)) => Ok(keypoint_similarity(p, g)),
        (AdaptedShape::Span(p), AdaptedShape::Span(g)) => Ok(interval_iou(p, g, gt_is_crowd)),
        _ => Err(EvalError::Geometry(
            "adapted shapes come from different evaluation modes".to_string(),
        )),
    }
}

/// Planar bounding envelope of an adapted shape, if it has one.
pub(crate) fn planar_envelope(shape: &AdaptedShape) -> Option<AABB<[f64; 2]>> {
    match shape {
        AdaptedShape::Rect(b) => {
            Some(AABB::from_corners([b.x, b.y], [b.right(), b.bottom()]))
        }
        AdaptedShape::Region(region) => region
            .bounding_rect()
            .map(|r| AABB::from_corners([r.min().x, r.min().y], [r.max().x, r.max().y])),
        _ => None,
    }
}

/// Volumetric bounding envelope of an adapted shape, if it has one.
pub(crate) fn volumetric_envelope(shape: &AdaptedShape) -> Option<AABB<[f64; 3]>> {
    match shape {
        AdaptedShape::Solid(solid) => {
            let (lower, upper) = solid.envelope();
            Some(AABB::from_corners(lower, upper))
        }
        _ => None,
    }
}

fn check_box_finite(b: &BoundingBox) -> Result<()> {
    let finite = b.x.is_finite() && b.y.is_finite() && b.width.is_finite() && b.height.is_finite();
    if !finite {
        return Err(EvalError::Geometry(format!(
            "box ({}, {}, {}, {}) has a non-finite component",
            b.x, b.y, b.width, b.height
        )));
    }
    Ok(())
}

/// Bounding box over a polygon's raw vertices.
fn polygon_bounds(shape: &PolygonShape) -> Result<BoundingBox> {
    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    let mut any = false;

    for ring in &shape.rings {
        for &(x, y) in ring {
            if !x.is_finite() || !y.is_finite() {
                return Err(EvalError::Geometry(
                    "polygon ring contains a non-finite coordinate".to_string(),
                ));
            }
            any = true;
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
    }

    if !any {
        return Ok(BoundingBox::new(0.0, 0.0, 0.0, 0.0));
    }
    Ok(BoundingBox::new(min_x, min_y, max_x - min_x, max_y - min_y))
}

/// Bounding box over a mask's set pixels, as whole-pixel footprints.
fn mask_bounds(mask: &BitMask) -> Result<BoundingBox> {
    if mask.pixels.len() != mask.width * mask.height {
        return Err(EvalError::Geometry(format!(
            "mask buffer has {} pixels, expected {}x{} = {}",
            mask.pixels.len(),
            mask.width,
            mask.height,
            mask.width * mask.height
        )));
    }
    if !mask.origin.0.is_finite() || !mask.origin.1.is_finite() {
        return Err(EvalError::Geometry(format!(
            "mask origin ({}, {}) is non-finite",
            mask.origin.0, mask.origin.1
        )));
    }

    let mut min_x = usize::MAX;
    let mut min_y = usize::MAX;
    let mut max_x = 0usize;
    let mut max_y = 0usize;
    let mut any = false;

    for y in 0..mask.height {
        for x in 0..mask.width {
            if mask.get(x, y) {
                any = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
            }
        }
    }

    if !any {
        return Ok(BoundingBox::new(mask.origin.0, mask.origin.1, 0.0, 0.0));
    }
    Ok(BoundingBox::new(
        mask.origin.0 + min_x as f64,
        mask.origin.1 + min_y as f64,
        (max_x - min_x + 1) as f64,
        (max_y - min_y + 1) as f64,
    ))
}

/// A box as a rectangular region; degenerate boxes yield an empty region.
fn box_region(b: &BoundingBox) -> Result<MultiPolygon<f64>> {
    if b.width <= 0.0 || b.height <= 0.0 {
        return Ok(MultiPolygon::new(vec![]));
    }
    build_region(&PolygonShape::from_ring(vec![
        (b.x, b.y),
        (b.right(), b.y),
        (b.right(), b.bottom()),
        (b.x, b.bottom()),
    ]))
}
