//! Conversion of binary pixel masks to polygon regions.
//!
//! Masks are traced into border contours, optionally simplified, and then
//! scored through the shared polygon overlap codepath. This trades a small
//! geometric-accuracy loss at pixel boundaries for one overlap
//! implementation across planar kinds.

use geo::{BooleanOps, LineString, MultiPolygon, Polygon, Simplify};
use image::{GrayImage, Luma};
use imageproc::contours::find_contours;

use crate::error::{EvalError, Result};
use crate::geometry::polygon::polygon_iou;
use crate::types::BitMask;

/// Convert a binary mask to a polygon region.
///
/// Border contours are traced over the pixel grid and assembled with the
/// even-odd rule, so holes subtract and islands inside holes add back.
/// When `tolerance` is set, each contour is simplified with
/// Ramer-Douglas-Peucker at that pixel tolerance before assembly.
///
/// Contours enclosing no area (fewer than 3 points) are dropped, so masks
/// with no set pixels, or only isolated pixels, produce an empty region.
///
/// # Errors
///
/// Returns `EvalError::Geometry` if the pixel buffer length does not match
/// the stated dimensions, or if the origin offset is non-finite.
pub fn mask_to_region(mask: &BitMask, tolerance: Option<u32>) -> Result<MultiPolygon<f64>> {
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

    let mut region: MultiPolygon<f64> = MultiPolygon::new(vec![]);
    if mask.filled_pixels() == 0 {
        return Ok(region);
    }

    // One pixel of background padding so border-touching blobs trace fully
    let image = GrayImage::from_fn(
        (mask.width + 2) as u32,
        (mask.height + 2) as u32,
        |x, y| {
            if x == 0 || y == 0 || x > mask.width as u32 || y > mask.height as u32 {
                Luma([0u8])
            } else if mask.get((x - 1) as usize, (y - 1) as usize) {
                Luma([255u8])
            } else {
                Luma([0u8])
            }
        },
    );

    let epsilon = tolerance.map(f64::from).unwrap_or(0.0);
    for contour in find_contours::<u32>(&image) {
        let points: Vec<(f64, f64)> = contour
            .points
            .iter()
            .map(|p| {
                (
                    mask.origin.0 + (f64::from(p.x) - 1.0),
                    mask.origin.1 + (f64::from(p.y) - 1.0),
                )
            })
            .collect();
        if points.len() < 3 {
            continue;
        }

        let mut line = LineString::from(points);
        if epsilon > 0.0 {
            line = line.simplify(&epsilon);
        }
        if line.0.len() < 3 {
            continue;
        }

        let polygon = MultiPolygon::new(vec![Polygon::new(line, vec![])]);
        // Even-odd assembly: nested contours alternate between region and hole
        region = region.xor(&polygon);
    }

    Ok(region)
}

/// Calculate the IoU between two binary masks through their polygon
/// regions.
///
/// For crowd ground truths the denominator is the prediction region's own
/// area.
///
/// # Errors
///
/// Returns `EvalError::Geometry` if either mask is malformed.
pub fn mask_iou(
    pred: &BitMask,
    gt: &BitMask,
    gt_is_crowd: bool,
    tolerance: Option<u32>,
) -> Result<f64> {
    let pred_region = mask_to_region(pred, tolerance)?;
    let gt_region = mask_to_region(gt, tolerance)?;
    Ok(polygon_iou(&pred_region, &gt_region, gt_is_crowd))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::polygon::region_area;
    use geo::Area;

    fn block_mask(width: usize, height: usize, x0: usize, y0: usize, x1: usize, y1: usize) -> BitMask {
        let mut mask = BitMask::new(width, height);
        for y in y0..y1 {
            for x in x0..x1 {
                mask.set(x, y, true);
            }
        }
        mask
    }

    #[test]
    fn test_identical_masks() {
        let mask = block_mask(10, 10, 2, 2, 8, 8);
        let iou = mask_iou(&mask, &mask, false, None).unwrap();
        assert!((iou - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_disjoint_masks() {
        let a = block_mask(16, 16, 0, 0, 5, 5);
        let b = block_mask(16, 16, 10, 10, 15, 15);
        assert_eq!(mask_iou(&a, &b, false, None).unwrap(), 0.0);
    }

    #[test]
    fn test_overlapping_masks() {
        let a = block_mask(12, 8, 0, 0, 6, 6);
        let b = block_mask(12, 8, 3, 0, 9, 6);
        // Traced boundaries span pixel centers: 5x5 squares with a 2x5 overlap
        let iou = mask_iou(&a, &b, false, None).unwrap();
        assert!((iou - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_empty_mask() {
        let empty = BitMask::new(8, 8);
        let full = block_mask(8, 8, 0, 0, 8, 8);
        let region = mask_to_region(&empty, None).unwrap();
        assert_eq!(region_area(&region), 0.0);
        assert_eq!(mask_iou(&empty, &full, false, None).unwrap(), 0.0);
    }

    #[test]
    fn test_single_pixel_is_degenerate() {
        let mut mask = BitMask::new(8, 8);
        mask.set(4, 4, true);
        let region = mask_to_region(&mask, None).unwrap();
        assert_eq!(region_area(&region), 0.0);
    }

    #[test]
    fn test_mask_with_hole() {
        let solid = block_mask(12, 12, 1, 1, 11, 11);
        let mut holed = solid.clone();
        for y in 4..8 {
            for x in 4..8 {
                holed.set(x, y, false);
            }
        }

        let solid_area = region_area(&mask_to_region(&solid, None).unwrap());
        let holed_area = region_area(&mask_to_region(&holed, None).unwrap());
        assert!(holed_area > 0.0);
        assert!(holed_area < solid_area);

        let iou = mask_iou(&holed, &solid, false, None).unwrap();
        assert!(iou > 0.0 && iou < 1.0);
    }

    #[test]
    fn test_border_touching_blob() {
        let mask = block_mask(6, 6, 0, 0, 6, 6);
        let region = mask_to_region(&mask, None).unwrap();
        assert!((region_area(&region) - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_origin_offset_shifts_region() {
        let base = block_mask(8, 8, 0, 0, 4, 4);
        let shifted = base.clone().with_origin(100.0, 50.0);

        // Same shape, different placement: no overlap with the unshifted mask
        let iou = mask_iou(&base, &shifted, false, None).unwrap();
        assert_eq!(iou, 0.0);

        let self_iou = mask_iou(&shifted, &shifted, false, None).unwrap();
        assert!((self_iou - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_bad_buffer_rejected() {
        let mask = BitMask { pixels: vec![true; 10], width: 4, height: 4, origin: (0.0, 0.0) };
        assert!(mask_to_region(&mask, None).is_err());
    }

    #[test]
    fn test_non_finite_origin_rejected() {
        let mask = block_mask(4, 4, 0, 0, 4, 4).with_origin(f64::NAN, 0.0);
        assert!(mask_to_region(&mask, None).is_err());
    }

    #[test]
    fn test_tolerance_reduces_vertices() {
        // Diamond shape: 45 degree staircase edges collapse under RDP
        let mut mask = BitMask::new(24, 24);
        for y in 0..24_i32 {
            for x in 0..24_i32 {
                if (x - 12).abs() + (y - 12).abs() <= 9 {
                    mask.set(x as usize, y as usize, true);
                }
            }
        }

        let raw = mask_to_region(&mask, None).unwrap();
        let simplified = mask_to_region(&mask, Some(2)).unwrap();

        let raw_vertices: usize = raw.0.iter().map(|p| p.exterior().0.len()).sum();
        let simplified_vertices: usize = simplified.0.iter().map(|p| p.exterior().0.len()).sum();
        assert!(simplified_vertices < raw_vertices);

        // Simplification keeps the overall shape
        let inter = raw.intersection(&simplified).unsigned_area();
        let union = raw.union(&simplified).unsigned_area();
        assert!(inter / union > 0.8);
    }
}
