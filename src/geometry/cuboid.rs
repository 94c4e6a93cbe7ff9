//! Volumetric overlap of oriented 3D boxes.
//!
//! The intersection of two convex cuboids is itself convex, so its volume
//! is computed by clipping each cuboid's faces against the other's bounding
//! half-spaces and taking the convex hull of the surviving points.

use nalgebra::{Point3, Rotation3, Vector3};

use crate::error::{EvalError, Result};
use crate::types::Cuboid;

/// Vertex cycles of the six faces under the canonical vertex ordering
/// produced by [`CuboidSolid::build`].
const FACES: [[usize; 4]; 6] = [
    [0, 2, 6, 4],
    [1, 3, 7, 5],
    [0, 1, 5, 4],
    [2, 3, 7, 6],
    [0, 1, 3, 2],
    [4, 5, 7, 6],
];

/// A bounding half-space; points with `normal . x <= offset` lie inside.
#[derive(Debug, Clone, Copy)]
struct HalfSpace {
    normal: Vector3<f64>,
    offset: f64,
}

/// An oriented cuboid resolved into world-space vertices, bounding
/// half-spaces and volume.
#[derive(Debug, Clone)]
pub struct CuboidSolid {
    vertices: [Point3<f64>; 8],
    half_spaces: [HalfSpace; 6],
    volume: f64,
}

impl CuboidSolid {
    /// Resolve a cuboid into its world-space representation.
    ///
    /// # Errors
    ///
    /// Returns `EvalError::Geometry` if any component is non-finite or a
    /// dimension is negative.
    pub fn build(cuboid: &Cuboid) -> Result<Self> {
        let finite = cuboid
            .center
            .iter()
            .chain(cuboid.dimensions.iter())
            .chain(cuboid.rotation.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(EvalError::Geometry(
                "cuboid contains a non-finite component".to_string(),
            ));
        }
        if cuboid.dimensions.iter().any(|&d| d < 0.0) {
            return Err(EvalError::Geometry(format!(
                "cuboid dimensions {:?} must be non-negative",
                cuboid.dimensions
            )));
        }

        let rotation = Rotation3::from_euler_angles(
            cuboid.rotation[0],
            cuboid.rotation[1],
            cuboid.rotation[2],
        );
        let center = Vector3::new(cuboid.center[0], cuboid.center[1], cuboid.center[2]);
        let axes = [
            rotation * Vector3::x(),
            rotation * Vector3::y(),
            rotation * Vector3::z(),
        ];
        let half = [
            cuboid.dimensions[0] / 2.0,
            cuboid.dimensions[1] / 2.0,
            cuboid.dimensions[2] / 2.0,
        ];

        let mut vertices = [Point3::origin(); 8];
        for (i, vertex) in vertices.iter_mut().enumerate() {
            let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
            let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
            let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
            *vertex = Point3::from(
                center + axes[0] * (sx * half[0]) + axes[1] * (sy * half[1]) + axes[2] * (sz * half[2]),
            );
        }

        let mut half_spaces = [HalfSpace { normal: Vector3::zeros(), offset: 0.0 }; 6];
        for k in 0..3 {
            let projected_center = axes[k].dot(&center);
            half_spaces[2 * k] = HalfSpace { normal: axes[k], offset: projected_center + half[k] };
            half_spaces[2 * k + 1] =
                HalfSpace { normal: -axes[k], offset: -projected_center + half[k] };
        }

        Ok(Self {
            vertices,
            half_spaces,
            volume: cuboid.dimensions[0] * cuboid.dimensions[1] * cuboid.dimensions[2],
        })
    }

    /// Volume of the cuboid.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// World-space corner vertices.
    pub fn vertices(&self) -> &[Point3<f64>; 8] {
        &self.vertices
    }

    /// Axis-aligned bounds over the vertices, as (min, max) corners.
    pub(crate) fn envelope(&self) -> ([f64; 3], [f64; 3]) {
        let mut lower = [f64::INFINITY; 3];
        let mut upper = [f64::NEG_INFINITY; 3];
        for vertex in &self.vertices {
            for axis in 0..3 {
                lower[axis] = lower[axis].min(vertex[axis]);
                upper[axis] = upper[axis].max(vertex[axis]);
            }
        }
        (lower, upper)
    }
}

/// Calculate the volumetric IoU between two resolved cuboids.
///
/// For crowd ground truths the denominator is the prediction's own volume.
/// Zero-volume cuboids and flat or empty intersections yield 0.0; a
/// numerically invalid intersection is logged and scored 0.0.
pub fn solid_iou(pred: &CuboidSolid, gt: &CuboidSolid, gt_is_crowd: bool) -> f64 {
    let (pred_lower, pred_upper) = pred.envelope();
    let (gt_lower, gt_upper) = gt.envelope();
    for axis in 0..3 {
        if pred_upper[axis] < gt_lower[axis] || gt_upper[axis] < pred_lower[axis] {
            return 0.0;
        }
    }

    let mut points = clip_faces(pred, gt);
    points.extend(clip_faces(gt, pred));

    let intersection = intersection_volume(&points);
    if !intersection.is_finite() {
        log::warn!("cuboid intersection volume was non-finite, scoring the pair 0.0");
        return 0.0;
    }
    let intersection = intersection.min(pred.volume).min(gt.volume);

    let denominator = if gt_is_crowd {
        pred.volume
    } else {
        pred.volume + gt.volume - intersection
    };

    if denominator <= 0.0 {
        return 0.0;
    }

    (intersection / denominator).clamp(0.0, 1.0)
}

/// Calculate the volumetric IoU between two cuboids.
///
/// # Errors
///
/// Returns `EvalError::Geometry` if either cuboid is malformed.
pub fn cuboid_iou(pred: &Cuboid, gt: &Cuboid, gt_is_crowd: bool) -> Result<f64> {
    let pred_solid = CuboidSolid::build(pred)?;
    let gt_solid = CuboidSolid::build(gt)?;
    Ok(solid_iou(&pred_solid, &gt_solid, gt_is_crowd))
}

/// Clip each face of `subject` against all half-spaces of `clip`,
/// returning the surviving polygon vertices.
fn clip_faces(subject: &CuboidSolid, clip: &CuboidSolid) -> Vec<Point3<f64>> {
    let mut points = Vec::new();
    for face in &FACES {
        let mut polygon: Vec<Point3<f64>> = face.iter().map(|&i| subject.vertices[i]).collect();
        for half_space in &clip.half_spaces {
            polygon = clip_polygon(&polygon, half_space);
            if polygon.is_empty() {
                break;
            }
        }
        points.extend(polygon);
    }
    points
}

/// Sutherland-Hodgman clip of a 3D polygon against one half-space.
fn clip_polygon(polygon: &[Point3<f64>], half_space: &HalfSpace) -> Vec<Point3<f64>> {
    let mut output = Vec::with_capacity(polygon.len() + 2);
    for i in 0..polygon.len() {
        let a = polygon[i];
        let b = polygon[(i + 1) % polygon.len()];
        let dist_a = half_space.normal.dot(&a.coords) - half_space.offset;
        let dist_b = half_space.normal.dot(&b.coords) - half_space.offset;

        if dist_a <= 0.0 {
            output.push(a);
        }
        if (dist_a < 0.0 && dist_b > 0.0) || (dist_a > 0.0 && dist_b < 0.0) {
            let t = dist_a / (dist_a - dist_b);
            output.push(a + (b - a) * t);
        }
    }
    output
}

/// Oriented triangle of a hull under construction; `normal` is unit length
/// and points outward, or zero for a degenerate sliver.
#[derive(Debug, Clone, Copy)]
struct HullFace {
    a: usize,
    b: usize,
    c: usize,
    normal: Vector3<f64>,
}

impl HullFace {
    fn make(points: &[Point3<f64>], a: usize, b: usize, c: usize) -> Self {
        let normal = (points[b] - points[a])
            .cross(&(points[c] - points[a]))
            .try_normalize(1e-12)
            .unwrap_or_else(Vector3::zeros);
        Self { a, b, c, normal }
    }

    fn sees(&self, points: &[Point3<f64>], idx: usize) -> bool {
        self.normal.dot(&(points[idx] - points[self.a])) > 1e-10
    }
}

/// Volume of the convex hull of a point cloud via incremental hull
/// construction. Returns 0.0 for clouds with no interior (fewer than four
/// points, or collinear or coplanar clouds).
fn intersection_volume(cloud: &[Point3<f64>]) -> f64 {
    let points = dedup_points(cloud);
    if points.len() < 4 {
        return 0.0;
    }

    let Some([i0, i1, i2, i3]) = initial_simplex(&points) else {
        return 0.0;
    };

    // Orient each seed face away from the opposite vertex
    let mut faces = vec![
        oriented_face(&points, i0, i1, i2, i3),
        oriented_face(&points, i0, i1, i3, i2),
        oriented_face(&points, i0, i2, i3, i1),
        oriented_face(&points, i1, i2, i3, i0),
    ];

    let seed = [i0, i1, i2, i3];
    for idx in 0..points.len() {
        if seed.contains(&idx) {
            continue;
        }

        let (visible, hidden): (Vec<HullFace>, Vec<HullFace>) =
            faces.iter().copied().partition(|f| f.sees(&points, idx));
        if visible.is_empty() {
            continue;
        }

        // Horizon edges appear in a visible face but their reverse does not
        let directed: Vec<(usize, usize)> = visible
            .iter()
            .flat_map(|f| [(f.a, f.b), (f.b, f.c), (f.c, f.a)])
            .collect();
        let mut next_faces = hidden;
        for &(u, v) in &directed {
            if !directed.contains(&(v, u)) {
                next_faces.push(HullFace::make(&points, u, v, idx));
            }
        }
        faces = next_faces;
    }

    hull_volume(&points, &faces)
}

/// Merge points closer than 1e-9 together.
fn dedup_points(cloud: &[Point3<f64>]) -> Vec<Point3<f64>> {
    let mut points: Vec<Point3<f64>> = Vec::with_capacity(cloud.len());
    for &p in cloud {
        if !points.iter().any(|q| (p - q).norm_squared() < 1e-18) {
            points.push(p);
        }
    }
    points
}

/// Find four points spanning a non-degenerate tetrahedron.
fn initial_simplex(points: &[Point3<f64>]) -> Option<[usize; 4]> {
    let i0 = 0;

    let (i1, d1) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, (p - points[i0]).norm_squared()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    if d1 < 1e-18 {
        return None;
    }

    let edge = points[i1] - points[i0];
    let (i2, d2) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, edge.cross(&(p - points[i0])).norm_squared()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    if d2 < 1e-18 {
        return None;
    }

    let normal = edge
        .cross(&(points[i2] - points[i0]))
        .try_normalize(1e-12)
        .unwrap_or_else(Vector3::zeros);
    let (i3, d3) = points
        .iter()
        .enumerate()
        .map(|(i, p)| (i, normal.dot(&(p - points[i0])).abs()))
        .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))?;
    if d3 < 1e-9 {
        return None;
    }

    Some([i0, i1, i2, i3])
}

fn oriented_face(points: &[Point3<f64>], a: usize, b: usize, c: usize, opposite: usize) -> HullFace {
    let face = HullFace::make(points, a, b, c);
    if face.normal.dot(&(points[opposite] - points[a])) > 0.0 {
        HullFace::make(points, a, c, b)
    } else {
        face
    }
}

/// Signed volume of a hull as tetrahedra fanned from the vertex centroid.
fn hull_volume(points: &[Point3<f64>], faces: &[HullFace]) -> f64 {
    if faces.is_empty() {
        return 0.0;
    }

    let mut centroid = Vector3::zeros();
    for p in points {
        centroid += p.coords;
    }
    centroid /= points.len() as f64;

    let mut volume = 0.0;
    for face in faces {
        let a = points[face.a].coords - centroid;
        let b = points[face.b].coords - centroid;
        let c = points[face.c].coords - centroid;
        volume += a.dot(&b.cross(&c)) / 6.0;
    }
    volume.abs()
}
