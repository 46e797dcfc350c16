// THEORY:
// The `OrientedBox` is the minimum-area rectangle, at any rotation, that encloses a
// contour. It is the first geometric summary of the specimen in a frame and the
// input to the axis and offset stages.
//
// Algorithm:
// 1.  **Convex hull** of the contour points (monotone chain). Collinear points are
//     dropped so every hull edge is a genuine direction change.
// 2.  **Edge sweep**: a minimum-area enclosing rectangle always has one side flush
//     with a hull edge, so each hull edge is tried as the rectangle's `width`
//     direction. All hull points are projected onto the edge and its normal; the
//     extents give the candidate rectangle, and the smallest area wins (first edge
//     on ties).
// 3.  **Normalisation**: the angle is reported in [0, 90) degrees; turning the
//     frame by a quarter turn swaps the roles of width and height.
//
// Corner order is a by-product of the winning edge and is not canonical; later
// stages must not rely on it.

use crate::core_modules::contour::Contour;
use crate::core_modules::geometry::Point2;
use crate::error::FrameIssue;

/// Hull area below which a point set is treated as collinear.
const MIN_HULL_AREA: f64 = 1e-9;

/// The minimum-area rectangle over a set of points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrientedBox {
    pub center: Point2,
    /// Side lengths as `(width, height)`; `width` runs along `angle`.
    pub size: (f64, f64),
    /// Direction of the `width` side in degrees, in [0, 90).
    pub angle: f64,
    /// The four corners in traversal order around the rectangle.
    pub corners: [Point2; 4],
}

impl OrientedBox {
    /// Fits the minimum-area rectangle over a traced contour.
    pub fn fit_contour(contour: &Contour) -> Result<Self, FrameIssue> {
        Self::fit(&contour.to_points())
    }

    /// Fits the minimum-area rectangle over arbitrary points. Fewer than three
    /// points, or points that are all collinear, are `DegenerateGeometry`.
    pub fn fit(points: &[Point2]) -> Result<Self, FrameIssue> {
        if points.len() < 3 {
            return Err(FrameIssue::DegenerateGeometry);
        }
        let hull = convex_hull(points);
        if hull.len() < 3 || polygon_area(&hull) < MIN_HULL_AREA {
            return Err(FrameIssue::DegenerateGeometry);
        }

        let mut best: Option<(f64, Point2, [f64; 4])> = None;
        for i in 0..hull.len() {
            let edge = hull[(i + 1) % hull.len()] - hull[i];
            let length = edge.norm();
            if length == 0.0 {
                continue;
            }
            let u = edge * (1.0 / length);
            let v = u.rotate_90();
            let extents = project_extents(&hull, u, v);
            let area = (extents[1] - extents[0]) * (extents[3] - extents[2]);
            if best.is_none_or(|(best_area, _, _)| area < best_area) {
                best = Some((area, u, extents));
            }
        }
        let (_, u, [s_min, s_max, t_min, t_max]) = best.ok_or(FrameIssue::DegenerateGeometry)?;
        let v = u.rotate_90();

        let corners = [
            u * s_min + v * t_min,
            u * s_max + v * t_min,
            u * s_max + v * t_max,
            u * s_min + v * t_max,
        ];
        let center = u * ((s_min + s_max) * 0.5) + v * ((t_min + t_max) * 0.5);

        let mut size = (s_max - s_min, t_max - t_min);
        let mut angle = u.y.atan2(u.x).to_degrees();
        while angle < 0.0 {
            angle += 90.0;
            size = (size.1, size.0);
        }
        while angle >= 90.0 {
            angle -= 90.0;
            size = (size.1, size.0);
        }

        Ok(Self { center, size, angle, corners })
    }

    pub fn width(&self) -> f64 {
        self.size.0
    }

    pub fn height(&self) -> f64 {
        self.size.1
    }

    /// `(shorter side, longer side)`.
    pub fn short_long(&self) -> (f64, f64) {
        let (w, h) = self.size;
        if w > h { (h, w) } else { (w, h) }
    }

    pub fn area(&self) -> f64 {
        self.size.0 * self.size.1
    }
}

/// Extents `[s_min, s_max, t_min, t_max]` of `points` projected on `u` and `v`.
fn project_extents(points: &[Point2], u: Point2, v: Point2) -> [f64; 4] {
    let mut extents = [f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY];
    for &p in points {
        let s = p.dot(u);
        let t = p.dot(v);
        extents[0] = extents[0].min(s);
        extents[1] = extents[1].max(s);
        extents[2] = extents[2].min(t);
        extents[3] = extents[3].max(t);
    }
    extents
}

fn polygon_area(points: &[Point2]) -> f64 {
    crate::core_modules::geometry::signed_area(points).abs()
}

/// Andrew's monotone chain. Returns the hull without repeated or collinear points.
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut sorted: Vec<Point2> = points.to_vec();
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let turn = |o: Point2, a: Point2, b: Point2| (a - o).cross(b - o);
    let mut hull: Vec<Point2> = Vec::with_capacity(sorted.len() * 2);
    for &p in &sorted {
        while hull.len() >= 2 && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    let lower_len = hull.len() + 1;
    for &p in sorted.iter().rev().skip(1) {
        while hull.len() >= lower_len && turn(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull.pop();
    hull
}
