// THEORY:
// The `AxisResolver` derives a specimen-aligned frame from the four corners of the
// oriented box. The fitter gives no stable corner order, so the frame has to be
// rebuilt from the corner *set* every frame.
//
// `ImageHorizontal` (the default) sorts the corners by x, averages the two
// left-most and the two right-most, and runs the longitudinal axis from the left
// centroid to the right one. It needs no memory across frames and is correct as
// long as the specimen's long axis stays closer to image-horizontal than vertical.
// Past ±45 degrees the pairing flips and the "longitudinal" axis lands on the short
// side of the specimen.
//
// `LongSide` takes the longitudinal axis along the box's longer side instead, which
// holds under any rotation. It still uses only the current frame.

use crate::config::AxisPolicy;
use crate::core_modules::geometry::Point2;
use crate::error::FrameIssue;

/// Spread below which the corners are considered coincident, in pixels.
pub const AXIS_EPSILON: f64 = 1e-6;

/// Orthonormal specimen frame: `transverse` is `longitudinal` turned by 90 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalAxes {
    pub longitudinal: Point2,
    pub transverse: Point2,
}

impl LocalAxes {
    /// Builds the frame from any non-zero direction.
    pub fn from_direction(direction: Point2) -> Result<Self, FrameIssue> {
        let length = direction.norm();
        if !(length >= AXIS_EPSILON) {
            return Err(FrameIssue::DegenerateAxis);
        }
        let longitudinal = direction * (1.0 / length);
        Ok(Self {
            longitudinal,
            transverse: longitudinal.rotate_90(),
        })
    }

    /// Coordinates of `p` in this frame as `(s, t)`.
    pub fn project(&self, p: Point2) -> (f64, f64) {
        (p.dot(self.longitudinal), p.dot(self.transverse))
    }

    /// Inverse of [`LocalAxes::project`].
    pub fn unproject(&self, s: f64, t: f64) -> Point2 {
        self.longitudinal * s + self.transverse * t
    }
}

pub fn resolve_axes(corners: &[Point2; 4], policy: AxisPolicy) -> Result<LocalAxes, FrameIssue> {
    match policy {
        AxisPolicy::ImageHorizontal => horizontal_pairing(corners),
        AxisPolicy::LongSide => long_side(corners),
    }
}

/// Left-pair centroid to right-pair centroid, pairing corners by x-coordinate.
fn horizontal_pairing(corners: &[Point2; 4]) -> Result<LocalAxes, FrameIssue> {
    let mut sorted = *corners;
    sorted.sort_by(|a, b| a.x.total_cmp(&b.x));
    let left_center = sorted[0].midpoint(sorted[1]);
    let right_center = sorted[2].midpoint(sorted[3]);
    LocalAxes::from_direction(right_center - left_center)
}

/// Direction of the longer box side, pointing toward +x (or +y when vertical).
/// Square boxes have no longer side and fall back to the horizontal pairing.
fn long_side(corners: &[Point2; 4]) -> Result<LocalAxes, FrameIssue> {
    // From any corner, the farthest other corner is the diagonal and the two
    // remaining ones are the adjacent sides.
    let origin = corners[0];
    let mut others = [corners[1], corners[2], corners[3]];
    others.sort_by(|a, b| origin.distance(*a).total_cmp(&origin.distance(*b)));
    let short = others[0] - origin;
    let long = others[1] - origin;

    if (long.norm() - short.norm()).abs() < AXIS_EPSILON {
        return horizontal_pairing(corners);
    }
    let direction = if long.x < 0.0 || (long.x == 0.0 && long.y < 0.0) {
        long * -1.0
    } else {
        long
    };
    LocalAxes::from_direction(direction)
}
