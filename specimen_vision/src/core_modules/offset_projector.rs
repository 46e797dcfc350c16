// THEORY:
// The `OffsetProjector` removes fixed end-effects (glued or clamped ends) from the
// measurement. It expresses the box corners in the specimen frame, trims the
// longitudinal extent by the configured left and right offsets, and rebuilds the
// trimmed quadrilateral in image coordinates.
//
// The trimmed length is floored to whole pixels. The width is the box's transverse
// extent, which longitudinal trimming never touches. When the offsets leave less
// than one pixel of specimen, the frame reports `OffsetExceedsExtent` instead of a
// sliver.

use crate::core_modules::axis_resolver::LocalAxes;
use crate::core_modules::geometry::Point2;
use crate::error::FrameIssue;

/// Length that must survive trimming, in pixels.
const MIN_REMAINING_LENGTH: f64 = 1.0;

/// The oriented box with both longitudinal ends trimmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OffsetBox {
    /// `(s_min', t_min)`, `(s_max', t_min)`, `(s_max', t_max)`, `(s_min', t_max)` in
    /// image coordinates.
    pub corners: [Point2; 4],
    /// Transverse extent of the untrimmed box.
    pub width: f64,
    /// Trimmed longitudinal extent, floored to whole pixels.
    pub height: f64,
}

/// Longitudinal and transverse extents of `corners` in the frame `axes`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extents {
    pub s_min: f64,
    pub s_max: f64,
    pub t_min: f64,
    pub t_max: f64,
}

impl Extents {
    pub fn of(corners: &[Point2; 4], axes: &LocalAxes) -> Self {
        let mut extents = Self {
            s_min: f64::INFINITY,
            s_max: f64::NEG_INFINITY,
            t_min: f64::INFINITY,
            t_max: f64::NEG_INFINITY,
        };
        for &corner in corners {
            let (s, t) = axes.project(corner);
            extents.s_min = extents.s_min.min(s);
            extents.s_max = extents.s_max.max(s);
            extents.t_min = extents.t_min.min(t);
            extents.t_max = extents.t_max.max(t);
        }
        extents
    }

    pub fn length(&self) -> f64 {
        self.s_max - self.s_min
    }

    pub fn width(&self) -> f64 {
        self.t_max - self.t_min
    }
}

/// Trims `left_offset` from the low-`s` end and `right_offset` from the high-`s`
/// end of the box. Offsets are lengths in pixels and must be non-negative.
pub fn project_offset_box(
    corners: &[Point2; 4],
    axes: &LocalAxes,
    left_offset: f64,
    right_offset: f64,
) -> Result<OffsetBox, FrameIssue> {
    let extents = Extents::of(corners, axes);
    let full_length = extents.length();
    if left_offset + right_offset >= full_length - MIN_REMAINING_LENGTH {
        tracing::debug!(
            full_length,
            left_offset,
            right_offset,
            "offsets consume the whole specimen"
        );
        return Err(FrameIssue::OffsetExceedsExtent);
    }

    let s_min = extents.s_min + left_offset;
    let s_max = extents.s_max - right_offset;
    let length = (s_max - s_min).floor().max(0.0);

    Ok(OffsetBox {
        corners: [
            axes.unproject(s_min, extents.t_min),
            axes.unproject(s_max, extents.t_min),
            axes.unproject(s_max, extents.t_max),
            axes.unproject(s_min, extents.t_max),
        ],
        width: extents.width(),
        height: length,
    })
}
