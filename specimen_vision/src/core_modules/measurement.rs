// THEORY:
// The `FrameMeasurementEmitter` is the last stage of the pipeline. Every processed
// frame produces exactly one `Measurement`, even when an upstream stage found
// nothing usable: the affected fields are zero and the reason is kept in `issue`.
// Records leave in strictly increasing, gap-free frame order so the full-box and
// offset-box series stay aligned row for row.

use crate::core_modules::offset_projector::OffsetBox;
use crate::core_modules::oriented_box::OrientedBox;
use crate::error::{FrameIssue, Result, VisionError};

/// The finalized result for one frame. Never mutated after emission.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub frame_index: u64,
    /// Shorter side of the oriented box.
    pub width_full: f64,
    /// Longer side of the oriented box.
    pub height_full: f64,
    /// Transverse extent of the offset box.
    pub width_offset: f64,
    /// Trimmed longitudinal extent of the offset box.
    pub height_offset: f64,
    /// Why some fields are zero, if any are.
    pub issue: Option<FrameIssue>,
}

impl Measurement {
    /// A record whose fields are all zero because of `issue`.
    pub fn zeroed(frame_index: u64, issue: FrameIssue) -> Self {
        Self {
            frame_index,
            width_full: 0.0,
            height_full: 0.0,
            width_offset: 0.0,
            height_offset: 0.0,
            issue: Some(issue),
        }
    }

    /// Combines the per-frame stage outputs into a record.
    pub fn from_stages(
        frame_index: u64,
        full_box: &OrientedBox,
        offset_box: std::result::Result<&OffsetBox, FrameIssue>,
    ) -> Self {
        let (width_full, height_full) = full_box.short_long();
        let (width_offset, height_offset, issue) = match offset_box {
            Ok(offset) => (offset.width, offset.height, None),
            Err(issue) => (0.0, 0.0, Some(issue)),
        };
        Self {
            frame_index,
            width_full,
            height_full,
            width_offset,
            height_offset,
            issue,
        }
    }

    /// `(frame_index, width_full_px, height_full_px)` as integer pixels.
    pub fn full_row(&self) -> (u64, i64, i64) {
        (self.frame_index, whole_pixels(self.width_full), whole_pixels(self.height_full))
    }

    /// `(frame_index, width_offset_px, height_offset_px)` as integer pixels.
    pub fn offset_row(&self) -> (u64, i64, i64) {
        (self.frame_index, whole_pixels(self.width_offset), whole_pixels(self.height_offset))
    }
}

/// Truncates toward zero, as pixel counts are logged.
fn whole_pixels(value: f64) -> i64 {
    value.trunc() as i64
}

/// A destination for measurement records.
pub trait MeasurementSink {
    fn accept(&mut self, measurement: &Measurement) -> Result<()>;

    /// Flushes anything buffered. Called once after the last record.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

impl MeasurementSink for Vec<Measurement> {
    fn accept(&mut self, measurement: &Measurement) -> Result<()> {
        self.push(*measurement);
        Ok(())
    }
}

impl<S: MeasurementSink + ?Sized> MeasurementSink for &mut S {
    fn accept(&mut self, measurement: &Measurement) -> Result<()> {
        (**self).accept(measurement)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }
}

/// Forwards measurements to a sink in gap-free frame order.
pub struct MeasurementEmitter<S: MeasurementSink> {
    sink: S,
    next_index: u64,
    zeroed_frames: u64,
}

impl<S: MeasurementSink> MeasurementEmitter<S> {
    pub fn new(sink: S) -> Self {
        Self::starting_at(sink, 0)
    }

    /// An emitter whose first expected record is `first_index`.
    pub fn starting_at(sink: S, first_index: u64) -> Self {
        Self {
            sink,
            next_index: first_index,
            zeroed_frames: 0,
        }
    }

    pub fn emit(&mut self, measurement: Measurement) -> Result<()> {
        if measurement.frame_index != self.next_index {
            return Err(VisionError::OutOfOrder {
                expected: self.next_index,
                got: measurement.frame_index,
            });
        }
        if let Some(issue) = measurement.issue {
            self.zeroed_frames += 1;
            tracing::warn!(frame = measurement.frame_index, %issue, "frame measured with zeroed fields");
        }
        self.sink.accept(&measurement)?;
        self.next_index += 1;
        Ok(())
    }

    /// Index the next record must carry.
    pub fn next_index(&self) -> u64 {
        self.next_index
    }

    /// Number of records emitted with at least one zeroed field.
    pub fn zeroed_frames(&self) -> u64 {
        self.zeroed_frames
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Flushes the sink and hands it back.
    pub fn finish(mut self) -> Result<S> {
        self.sink.finish()?;
        Ok(self.sink)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_modules::geometry::Point2;

    fn measured(frame_index: u64) -> Measurement {
        Measurement {
            frame_index,
            width_full: 40.9,
            height_full: 200.2,
            width_offset: 40.9,
            height_offset: 180.0,
            issue: None,
        }
    }

    #[test]
    fn emitter_accepts_consecutive_frames() {
        let mut emitter = MeasurementEmitter::new(Vec::new());
        for i in 0..5 {
            emitter.emit(measured(i)).unwrap();
        }
        assert_eq!(emitter.next_index(), 5);
        let records = emitter.finish().unwrap();
        assert_eq!(records.iter().map(|m| m.frame_index).collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn emitter_rejects_gaps_and_repeats() {
        let mut emitter = MeasurementEmitter::new(Vec::new());
        emitter.emit(measured(0)).unwrap();
        assert!(matches!(
            emitter.emit(measured(2)),
            Err(VisionError::OutOfOrder { expected: 1, got: 2 })
        ));
        assert!(matches!(
            emitter.emit(measured(0)),
            Err(VisionError::OutOfOrder { expected: 1, got: 0 })
        ));
        assert_eq!(emitter.sink().len(), 1);
    }

    #[test]
    fn zeroed_records_still_advance_the_counter() {
        let mut emitter = MeasurementEmitter::new(Vec::new());
        emitter.emit(Measurement::zeroed(0, FrameIssue::NoForegroundFound)).unwrap();
        emitter.emit(measured(1)).unwrap();
        assert_eq!(emitter.next_index(), 2);
        assert_eq!(emitter.zeroed_frames(), 1);
    }

    #[test]
    fn rows_truncate_to_whole_pixels() {
        let m = measured(3);
        assert_eq!(m.full_row(), (3, 40, 200));
        assert_eq!(m.offset_row(), (3, 40, 180));
        assert_eq!(Measurement::zeroed(9, FrameIssue::DegenerateGeometry).offset_row(), (9, 0, 0));
    }

    #[test]
    fn trimming_failure_keeps_full_box_fields() {
        let full_box = OrientedBox::fit(&[
            Point2::new(0.0, 0.0),
            Point2::new(200.0, 0.0),
            Point2::new(200.0, 40.0),
            Point2::new(0.0, 40.0),
        ])
        .unwrap();
        let m = Measurement::from_stages(7, &full_box, Err(FrameIssue::OffsetExceedsExtent));
        assert_eq!(m.full_row(), (7, 40, 200));
        assert_eq!(m.offset_row(), (7, 0, 0));
        assert_eq!(m.issue, Some(FrameIssue::OffsetExceedsExtent));
    }
}
