// THEORY:
// Two parallel CSV streams leave the pipeline, one row per frame in frame order:
//
//     full box:    frame_index,width_full_px,height_full_px
//     offset box:  frame_index,width_offset_px,height_offset_px
//
// Downstream tooling joins them row for row and keys the offset stream by
// `frame_index / fps`, so a missing or repeated row would silently misalign every
// later sample. The writer therefore refuses anything but the next index.

use crate::core_modules::measurement::{Measurement, MeasurementSink};
use crate::error::{Result, VisionError};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const FULL_BOX_HEADER: [&str; 3] = ["frame_index", "width_full_px", "height_full_px"];
pub const OFFSET_BOX_HEADER: [&str; 3] = ["frame_index", "width_offset_px", "height_offset_px"];

/// Writes the full-box and offset-box series.
pub struct MeasurementWriter<W: Write> {
    full: csv::Writer<W>,
    offset: csv::Writer<W>,
    next_index: Option<u64>,
}

impl MeasurementWriter<BufWriter<File>> {
    /// Creates (or truncates) both files.
    pub fn create(full_path: impl AsRef<Path>, offset_path: impl AsRef<Path>) -> Result<Self> {
        let full = BufWriter::new(File::create(full_path.as_ref())?);
        let offset = BufWriter::new(File::create(offset_path.as_ref())?);
        tracing::info!(
            full = %full_path.as_ref().display(),
            offset = %offset_path.as_ref().display(),
            "writing measurement series"
        );
        Self::new(full, offset)
    }
}

impl<W: Write> MeasurementWriter<W> {
    /// Wraps two writers and emits the header rows.
    pub fn new(full: W, offset: W) -> Result<Self> {
        let mut full = csv::WriterBuilder::new().has_headers(false).from_writer(full);
        let mut offset = csv::WriterBuilder::new().has_headers(false).from_writer(offset);
        full.write_record(FULL_BOX_HEADER)?;
        offset.write_record(OFFSET_BOX_HEADER)?;
        Ok(Self {
            full,
            offset,
            next_index: None,
        })
    }

    pub fn write(&mut self, measurement: &Measurement) -> Result<()> {
        if let Some(expected) = self.next_index {
            if measurement.frame_index != expected {
                return Err(VisionError::OutOfOrder {
                    expected,
                    got: measurement.frame_index,
                });
            }
        }
        // Both rows are formatted before either stream is touched.
        let full = row_record(measurement.full_row());
        let offset = row_record(measurement.offset_row());
        self.full.write_byte_record(&full)?;
        self.offset.write_byte_record(&offset)?;
        self.next_index = Some(measurement.frame_index + 1);
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.full.flush()?;
        self.offset.flush()?;
        Ok(())
    }

    /// Flushes and returns the two underlying writers as `(full, offset)`.
    pub fn into_inner(self) -> Result<(W, W)> {
        let full = self.full.into_inner().map_err(|e| VisionError::Io(e.into_error()))?;
        let offset = self.offset.into_inner().map_err(|e| VisionError::Io(e.into_error()))?;
        Ok((full, offset))
    }
}

fn row_record((frame_index, width, height): (u64, i64, i64)) -> csv::ByteRecord {
    csv::ByteRecord::from(vec![frame_index.to_string(), width.to_string(), height.to_string()])
}

impl<W: Write> MeasurementSink for MeasurementWriter<W> {
    fn accept(&mut self, measurement: &Measurement) -> Result<()> {
        self.write(measurement)
    }

    fn finish(&mut self) -> Result<()> {
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FrameIssue;

    fn record(frame_index: u64, height_offset: f64) -> Measurement {
        Measurement {
            frame_index,
            width_full: 40.7,
            height_full: 200.0,
            width_offset: 40.7,
            height_offset,
            issue: None,
        }
    }

    fn as_text(bytes: Vec<u8>) -> String {
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn writes_both_series_with_headers() {
        let mut writer = MeasurementWriter::new(Vec::new(), Vec::new()).unwrap();
        writer.write(&record(0, 180.0)).unwrap();
        writer.write(&Measurement::zeroed(1, FrameIssue::NoForegroundFound)).unwrap();
        writer.write(&record(2, 179.0)).unwrap();
        let (full, offset) = writer.into_inner().unwrap();

        assert_eq!(
            as_text(full),
            "frame_index,width_full_px,height_full_px\n0,40,200\n1,0,0\n2,40,200\n"
        );
        assert_eq!(
            as_text(offset),
            "frame_index,width_offset_px,height_offset_px\n0,40,180\n1,0,0\n2,40,179\n"
        );
    }

    #[test]
    fn rejects_out_of_order_rows() {
        let mut writer = MeasurementWriter::new(Vec::new(), Vec::new()).unwrap();
        writer.write(&record(4, 180.0)).unwrap();
        assert!(matches!(
            writer.write(&record(6, 180.0)),
            Err(VisionError::OutOfOrder { expected: 5, got: 6 })
        ));
    }

    #[test]
    fn rejected_rows_leave_both_series_aligned() {
        let mut writer = MeasurementWriter::new(Vec::new(), Vec::new()).unwrap();
        writer.write(&record(0, 180.0)).unwrap();
        assert!(writer.write(&record(2, 170.0)).is_err());
        writer.write(&record(1, 175.0)).unwrap();
        let (full, offset) = writer.into_inner().unwrap();

        let full = as_text(full);
        let offset = as_text(offset);
        assert_eq!(full.lines().count(), 3);
        assert_eq!(offset.lines().count(), 3);
        let frames = |text: &str| -> Vec<String> {
            text.lines().skip(1).map(|l| l.split(',').next().unwrap().to_string()).collect()
        };
        assert_eq!(frames(&full), frames(&offset));
        assert_eq!(offset.lines().last(), Some("1,40,175"));
    }

    #[test]
    fn create_writes_files() {
        let dir = std::env::temp_dir().join(format!("specimen_vision_csv_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let full_path = dir.join("full.csv");
        let offset_path = dir.join("offset.csv");

        let mut writer = MeasurementWriter::create(&full_path, &offset_path).unwrap();
        writer.accept(&record(0, 150.0)).unwrap();
        writer.finish().unwrap();
        drop(writer);

        let offset = std::fs::read_to_string(&offset_path).unwrap();
        assert_eq!(offset.lines().nth(1), Some("0,40,150"));
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
