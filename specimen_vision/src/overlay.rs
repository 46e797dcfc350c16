// THEORY:
// Snapshots are the human check on the numbers. Each one is the input frame with the
// full oriented box outlined in green and the trimmed box in yellow, so a reviewer can
// see at a glance whether the mask found the specimen and whether the offsets bite
// where they should.

use crate::core_modules::geometry::Point2;
use crate::error::Result;
use crate::pipeline::FrameAnalysis;
use image::{Rgb, RgbImage};
use imageproc::drawing::draw_line_segment_mut;
use std::path::{Path, PathBuf};

pub const FULL_BOX_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
pub const OFFSET_BOX_COLOR: Rgb<u8> = Rgb([255, 255, 0]);

/// Outlines a closed quadrilateral.
pub fn draw_quad_mut(canvas: &mut RgbImage, corners: &[Point2; 4], color: Rgb<u8>) {
    for i in 0..corners.len() {
        let a = corners[i];
        let b = corners[(i + 1) % corners.len()];
        draw_line_segment_mut(canvas, (a.x as f32, a.y as f32), (b.x as f32, b.y as f32), color);
    }
}

/// A copy of `frame` with the analysed boxes drawn on top.
pub fn annotate(frame: &RgbImage, analysis: &FrameAnalysis) -> RgbImage {
    let mut canvas = frame.clone();
    if let Some(full_box) = &analysis.full_box {
        draw_quad_mut(&mut canvas, &full_box.corners, FULL_BOX_COLOR);
    }
    if let Some(offset_box) = &analysis.offset_box {
        draw_quad_mut(&mut canvas, &offset_box.corners, OFFSET_BOX_COLOR);
    }
    canvas
}

/// Writes annotated frames as `frame_NNNN.png` into one directory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    /// Creates the directory if needed.
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(dir.as_ref())?;
        Ok(Self {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn path_for(&self, frame_index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:04}.png", frame_index))
    }

    pub fn save(&self, frame: &RgbImage, analysis: &FrameAnalysis) -> Result<PathBuf> {
        let path = self.path_for(analysis.measurement.frame_index);
        annotate(frame, analysis).save(&path)?;
        tracing::debug!(path = %path.display(), "snapshot saved");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::VisionPipeline;
    use crate::pipeline::tests::frame_with_block;

    fn pipeline_with_offsets(left: f64, right: f64) -> VisionPipeline {
        let config = PipelineConfig {
            blur_kernel_size: 0,
            morph_kernel_size: 1,
            erode_iterations: 0,
            ..PipelineConfig::default()
        }
        .with_offsets(left, right);
        VisionPipeline::new(config).unwrap()
    }

    #[test]
    fn boxes_are_drawn_in_their_colors() {
        let frame = frame_with_block(60, 140, 200, 40);
        let analysis = pipeline_with_offsets(20.0, 20.0).analyze(0, &frame);
        let annotated = annotate(&frame, &analysis);

        // Left end of the full box, and a trimmed end 20 px inside it.
        assert_eq!(*annotated.get_pixel(60, 160), FULL_BOX_COLOR);
        assert_eq!(*annotated.get_pixel(80, 160), OFFSET_BOX_COLOR);
        assert_eq!(*annotated.get_pixel(160, 160), *frame.get_pixel(160, 160));
    }

    #[test]
    fn snapshots_are_named_by_frame_index() {
        let dir = std::env::temp_dir().join(format!("specimen_vision_snap_{}", std::process::id()));
        let writer = SnapshotWriter::create(&dir).unwrap();
        let frame = frame_with_block(60, 140, 200, 40);
        let analysis = pipeline_with_offsets(0.0, 0.0).analyze(7, &frame);

        let path = writer.save(&frame, &analysis).unwrap();
        assert_eq!(path, dir.join("frame_0007.png"));
        let reloaded = image::open(&path).unwrap().to_rgb8();
        assert_eq!(reloaded.dimensions(), frame.dimensions());
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
