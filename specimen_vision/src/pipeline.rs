// THEORY:
// The `pipeline` module is the top-level API of the measurement engine. It wires the
// six stages together in a fixed order:
//
//     Segmenter -> ContourSelector -> OrientedBoxFitter -> AxisResolver
//               -> OffsetProjector -> FrameMeasurementEmitter
//
// `VisionPipeline::analyze` is a pure function of one frame's pixels and the
// configuration. It never fails: every degenerate condition is absorbed into a
// zeroed `Measurement` carrying a `FrameIssue`. That purity is what lets the
// parallel pipeline fan frames out freely.
//
// `MeasurementSession` owns the only cross-frame state there is: the emitter's frame
// counter, the output sink, and optionally a snapshot directory. It is also the seam
// for interactive calibration, where a harness swaps the configuration between
// frames.

use crate::config::PipelineConfig;
use crate::core_modules::axis_resolver::resolve_axes;
use crate::core_modules::contour::contour_selector;
use crate::core_modules::measurement::{Measurement, MeasurementEmitter, MeasurementSink};
use crate::core_modules::offset_projector::{OffsetBox, project_offset_box};
use crate::core_modules::oriented_box::OrientedBox;
use crate::core_modules::segmenter::Segmenter;
use crate::error::{FrameIssue, Result};
use crate::frame_source::{Frame, FrameSource};
use crate::overlay::SnapshotWriter;
use image::{GrayImage, RgbImage};

/// Everything the pipeline learned about one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameAnalysis {
    pub measurement: Measurement,
    /// The minimum-area rectangle, when one could be fitted.
    pub full_box: Option<OrientedBox>,
    /// The trimmed rectangle, when axis resolution and trimming succeeded.
    pub offset_box: Option<OffsetBox>,
}

impl FrameAnalysis {
    fn zeroed(frame_index: u64, issue: FrameIssue) -> Self {
        Self {
            measurement: Measurement::zeroed(frame_index, issue),
            full_box: None,
            offset_box: None,
        }
    }
}

/// The stateless per-frame measurement engine.
#[derive(Debug, Clone)]
pub struct VisionPipeline {
    config: PipelineConfig,
    segmenter: Segmenter,
}

impl VisionPipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let segmenter = Segmenter::new(&config);
        Ok(Self { config, segmenter })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The binary foreground mask for `frame`.
    pub fn mask(&self, frame: &RgbImage) -> GrayImage {
        self.segmenter.segment(frame)
    }

    /// Runs every stage on one frame.
    pub fn analyze(&self, frame_index: u64, frame: &RgbImage) -> FrameAnalysis {
        let mask = self.segmenter.segment(frame);
        self.analyze_mask(frame_index, &mask)
    }

    /// Runs every stage after segmentation on an already binarised mask.
    pub fn analyze_mask(&self, frame_index: u64, mask: &GrayImage) -> FrameAnalysis {
        let Some(contour) = contour_selector::select_largest(mask) else {
            return FrameAnalysis::zeroed(frame_index, FrameIssue::NoForegroundFound);
        };

        let full_box = match OrientedBox::fit_contour(&contour) {
            Ok(full_box) => full_box,
            Err(issue) => return FrameAnalysis::zeroed(frame_index, issue),
        };

        let offset_box = resolve_axes(&full_box.corners, self.config.axis_policy).and_then(|axes| {
            project_offset_box(
                &full_box.corners,
                &axes,
                self.config.left_offset_px,
                self.config.right_offset_px,
            )
        });

        let measurement = Measurement::from_stages(frame_index, &full_box, offset_box.as_ref().map_err(|issue| *issue));
        tracing::debug!(
            frame = frame_index,
            contour_points = contour.len(),
            width_full = measurement.width_full,
            height_full = measurement.height_full,
            height_offset = measurement.height_offset,
            angle = full_box.angle,
            "frame analysed"
        );

        FrameAnalysis {
            measurement,
            full_box: Some(full_box),
            offset_box: offset_box.ok(),
        }
    }
}

/// Totals for one pass over a frame source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    pub frames: u64,
    /// Frames emitted with at least one zeroed measurement.
    pub zeroed_frames: u64,
}

/// A sequential measurement run: one pipeline, one ordered output.
pub struct MeasurementSession<S: MeasurementSink> {
    pipeline: VisionPipeline,
    emitter: MeasurementEmitter<S>,
    snapshots: Option<SnapshotWriter>,
}

impl<S: MeasurementSink> MeasurementSession<S> {
    pub fn new(config: PipelineConfig, sink: S) -> Result<Self> {
        Ok(Self {
            pipeline: VisionPipeline::new(config)?,
            emitter: MeasurementEmitter::new(sink),
            snapshots: None,
        })
    }

    /// Saves an annotated snapshot of every processed frame.
    pub fn with_snapshots(mut self, snapshots: SnapshotWriter) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    pub fn pipeline(&self) -> &VisionPipeline {
        &self.pipeline
    }

    /// Replaces the configuration. Takes effect from the next frame; the frame
    /// counter is untouched.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<()> {
        self.pipeline = VisionPipeline::new(config)?;
        tracing::info!(next_frame = self.emitter.next_index(), "configuration updated");
        Ok(())
    }

    /// Measures `image` as the next frame in sequence.
    pub fn process(&mut self, image: &RgbImage) -> Result<FrameAnalysis> {
        let frame_index = self.emitter.next_index();
        self.process_indexed(frame_index, image)
    }

    /// Measures a frame that carries its own index. The index must be the next
    /// one in sequence.
    pub fn process_frame(&mut self, frame: &Frame) -> Result<FrameAnalysis> {
        self.process_indexed(frame.index, &frame.image)
    }

    fn process_indexed(&mut self, frame_index: u64, image: &RgbImage) -> Result<FrameAnalysis> {
        let analysis = self.pipeline.analyze(frame_index, image);
        self.emitter.emit(analysis.measurement)?;
        if let Some(snapshots) = &self.snapshots {
            snapshots.save(image, &analysis)?;
        }
        Ok(analysis)
    }

    /// Drains `source` until end-of-stream.
    pub fn run<F: FrameSource + ?Sized>(&mut self, source: &mut F) -> Result<RunSummary> {
        let first_frame = self.emitter.next_index();
        let zeroed_before = self.emitter.zeroed_frames();
        while let Some(frame) = source.next_frame()? {
            self.process_frame(&frame)?;
        }
        let summary = RunSummary {
            frames: self.emitter.next_index() - first_frame,
            zeroed_frames: self.emitter.zeroed_frames() - zeroed_before,
        };
        tracing::info!(frames = summary.frames, zeroed = summary.zeroed_frames, "run complete");
        Ok(summary)
    }

    /// Flushes the sink and hands it back.
    pub fn finish(self) -> Result<S> {
        self.emitter.finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::AxisPolicy;
    use crate::frame_source::MemorySource;
    use image::Rgb;

    pub(crate) const SPECIMEN: Rgb<u8> = Rgb([220, 30, 30]);
    pub(crate) const BACKDROP: Rgb<u8> = Rgb([30, 30, 30]);

    /// A dark frame with one saturated red block.
    pub(crate) fn frame_with_block(x: u32, y: u32, w: u32, h: u32) -> RgbImage {
        let mut img = RgbImage::from_pixel(320, 320, BACKDROP);
        for py in y..y + h {
            for px in x..x + w {
                img.put_pixel(px, py, SPECIMEN);
            }
        }
        img
    }

    /// Three horizontal 200x40 frames followed by two rotated a quarter turn.
    pub(crate) fn quarter_turn_sequence() -> Vec<RgbImage> {
        let mut frames: Vec<RgbImage> = (0..3).map(|_| frame_with_block(60, 140, 200, 40)).collect();
        frames.extend((0..2).map(|_| frame_with_block(140, 60, 40, 200)));
        frames
    }

    fn mask_config(left: f64, right: f64) -> PipelineConfig {
        // Morphology off so the mask is exactly the painted block.
        PipelineConfig {
            blur_kernel_size: 0,
            morph_kernel_size: 1,
            erode_iterations: 0,
            ..PipelineConfig::default()
        }
        .with_offsets(left, right)
    }

    fn run_sequence(config: PipelineConfig) -> Vec<Measurement> {
        let mut session = MeasurementSession::new(config, Vec::new()).unwrap();
        let summary = session.run(&mut MemorySource::new(quarter_turn_sequence())).unwrap();
        assert_eq!(summary.frames, 5);
        session.finish().unwrap()
    }

    #[test]
    fn horizontal_pairing_follows_the_image_axis_through_a_quarter_turn() {
        let records = run_sequence(mask_config(10.0, 10.0));
        let offsets: Vec<i64> = records.iter().map(|m| m.offset_row().2).collect();
        assert_eq!(offsets, vec![180, 180, 180, 20, 20]);
        for m in &records {
            assert_eq!((m.full_row().1, m.full_row().2), (40, 200));
        }
        assert_eq!(records[3].offset_row().1, 200);
    }

    #[test]
    fn long_side_policy_survives_a_quarter_turn() {
        let config = PipelineConfig {
            axis_policy: AxisPolicy::LongSide,
            ..mask_config(10.0, 10.0)
        };
        let offsets: Vec<i64> = run_sequence(config).iter().map(|m| m.offset_row().2).collect();
        assert_eq!(offsets, vec![180; 5]);
    }

    #[test]
    fn empty_frame_is_zeroed_and_counted() {
        let mut session = MeasurementSession::new(mask_config(0.0, 0.0), Vec::new()).unwrap();
        session.process(&RgbImage::from_pixel(64, 64, BACKDROP)).unwrap();
        let analysis = session.process(&frame_with_block(10, 10, 30, 8)).unwrap();
        assert_eq!(analysis.measurement.frame_index, 1);

        let records = session.finish().unwrap();
        assert_eq!(records[0].full_row(), (0, 0, 0));
        assert_eq!(records[0].offset_row(), (0, 0, 0));
        assert_eq!(records[0].issue, Some(FrameIssue::NoForegroundFound));
        assert_eq!(records[1].full_row(), (1, 8, 30));
    }

    #[test]
    fn saturated_offsets_keep_the_full_box() {
        let pipeline = VisionPipeline::new(mask_config(100.0, 100.0)).unwrap();
        let analysis = pipeline.analyze(0, &frame_with_block(60, 140, 200, 40));
        assert_eq!(analysis.measurement.full_row(), (0, 40, 200));
        assert_eq!(analysis.measurement.offset_row(), (0, 0, 0));
        assert_eq!(analysis.measurement.issue, Some(FrameIssue::OffsetExceedsExtent));
        assert!(analysis.full_box.is_some());
        assert!(analysis.offset_box.is_none());
    }

    #[test]
    fn single_pixel_region_is_still_a_rectangle() {
        let pipeline = VisionPipeline::new(mask_config(0.0, 0.0)).unwrap();
        let analysis = pipeline.analyze(0, &frame_with_block(5, 5, 1, 1));
        assert_eq!(analysis.measurement.full_row(), (0, 1, 1));
        assert_eq!(analysis.measurement.issue, Some(FrameIssue::OffsetExceedsExtent));
    }

    #[test]
    fn default_morphology_keeps_a_large_block_measurable() {
        let pipeline = VisionPipeline::new(PipelineConfig::default()).unwrap();
        let analysis = pipeline.analyze(0, &frame_with_block(60, 140, 200, 40));
        assert_eq!(analysis.measurement.issue, None);
        let (_, width, height) = analysis.measurement.full_row();
        assert!((30..=40).contains(&width), "width {width}");
        assert!((190..=200).contains(&height), "height {height}");
    }

    #[test]
    fn bars_meeting_at_a_corner_are_boxed_together() {
        let mut frame = frame_with_block(10, 20, 100, 40);
        for y in 60..100 {
            for x in 110..210 {
                frame.put_pixel(x, y, SPECIMEN);
            }
        }
        let pipeline = VisionPipeline::new(mask_config(0.0, 0.0)).unwrap();
        let analysis = pipeline.analyze(0, &frame);
        assert_eq!(analysis.measurement.issue, None);
        // A single bar would be boxed at 100 px long.
        assert!(analysis.measurement.height_full > 150.0);
    }

    #[test]
    fn config_changes_apply_from_the_next_frame() {
        let mut session = MeasurementSession::new(mask_config(0.0, 0.0), Vec::new()).unwrap();
        let block = frame_with_block(60, 140, 200, 40);
        session.process(&block).unwrap();
        session.set_config(mask_config(25.0, 5.0)).unwrap();
        session.process(&block).unwrap();
        let heights: Vec<i64> = session.finish().unwrap().iter().map(|m| m.offset_row().2).collect();
        assert_eq!(heights, vec![200, 170]);
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = mask_config(-1.0, 0.0);
        assert!(VisionPipeline::new(config).is_err());
    }
}
