// THEORY:
// This file is the entry point for the `specimen_vision` library crate. It measures
// one elongated specimen per video frame: a color mask isolates the specimen, the
// largest region is boxed by its minimum-area rectangle, and that rectangle is
// trimmed at both ends by fixed offsets before the two measurements are logged.
//
// The stages live in `core_modules` and are composed by `pipeline` (sequential) and
// `parallel_pipeline` (fan-out over a worker pool, identical output). Everything a
// caller normally needs is re-exported here.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod frame_source;
pub mod output;
pub mod overlay;
pub mod parallel_pipeline;
pub mod pipeline;
pub mod series;

pub use config::{AxisPolicy, ColorRange, PipelineConfig};
pub use core_modules::measurement::{Measurement, MeasurementEmitter, MeasurementSink};
pub use error::{FrameIssue, Result, VisionError};
pub use frame_source::{Frame, FrameSource, ImageSequenceSource, MemorySource};
pub use output::MeasurementWriter;
pub use overlay::SnapshotWriter;
pub use parallel_pipeline::ParallelPipeline;
pub use pipeline::{FrameAnalysis, MeasurementSession, RunSummary, VisionPipeline};
