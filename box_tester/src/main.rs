// THEORY:
// `box_tester` is the command-line harness around `specimen_vision`. `measure` runs
// a whole recording (a directory of stills, or a video file when built with the
// `video` feature) and writes the full-box and offset-box CSV series. `inspect`
// runs a single still and saves the mask and annotated overlay, which is how
// thresholds and offsets get tuned before a batch run.

#[cfg(feature = "video")]
mod video;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use specimen_vision::{
    AxisPolicy, FrameSource, ImageSequenceSource, MeasurementEmitter, MeasurementSession, MeasurementWriter,
    ParallelPipeline, PipelineConfig, RunSummary, SnapshotWriter, VisionPipeline,
};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "box_tester")]
#[command(about = "Measure an elongated specimen frame by frame with an oriented bounding box")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    ImageHorizontal,
    LongSide,
}

impl From<AxisArg> for AxisPolicy {
    fn from(arg: AxisArg) -> Self {
        match arg {
            AxisArg::ImageHorizontal => AxisPolicy::ImageHorizontal,
            AxisArg::LongSide => AxisPolicy::LongSide,
        }
    }
}

#[derive(clap::Args)]
struct Tuning {
    /// TOML pipeline configuration. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Overrides `left_offset_px`.
    #[arg(long)]
    left_offset: Option<f64>,

    /// Overrides `right_offset_px`.
    #[arg(long)]
    right_offset: Option<f64>,

    /// Overrides `axis_policy`.
    #[arg(long, value_enum)]
    axis: Option<AxisArg>,
}

impl Tuning {
    fn resolve(&self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::load(path).with_context(|| format!("loading {}", path.display()))?,
            None => PipelineConfig::default(),
        };
        if let Some(left) = self.left_offset {
            config.left_offset_px = left;
        }
        if let Some(right) = self.right_offset {
            config.right_offset_px = right;
        }
        if let Some(axis) = self.axis {
            config.axis_policy = axis.into();
        }
        config.validate()?;
        Ok(config)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Measure every frame of a recording.
    Measure {
        /// Directory of still frames, or a video file (`video` feature).
        input: PathBuf,

        #[command(flatten)]
        tuning: Tuning,

        /// Full-box series output.
        #[arg(long, default_value = "full_box.csv")]
        full_csv: PathBuf,

        /// Offset-box series output.
        #[arg(long, default_value = "offset_box.csv")]
        offset_csv: PathBuf,

        /// Directory for annotated `frame_NNNN.png` snapshots.
        #[arg(long)]
        snapshots: Option<PathBuf>,

        /// Analyse frames on a worker pool.
        #[arg(long)]
        parallel: bool,

        /// Worker count for `--parallel`. Defaults to the number of cores.
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Measure a single still and save its mask and overlay.
    Inspect {
        /// Path to the input image.
        image: PathBuf,

        #[command(flatten)]
        tuning: Tuning,

        /// Where to write the annotated overlay.
        #[arg(long)]
        overlay: Option<PathBuf>,

        /// Where to write the binary mask.
        #[arg(long)]
        mask: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Measure {
            input,
            tuning,
            full_csv,
            offset_csv,
            snapshots,
            parallel,
            workers,
        } => {
            let config = tuning.resolve()?;
            let mut source = open_source(&input)?;
            let writer = MeasurementWriter::create(&full_csv, &offset_csv)?;
            let snapshots = snapshots.map(SnapshotWriter::create).transpose()?;

            let summary = if parallel {
                let workers = workers.unwrap_or_else(specimen_vision::parallel_pipeline::default_worker_count);
                run_parallel(config, source.as_mut(), writer, snapshots, workers).await?
            } else {
                run_sequential(config, source.as_mut(), writer, snapshots)?
            };

            tracing::info!(
                frames = summary.frames,
                zeroed = summary.zeroed_frames,
                full = %full_csv.display(),
                offset = %offset_csv.display(),
                "measurement finished"
            );
            Ok(())
        }
        Commands::Inspect {
            image,
            tuning,
            overlay,
            mask,
        } => run_inspect(&image, tuning.resolve()?, overlay.as_deref(), mask.as_deref()),
    }
}

fn open_source(input: &Path) -> Result<Box<dyn FrameSource>> {
    if input.is_dir() {
        return Ok(Box::new(ImageSequenceSource::open(input)?));
    }
    open_video(input)
}

#[cfg(feature = "video")]
fn open_video(input: &Path) -> Result<Box<dyn FrameSource>> {
    let source = video::VideoSource::open(input)?;
    let fps = source.fps();
    if fps > 0.0 {
        tracing::info!(fps, "capture rate; frame time is frame_index / fps");
    } else {
        tracing::warn!("video reports no capture rate; frame times cannot be derived");
    }
    Ok(Box::new(source))
}

#[cfg(not(feature = "video"))]
fn open_video(input: &Path) -> Result<Box<dyn FrameSource>> {
    anyhow::bail!(
        "{} is not a directory; reading video files needs box_tester built with `--features video`",
        input.display()
    )
}

fn run_sequential(
    config: PipelineConfig,
    source: &mut dyn FrameSource,
    writer: MeasurementWriter<std::io::BufWriter<std::fs::File>>,
    snapshots: Option<SnapshotWriter>,
) -> Result<RunSummary> {
    let mut session = MeasurementSession::new(config, writer)?;
    if let Some(snapshots) = snapshots {
        session = session.with_snapshots(snapshots);
    }
    let summary = session.run(source)?;
    session.finish()?;
    Ok(summary)
}

async fn run_parallel(
    config: PipelineConfig,
    source: &mut dyn FrameSource,
    writer: MeasurementWriter<std::io::BufWriter<std::fs::File>>,
    snapshots: Option<SnapshotWriter>,
    workers: usize,
) -> Result<RunSummary> {
    let pipeline = ParallelPipeline::with_snapshots(VisionPipeline::new(config)?, snapshots, workers);
    let mut emitter = MeasurementEmitter::new(writer);
    let summary = pipeline.process_all(source, &mut emitter).await?;
    pipeline.shutdown().await?;
    emitter.finish()?;
    Ok(summary)
}

fn run_inspect(image_path: &Path, config: PipelineConfig, overlay: Option<&Path>, mask: Option<&Path>) -> Result<()> {
    let frame = image::open(image_path)
        .with_context(|| format!("failed to open image {}", image_path.display()))?
        .to_rgb8();
    let pipeline = VisionPipeline::new(config)?;
    let analysis = pipeline.analyze(0, &frame);
    let m = analysis.measurement;

    match m.issue {
        Some(issue) => tracing::warn!(%issue, "measurement degraded"),
        None => tracing::info!("measurement complete"),
    }
    println!(
        "full box:   width {:.1} px, height {:.1} px",
        m.width_full, m.height_full
    );
    println!(
        "offset box: width {:.1} px, height {:.1} px",
        m.width_offset, m.height_offset
    );
    if let Some(full_box) = &analysis.full_box {
        println!(
            "angle {:.2} deg, center ({:.1}, {:.1})",
            full_box.angle, full_box.center.x, full_box.center.y
        );
    }

    if let Some(path) = overlay {
        specimen_vision::overlay::annotate(&frame, &analysis)
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "overlay saved");
    }
    if let Some(path) = mask {
        pipeline
            .mask(&frame)
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        tracing::info!(path = %path.display(), "mask saved");
    }
    Ok(())
}
