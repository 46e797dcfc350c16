// THEORY:
// Failures in this crate come in two very different flavours and are kept apart.
//
// 1.  **Run-level failures** (`VisionError`): the video source cannot be read, the
//     configuration file is malformed, a CSV sink refuses a write. These stop a run
//     and are propagated with `?` up to the caller.
// 2.  **Frame-level conditions** (`FrameIssue`): the specimen is missing from a frame,
//     its outline is too thin to fit a rectangle, or the configured trims eat the
//     whole specimen. These never stop a run. They are absorbed into zeroed
//     measurement fields and kept on the record as a diagnostic flag, so the output
//     series never has gaps.

use std::fmt;

pub type Result<T> = std::result::Result<T, VisionError>;

/// Errors that abort a measurement run.
#[derive(Debug)]
pub enum VisionError {
    /// Reading frames, config files or writing outputs failed.
    Io(std::io::Error),
    /// A still frame could not be decoded or an overlay could not be encoded.
    Image(image::ImageError),
    /// The TOML configuration could not be parsed.
    ConfigParse(toml::de::Error),
    /// The configuration parsed but holds values the pipeline cannot use.
    InvalidConfig(String),
    /// A CSV record could not be written.
    Csv(csv::Error),
    /// A measurement reached the emitter out of frame order.
    OutOfOrder { expected: u64, got: u64 },
    /// The parallel worker pool dropped a task or its reply.
    WorkerPool(&'static str),
}

impl fmt::Display for VisionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Image(e) => write!(f, "image error: {}", e),
            Self::ConfigParse(e) => write!(f, "could not parse configuration: {}", e),
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
            Self::Csv(e) => write!(f, "csv error: {}", e),
            Self::OutOfOrder { expected, got } => {
                write!(f, "measurement out of order: expected frame {}, got {}", expected, got)
            }
            Self::WorkerPool(msg) => write!(f, "worker pool failure: {}", msg),
        }
    }
}

impl std::error::Error for VisionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image(e) => Some(e),
            Self::ConfigParse(e) => Some(e),
            Self::Csv(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for VisionError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<image::ImageError> for VisionError {
    fn from(e: image::ImageError) -> Self {
        Self::Image(e)
    }
}

impl From<toml::de::Error> for VisionError {
    fn from(e: toml::de::Error) -> Self {
        Self::ConfigParse(e)
    }
}

impl From<csv::Error> for VisionError {
    fn from(e: csv::Error) -> Self {
        Self::Csv(e)
    }
}

/// A non-fatal condition that zeroes some or all of a frame's measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameIssue {
    /// The mask holds no foreground region. Every field is zero.
    NoForegroundFound,
    /// The selected outline cannot support a rectangle fit. Every field is zero.
    DegenerateGeometry,
    /// The box corners have no measurable spread along the resolved axis.
    /// Offset fields are zero, full-box fields are still reported.
    DegenerateAxis,
    /// The requested trims consume the whole longitudinal extent.
    /// Offset fields are zero, full-box fields are still reported.
    OffsetExceedsExtent,
}

impl FrameIssue {
    /// Whether the full-box fields survive this condition.
    pub fn keeps_full_box(self) -> bool {
        matches!(self, Self::DegenerateAxis | Self::OffsetExceedsExtent)
    }

    /// Short label used in logs and diagnostic columns.
    pub fn label(self) -> &'static str {
        match self {
            Self::NoForegroundFound => "no_foreground",
            Self::DegenerateGeometry => "degenerate_geometry",
            Self::DegenerateAxis => "degenerate_axis",
            Self::OffsetExceedsExtent => "offset_exceeds_extent",
        }
    }
}

impl fmt::Display for FrameIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl std::error::Error for FrameIssue {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_axis_and_trim_issues_keep_the_full_box() {
        assert!(!FrameIssue::NoForegroundFound.keeps_full_box());
        assert!(!FrameIssue::DegenerateGeometry.keeps_full_box());
        assert!(FrameIssue::DegenerateAxis.keeps_full_box());
        assert!(FrameIssue::OffsetExceedsExtent.keeps_full_box());
    }

    #[test]
    fn out_of_order_message_names_both_frames() {
        let msg = VisionError::OutOfOrder { expected: 4, got: 7 }.to_string();
        assert!(msg.contains('4') && msg.contains('7'));
    }
}
