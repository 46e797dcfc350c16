// THEORY:
// A run is driven by one immutable `PipelineConfig`. Every frame is measured
// against the config it was handed, which keeps the per-frame computation a pure
// function of (config, pixels). An interactive calibration harness is free to swap
// the config between frames; nothing inside the pipeline caches it.

use crate::error::{Result, VisionError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest hue value in the 8-bit HSV encoding (hue is stored halved, 0..=179).
pub const HUE_MAX: u8 = 179;

/// Inclusive per-channel HSV bounds that define "specimen" pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorRange {
    /// Lower bound as `[hue, saturation, value]`.
    pub lower: [u8; 3],
    /// Upper bound as `[hue, saturation, value]`.
    pub upper: [u8; 3],
}

impl Default for ColorRange {
    fn default() -> Self {
        Self {
            lower: [0, 158, 62],
            upper: [HUE_MAX, 255, 255],
        }
    }
}

impl ColorRange {
    pub fn contains(&self, hsv: [u8; 3]) -> bool {
        (0..3).all(|c| hsv[c] >= self.lower[c] && hsv[c] <= self.upper[c])
    }
}

/// How the longitudinal axis is chosen from the four box corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisPolicy {
    /// Pair corners by image x-coordinate and run the axis from the left pair's
    /// centroid to the right pair's. Assumes the specimen stays closer to
    /// horizontal than vertical.
    #[default]
    ImageHorizontal,
    /// Run the axis along the box's longer side. Stable under any rotation.
    LongSide,
}

/// Configuration for the measurement pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub color: ColorRange,
    /// Gaussian pre-filter kernel edge in pixels. Values of 1 or less disable it.
    pub blur_kernel_size: u32,
    /// Square structuring element edge used by open, close and erode.
    pub morph_kernel_size: u32,
    /// Erosion passes applied after the open+close cleanup.
    pub erode_iterations: u32,
    /// Length trimmed from the left end of the specimen, in pixels.
    pub left_offset_px: f64,
    /// Length trimmed from the right end of the specimen, in pixels.
    pub right_offset_px: f64,
    pub axis_policy: AxisPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            color: ColorRange::default(),
            blur_kernel_size: 5,
            morph_kernel_size: 3,
            erode_iterations: 3,
            left_offset_px: 0.0,
            right_offset_px: 0.0,
            axis_policy: AxisPolicy::default(),
        }
    }
}

impl PipelineConfig {
    /// Parses and validates a TOML document. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_toml_str(&text)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "loaded pipeline config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (channel, name) in ["hue", "saturation", "value"].iter().enumerate() {
            if self.color.lower[channel] > self.color.upper[channel] {
                return Err(VisionError::InvalidConfig(format!(
                    "{} lower bound {} exceeds upper bound {}",
                    name, self.color.lower[channel], self.color.upper[channel]
                )));
            }
        }
        if self.color.upper[0] > HUE_MAX {
            return Err(VisionError::InvalidConfig(format!(
                "hue upper bound {} exceeds {}",
                self.color.upper[0], HUE_MAX
            )));
        }
        for (value, name) in [
            (self.left_offset_px, "left_offset_px"),
            (self.right_offset_px, "right_offset_px"),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(VisionError::InvalidConfig(format!(
                    "{} must be a finite, non-negative length (got {})",
                    name, value
                )));
            }
        }
        Ok(())
    }

    pub fn with_offsets(mut self, left_offset_px: f64, right_offset_px: f64) -> Self {
        self.left_offset_px = left_offset_px;
        self.right_offset_px = right_offset_px;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_yields_batch_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.color.lower, [0, 158, 62]);
        assert_eq!(config.erode_iterations, 3);
        assert_eq!(config.axis_policy, AxisPolicy::ImageHorizontal);
    }

    #[test]
    fn partial_document_overrides_only_named_keys() {
        let config = PipelineConfig::from_toml_str(
            r#"
            left_offset_px = 12.5
            right_offset_px = 30
            axis_policy = "long_side"

            [color]
            lower = [40, 80, 80]
            upper = [80, 255, 255]
            "#,
        )
        .unwrap();
        assert_eq!(config.left_offset_px, 12.5);
        assert_eq!(config.right_offset_px, 30.0);
        assert_eq!(config.axis_policy, AxisPolicy::LongSide);
        assert_eq!(config.color.lower, [40, 80, 80]);
        assert_eq!(config.morph_kernel_size, 3);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = PipelineConfig::from_toml_str(
            r#"
            [color]
            lower = [90, 0, 0]
            upper = [80, 255, 255]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, VisionError::InvalidConfig(_)));
    }

    #[test]
    fn hue_above_encoding_range_is_rejected() {
        let mut config = PipelineConfig::default();
        config.color.upper[0] = 200;
        assert!(matches!(config.validate(), Err(VisionError::InvalidConfig(_))));
    }

    #[test]
    fn negative_offsets_are_rejected() {
        let config = PipelineConfig::default().with_offsets(-1.0, 0.0);
        assert!(matches!(config.validate(), Err(VisionError::InvalidConfig(_))));
    }

    #[test]
    fn malformed_toml_surfaces_a_parse_error() {
        let err = PipelineConfig::from_toml_str("left_offset_px = [").unwrap_err();
        assert!(matches!(err, VisionError::ConfigParse(_)));
    }

    #[test]
    fn color_range_bounds_are_inclusive() {
        let range = ColorRange { lower: [10, 20, 30], upper: [10, 40, 30] };
        assert!(range.contains([10, 20, 30]));
        assert!(range.contains([10, 40, 30]));
        assert!(!range.contains([11, 30, 30]));
    }
}
