// THEORY:
// The `Segmenter` is the first stage of the measurement pipeline. It turns a color
// frame into a binary mask of "specimen" pixels and knows nothing about shapes.
//
// Steps, in order:
// 1.  **HSV conversion**: 8-bit encoding with hue halved to 0..=179 so that a single
//     byte per channel holds the whole range. Thresholds are authored in this space.
// 2.  **Smoothing**: a Gaussian pre-filter over the HSV image suppresses sensor noise
//     before thresholding.
// 3.  **Thresholding**: a pixel is foreground when every channel sits inside the
//     configured inclusive range.
// 4.  **Cleanup**: a morphological open removes speckle, a close fills pinholes, and
//     an optional erosion shrinks the mask inward to undo color bleed at the
//     specimen edges.
//
// An empty mask is a valid result; the next stage reports it.

use crate::config::{ColorRange, PipelineConfig};
use image::{GrayImage, Luma, Rgb, RgbImage};
use imageproc::distance_transform::Norm;
use imageproc::filter::gaussian_blur_f32;
use imageproc::morphology;

/// Mask value for specimen pixels. Background is zero.
pub const FOREGROUND: u8 = 255;

/// Converts one RGB pixel to 8-bit HSV (`h` in 0..=179, `s` and `v` in 0..=255).
pub fn rgb_to_hsv(rgb: [u8; 3]) -> [u8; 3] {
    let [r, g, b] = rgb.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let saturation = if max > 0.0 { delta * 255.0 / max } else { 0.0 };
    let mut hue = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if hue < 0.0 {
        hue += 360.0;
    }

    // 360 degrees halve to 180, which wraps back to 0.
    let h = ((hue * 0.5).round() as u16 % 180) as u8;
    [h, saturation.round() as u8, max as u8]
}

/// Gaussian sigma for an odd kernel size when none is given explicitly.
fn sigma_for_kernel(kernel_size: u32) -> f32 {
    0.3 * ((kernel_size as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

/// Converts a color frame into a binary specimen mask.
#[derive(Debug, Clone)]
pub struct Segmenter {
    range: ColorRange,
    blur_sigma: Option<f32>,
    morph_radius: u8,
    erode_iterations: u32,
}

impl Segmenter {
    pub fn new(config: &PipelineConfig) -> Self {
        let blur_sigma = (config.blur_kernel_size > 1).then(|| sigma_for_kernel(config.blur_kernel_size));
        // An LInf ball of radius r is a (2r+1)-wide square; even sizes round down.
        let morph_radius = (config.morph_kernel_size / 2).min(u8::MAX as u32) as u8;
        Self {
            range: config.color,
            blur_sigma,
            morph_radius,
            erode_iterations: config.erode_iterations,
        }
    }

    pub fn segment(&self, frame: &RgbImage) -> GrayImage {
        let mut hsv = RgbImage::from_fn(frame.width(), frame.height(), |x, y| {
            Rgb(rgb_to_hsv(frame.get_pixel(x, y).0))
        });
        if let Some(sigma) = self.blur_sigma {
            hsv = gaussian_blur_f32(&hsv, sigma);
        }

        let mut mask = GrayImage::from_fn(hsv.width(), hsv.height(), |x, y| {
            if self.range.contains(hsv.get_pixel(x, y).0) {
                Luma([FOREGROUND])
            } else {
                Luma([0])
            }
        });

        if self.morph_radius > 0 {
            mask = morphology::open(&mask, Norm::LInf, self.morph_radius);
            mask = morphology::close(&mask, Norm::LInf, self.morph_radius);
            for _ in 0..self.erode_iterations {
                mask = morphology::erode(&mask, Norm::LInf, self.morph_radius);
            }
        }

        tracing::trace!(
            foreground = mask.pixels().filter(|p| p.0[0] == FOREGROUND).count(),
            "segmented frame"
        );
        mask
    }
}
