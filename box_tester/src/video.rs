// THEORY:
// Video decoding is delegated to OpenCV, as it is in the rest of our tooling. Frames
// arrive as BGR `Mat`s and are converted to RGB before they cross into the library,
// which only ever sees `image::RgbImage`.

use opencv::{
    core::Mat,
    imgproc,
    prelude::*,
    videoio::{self, VideoCapture},
};
use specimen_vision::{Frame, FrameSource, Result, VisionError};
use std::path::Path;

pub struct VideoSource {
    capture: VideoCapture,
    next_index: u64,
    fps: f64,
}

fn cv_error(e: opencv::Error) -> VisionError {
    VisionError::Io(std::io::Error::other(e.to_string()))
}

impl VideoSource {
    pub fn open(path: &Path) -> Result<Self> {
        let capture = VideoCapture::from_file(&path.to_string_lossy(), videoio::CAP_ANY).map_err(cv_error)?;
        if !capture.is_opened().map_err(cv_error)? {
            return Err(VisionError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("could not open video {}", path.display()),
            )));
        }
        let fps = capture.get(videoio::CAP_PROP_FPS).map_err(cv_error)?;
        tracing::info!(path = %path.display(), "opened video");
        Ok(Self {
            capture,
            next_index: 0,
            fps,
        })
    }

    /// Capture rate reported by the container, or 0 when unknown.
    pub fn fps(&self) -> f64 {
        self.fps
    }
}

impl FrameSource for VideoSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let mut bgr = Mat::default();
        if !self.capture.read(&mut bgr).map_err(cv_error)? || bgr.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(&bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0).map_err(cv_error)?;
        let (width, height) = (rgb.cols() as u32, rgb.rows() as u32);
        let bytes = rgb.data_bytes().map_err(cv_error)?.to_vec();
        let image = image::RgbImage::from_raw(width, height, bytes).ok_or_else(|| {
            VisionError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("frame {} has an unexpected buffer size", self.next_index),
            ))
        })?;

        let frame = Frame {
            index: self.next_index,
            image,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}
