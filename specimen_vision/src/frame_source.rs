// THEORY:
// Frames come from an external reader (a video decoder, a folder of exported stills,
// a test fixture). The pipeline only needs one thing from it: the next frame with a
// stable ordinal index, or a clean end-of-stream. `FrameSource` is that seam.

use crate::error::Result;
use image::RgbImage;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// An immutable color frame and its ordinal position in the stream.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub image: RgbImage,
}

/// A producer of frames in index order. `Ok(None)` ends the stream normally.
pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

const STILL_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff"];

/// Still images in a directory, read in file-name order.
pub struct ImageSequenceSource {
    paths: VecDeque<PathBuf>,
    next_index: u64,
}

impl ImageSequenceSource {
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_still = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| STILL_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()));
            if path.is_file() && is_still {
                paths.push(path);
            }
        }
        paths.sort();
        tracing::info!(dir = %dir.as_ref().display(), frames = paths.len(), "opened image sequence");
        Ok(Self {
            paths: paths.into(),
            next_index: 0,
        })
    }

    pub fn remaining(&self) -> usize {
        self.paths.len()
    }
}

impl FrameSource for ImageSequenceSource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.pop_front() else {
            return Ok(None);
        };
        let image = image::open(&path)?.to_rgb8();
        let frame = Frame {
            index: self.next_index,
            image,
        };
        self.next_index += 1;
        Ok(Some(frame))
    }
}

/// Frames that are already decoded in memory.
#[derive(Debug, Default)]
pub struct MemorySource {
    images: VecDeque<RgbImage>,
    next_index: u64,
}

impl MemorySource {
    pub fn new(images: impl IntoIterator<Item = RgbImage>) -> Self {
        Self {
            images: images.into_iter().collect(),
            next_index: 0,
        }
    }
}

impl FrameSource for MemorySource {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.images.pop_front().map(|image| {
            let frame = Frame {
                index: self.next_index,
                image,
            };
            self.next_index += 1;
            frame
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn memory_source_numbers_frames_from_zero() {
        let mut source = MemorySource::new((0..3).map(|_| RgbImage::new(4, 4)));
        let indices: Vec<u64> = std::iter::from_fn(|| source.next_frame().unwrap())
            .map(|f| f.index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn image_sequence_reads_stills_in_name_order() {
        let dir = std::env::temp_dir().join(format!("specimen_vision_seq_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        for (name, shade) in [("frame_0002.png", 20u8), ("frame_0000.png", 0), ("frame_0001.png", 10)] {
            RgbImage::from_pixel(3, 2, Rgb([shade, shade, shade]))
                .save(dir.join(name))
                .unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let mut source = ImageSequenceSource::open(&dir).unwrap();
        assert_eq!(source.remaining(), 3);
        let mut shades = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!(frame.index, shades.len() as u64);
            shades.push(frame.image.get_pixel(0, 0).0[0]);
        }
        assert_eq!(shades, vec![0, 10, 20]);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
