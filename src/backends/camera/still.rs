// SPDX-License-Identifier: GPL-3.0-only

//! Still image source
//!
//! Serves one decoded image over and over at a fixed cadence. Used on
//! development hosts without a sensor and to make tests deterministic.

use super::FrameSource;
use super::types::{Frame, PixelFormat};
use crate::errors::{SourceError, SourceResult};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Decode an image file into a packed frame
///
/// Luma images stay single-channel; everything else becomes RGB24.
pub fn load_image_frame(path: &Path) -> SourceResult<Frame> {
    let img = image::open(path)
        .map_err(|e| SourceError::Unavailable(format!("{}: {}", path.display(), e)))?;
    frame_from_image(img)
}

/// Convert a decoded image into a packed frame
pub fn frame_from_image(img: image::DynamicImage) -> SourceResult<Frame> {
    let (width, height) = (img.width(), img.height());
    let frame = match img {
        image::DynamicImage::ImageLuma8(gray) => {
            Frame::packed(width, height, PixelFormat::Gray8, gray.into_raw())
        }
        other => Frame::packed(width, height, PixelFormat::Rgb24, other.to_rgb8().into_raw()),
    };
    frame.map_err(|e| SourceError::Unavailable(e.to_string()))
}

/// Source returning the same image on every read
pub struct StillImageSource {
    name: String,
    frame: Option<Frame>,
    delay: Duration,
    sequence: u64,
}

impl StillImageSource {
    /// Load an image file
    ///
    /// # Errors
    /// `Unavailable` if the file cannot be read or decoded.
    pub fn open(path: &Path, delay: Duration) -> SourceResult<Self> {
        let frame = load_image_frame(path)?;
        info!(
            path = %path.display(),
            width = frame.width(),
            height = frame.height(),
            format = %frame.format(),
            "Loaded still image"
        );
        Ok(Self::from_frame(path.display().to_string(), frame, delay))
    }

    /// Serve an in-memory frame
    pub fn from_frame(name: impl Into<String>, frame: Frame, delay: Duration) -> Self {
        Self {
            name: name.into(),
            frame: Some(frame),
            delay,
            sequence: 0,
        }
    }
}

impl FrameSource for StillImageSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> SourceResult<Frame> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let frame = self
            .frame
            .as_ref()
            .ok_or_else(|| SourceError::Fatal("still image released".to_string()))?;
        self.sequence += 1;
        Ok(frame.restamp(self.sequence))
    }

    fn release(&mut self) {
        if self.frame.take().is_some() {
            debug!(name = %self.name, "Released still image");
        }
    }

    fn is_released(&self) -> bool {
        self.frame.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_increment_sequence() {
        let frame = Frame::filled(4, 4, PixelFormat::Gray8, &[9]).unwrap();
        let mut source = StillImageSource::from_frame("test", frame, Duration::ZERO);
        assert_eq!(source.read().unwrap().sequence(), 1);
        assert_eq!(source.read().unwrap().sequence(), 2);
    }

    #[test]
    fn release_is_idempotent_and_final() {
        let frame = Frame::filled(2, 2, PixelFormat::Rgb24, &[1, 2, 3]).unwrap();
        let mut source = StillImageSource::from_frame("test", frame, Duration::ZERO);
        source.release();
        source.release();
        assert!(source.is_released());
        assert!(matches!(source.read(), Err(SourceError::Fatal(_))));
    }

    #[test]
    fn loads_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(3, 2, image::Luma([42])).save(&path).unwrap();

        let mut source = StillImageSource::open(&path, Duration::ZERO).unwrap();
        let frame = source.read().unwrap();
        assert_eq!(frame.format(), PixelFormat::Gray8);
        assert_eq!((frame.width(), frame.height()), (3, 2));
        assert_eq!(frame.pixel(2, 1), &[42]);
    }

    #[test]
    fn color_images_become_rgb() {
        let img = image::DynamicImage::ImageRgba8(image::RgbaImage::from_pixel(
            2,
            2,
            image::Rgba([10, 20, 30, 255]),
        ));
        let frame = frame_from_image(img).unwrap();
        assert_eq!(frame.format(), PixelFormat::Rgb24);
        assert_eq!(frame.pixel(1, 1), &[10, 20, 30]);
    }
}
