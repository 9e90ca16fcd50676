// SPDX-License-Identifier: GPL-3.0-only

//! Presentation conversion at the sink boundary
//!
//! Turns processed frames into contiguous buffers in the layout the display
//! wants, optionally fitted into a target box with the aspect ratio kept.
//! The input frame is never modified.

use crate::backends::camera::types::{Frame, PixelFormat};
use crate::errors::{FrameError, FrameResult};
use crate::pipelines::enhance::luma;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage};

/// Display-ready pixel buffer owned by the consumer
///
/// Always packed: `stride == width * bytes_per_pixel`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayFrame {
    pub width: u32,
    pub height: u32,
    pub stride: usize,
    pub format: PixelFormat,
    pub data: Vec<u8>,
    /// Capture sequence of the source frame
    pub sequence: u64,
}

impl DisplayFrame {
    fn packed(width: u32, height: u32, format: PixelFormat, data: Vec<u8>, sequence: u64) -> Self {
        Self {
            width,
            height,
            stride: width as usize * format.bytes_per_pixel(),
            format,
            data,
            sequence,
        }
    }

    /// Convert back into a [`Frame`] of the requested layout
    ///
    /// Exact for every pair of layouts except color to gray.
    pub fn into_frame(self, format: PixelFormat) -> FrameResult<Frame> {
        let data = convert_layout(&self.data, self.format, format);
        Frame::packed(self.width, self.height, format, data).map(|f| f.restamp(self.sequence))
    }

    /// Bytes of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = y as usize * self.stride + x as usize * bpp;
        &self.data[start..start + bpp]
    }

    /// RGB triple of a pixel regardless of layout
    pub fn rgb(&self, x: u32, y: u32) -> [u8; 3] {
        let p = self.pixel(x, y);
        match self.format {
            PixelFormat::Rgb24 => [p[0], p[1], p[2]],
            PixelFormat::Bgr24 => [p[2], p[1], p[0]],
            PixelFormat::Gray8 => [p[0], p[0], p[0]],
        }
    }

    /// Image crate view for encoding
    pub fn to_dynamic_image(&self) -> FrameResult<image::DynamicImage> {
        let invalid = || FrameError::Conversion("buffer does not match dimensions".to_string());
        match self.format {
            PixelFormat::Gray8 => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .map(image::DynamicImage::ImageLuma8)
                .ok_or_else(invalid),
            PixelFormat::Rgb24 | PixelFormat::Bgr24 => {
                let rgb = convert_layout(&self.data, self.format, PixelFormat::Rgb24);
                RgbImage::from_raw(self.width, self.height, rgb)
                    .map(image::DynamicImage::ImageRgb8)
                    .ok_or_else(invalid)
            }
        }
    }

    /// Same frame turned upside down
    pub fn rotated_180(&self) -> Self {
        let bpp = self.format.bytes_per_pixel();
        let mut data = Vec::with_capacity(self.data.len());
        for pixel in self.data.chunks_exact(bpp).rev() {
            data.extend_from_slice(pixel);
        }
        Self::packed(self.width, self.height, self.format, data, self.sequence)
    }

    /// Center crop of `1 / factor` of each side, scaled back to full size
    pub fn zoomed(&self, factor: u32) -> FrameResult<Self> {
        if factor <= 1 {
            return Ok(self.clone());
        }
        let crop_w = (self.width / factor).max(1);
        let crop_h = (self.height / factor).max(1);
        let x = (self.width - crop_w) / 2;
        let y = (self.height - crop_h) / 2;

        let data = with_image(self, |view| {
            let cropped = view.crop(x, y, crop_w, crop_h);
            cropped.resize(self.width, self.height)
        })?;
        Ok(Self::packed(self.width, self.height, self.format, data, self.sequence))
    }
}

/// Converts engine output to what the display surface consumes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisplayAdapter {
    /// Pixel layout the display expects
    pub target: PixelFormat,
    /// Box the frame is fitted into, aspect ratio kept
    pub fit: Option<(u32, u32)>,
}

impl DisplayAdapter {
    pub fn new(target: PixelFormat, fit: Option<(u32, u32)>) -> Self {
        Self { target, fit }
    }

    /// RGB output at the source size
    pub fn passthrough() -> Self {
        Self::new(PixelFormat::Rgb24, None)
    }

    /// Size a frame of `width` × `height` ends up with
    pub fn output_size(&self, width: u32, height: u32) -> (u32, u32) {
        match self.fit {
            Some(bounds) => fit_within(width, height, bounds),
            None => (width, height),
        }
    }

    /// Produce a display frame
    ///
    /// Reorders channels, expands or collapses gray, drops row padding and
    /// finally resizes.
    pub fn present(&self, frame: &Frame) -> FrameResult<DisplayFrame> {
        let packed = frame.to_packed_vec();
        let data = convert_layout(&packed, frame.format(), self.target);
        let display = DisplayFrame::packed(
            frame.width(),
            frame.height(),
            self.target,
            data,
            frame.sequence(),
        );

        let (width, height) = self.output_size(frame.width(), frame.height());
        if (width, height) == (frame.width(), frame.height()) {
            return Ok(display);
        }

        let data = with_image(&display, |view| view.resize(width, height))?;
        Ok(DisplayFrame::packed(
            width,
            height,
            self.target,
            data,
            display.sequence,
        ))
    }
}

impl Default for DisplayAdapter {
    fn default() -> Self {
        use crate::constants::display;
        Self::new(PixelFormat::Rgb24, Some((display::WIDTH, display::HEIGHT)))
    }
}

/// Largest size with the same aspect ratio that fits in `bounds`
pub fn fit_within(width: u32, height: u32, bounds: (u32, u32)) -> (u32, u32) {
    if width == 0 || height == 0 {
        return (0, 0);
    }
    let scale = f64::min(
        bounds.0 as f64 / width as f64,
        bounds.1 as f64 / height as f64,
    );
    let w = ((width as f64 * scale).round() as u32).clamp(1, bounds.0.max(1));
    let h = ((height as f64 * scale).round() as u32).clamp(1, bounds.1.max(1));
    (w, h)
}

/// Repack pixel data from one layout to another
///
/// `data` must be packed.
pub fn convert_layout(data: &[u8], from: PixelFormat, to: PixelFormat) -> Vec<u8> {
    use PixelFormat::*;
    match (from, to) {
        (a, b) if a == b => data.to_vec(),
        (Rgb24, Bgr24) | (Bgr24, Rgb24) => data
            .chunks_exact(3)
            .flat_map(|p| [p[2], p[1], p[0]])
            .collect(),
        (Gray8, Rgb24) | (Gray8, Bgr24) => data.iter().flat_map(|&g| [g, g, g]).collect(),
        (Rgb24, Gray8) => data.chunks_exact(3).map(|p| luma(p[0], p[1], p[2])).collect(),
        (Bgr24, Gray8) => data.chunks_exact(3).map(|p| luma(p[2], p[1], p[0])).collect(),
        _ => data.to_vec(),
    }
}

/// Borrowed image view for resize operations
enum ImageView {
    Gray(GrayImage),
    Color(RgbImage),
}

impl ImageView {
    fn resize(&self, width: u32, height: u32) -> Vec<u8> {
        match self {
            ImageView::Gray(img) => imageops::resize(img, width, height, FilterType::Triangle).into_raw(),
            ImageView::Color(img) => imageops::resize(img, width, height, FilterType::Triangle).into_raw(),
        }
    }

    fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> ImageView {
        match self {
            ImageView::Gray(img) => ImageView::Gray(imageops::crop_imm(img, x, y, width, height).to_image()),
            ImageView::Color(img) => ImageView::Color(imageops::crop_imm(img, x, y, width, height).to_image()),
        }
    }
}

/// Run an image operation on a packed display buffer
///
/// Color data is handled as RGB regardless of channel order, since resizing
/// and cropping treat channels independently.
fn with_image<F>(frame: &DisplayFrame, op: F) -> FrameResult<Vec<u8>>
where
    F: FnOnce(&ImageView) -> Vec<u8>,
{
    let invalid = || FrameError::Conversion("buffer does not match dimensions".to_string());
    let view = match frame.format {
        PixelFormat::Gray8 => ImageView::Gray(
            GrayImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(invalid)?,
        ),
        PixelFormat::Rgb24 | PixelFormat::Bgr24 => ImageView::Color(
            RgbImage::from_raw(frame.width, frame.height, frame.data.clone()).ok_or_else(invalid)?,
        ),
    };
    Ok(op(&view))
}
