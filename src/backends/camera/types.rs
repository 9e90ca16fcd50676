// SPDX-License-Identifier: GPL-3.0-only

//! Frame and pixel layout types shared by every stage of the pipeline

use crate::errors::{FrameError, FrameResult};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

/// Pixel layout of a frame buffer
///
/// All layouts are 8 bits per channel and packed (no planes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelFormat {
    /// 3 bytes per pixel, blue first (sensor native on most V4L2 devices)
    Bgr24,
    /// 3 bytes per pixel, red first
    Rgb24,
    /// 8-bit luminance, single channel (IR sensors)
    Gray8,
}

impl PixelFormat {
    /// Bytes used by one pixel
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Bgr24 | Self::Rgb24 => 3,
            Self::Gray8 => 1,
        }
    }

    /// Whether the layout carries color channels
    pub fn is_color(&self) -> bool {
        !matches!(self, Self::Gray8)
    }

    /// V4L2 FourCC code for this layout
    pub fn fourcc(&self) -> [u8; 4] {
        match self {
            Self::Bgr24 => *b"BGR3",
            Self::Rgb24 => *b"RGB3",
            Self::Gray8 => *b"GREY",
        }
    }

    /// Layout for a V4L2 FourCC code, if it is one we can consume
    pub fn from_fourcc(code: [u8; 4]) -> Option<Self> {
        match &code {
            b"BGR3" => Some(Self::Bgr24),
            b"RGB3" => Some(Self::Rgb24),
            b"GREY" => Some(Self::Gray8),
            _ => None,
        }
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bgr24 => write!(f, "BGR24"),
            Self::Rgb24 => write!(f, "RGB24"),
            Self::Gray8 => write!(f, "GRAY8"),
        }
    }
}

/// An immutable captured or processed image
///
/// The pixel bytes are reference counted, so cloning a frame or passing it
/// through an identity transform never copies pixel data. The layout
/// invariant (`stride >= width * bpp`, `len == stride * height`) is checked
/// once in [`Frame::new`] and holds for the lifetime of the value.
#[derive(Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    format: PixelFormat,
    stride: usize,
    data: Arc<[u8]>,
    captured_at: Instant,
    sequence: u64,
}

impl Frame {
    /// Wrap a pixel buffer after validating its layout
    pub fn new(
        width: u32,
        height: u32,
        format: PixelFormat,
        stride: usize,
        data: impl Into<Arc<[u8]>>,
    ) -> FrameResult<Self> {
        let data = data.into();
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyFrame);
        }
        let min = width as usize * format.bytes_per_pixel();
        if stride < min {
            return Err(FrameError::StrideTooSmall { stride, min });
        }
        let expected = stride * height as usize;
        if data.len() != expected {
            return Err(FrameError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            format,
            stride,
            data,
            captured_at: Instant::now(),
            sequence: 0,
        })
    }

    /// Wrap a tightly packed buffer (stride = width × bpp)
    pub fn packed(
        width: u32,
        height: u32,
        format: PixelFormat,
        data: impl Into<Arc<[u8]>>,
    ) -> FrameResult<Self> {
        Self::new(
            width,
            height,
            format,
            width as usize * format.bytes_per_pixel(),
            data,
        )
    }

    /// A frame filled with one pixel value
    pub fn filled(width: u32, height: u32, format: PixelFormat, pixel: &[u8]) -> FrameResult<Self> {
        if pixel.len() != format.bytes_per_pixel() {
            return Err(FrameError::Conversion(format!(
                "{} expects {} bytes per pixel, got {}",
                format,
                format.bytes_per_pixel(),
                pixel.len()
            )));
        }
        let count = width as usize * height as usize;
        let data: Vec<u8> = pixel.iter().copied().cycle().take(count * pixel.len()).collect();
        Self::packed(width, height, format, data)
    }

    /// Replace the pixel data while keeping capture metadata
    ///
    /// Used by transforms so the output frame keeps the sequence number and
    /// capture instant of its input.
    pub fn derive(
        &self,
        format: PixelFormat,
        stride: usize,
        data: impl Into<Arc<[u8]>>,
    ) -> FrameResult<Self> {
        let mut frame = Self::new(self.width, self.height, format, stride, data)?;
        frame.captured_at = self.captured_at;
        frame.sequence = self.sequence;
        Ok(frame)
    }

    /// Same frame with a different sequence number and a fresh capture instant
    pub fn restamp(&self, sequence: u64) -> Self {
        Self {
            captured_at: Instant::now(),
            sequence,
            ..self.clone()
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes per row, including padding
    pub fn stride(&self) -> usize {
        self.stride
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn captured_at(&self) -> Instant {
        self.captured_at
    }

    /// Raw buffer including row padding
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Whether two frames share the same pixel buffer
    pub fn shares_buffer(&self, other: &Frame) -> bool {
        Arc::ptr_eq(&self.data, &other.data)
    }

    /// Pixel bytes of row `y` without padding
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        let len = self.width as usize * self.format.bytes_per_pixel();
        &self.data[start..start + len]
    }

    /// Bytes of one pixel
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let bpp = self.format.bytes_per_pixel();
        let start = x as usize * bpp;
        &self.row(y)[start..start + bpp]
    }

    /// Whether rows carry padding bytes
    pub fn is_packed(&self) -> bool {
        self.stride == self.width as usize * self.format.bytes_per_pixel()
    }

    /// Pixel bytes with padding removed
    pub fn to_packed_vec(&self) -> Vec<u8> {
        if self.is_packed() {
            return self.data.to_vec();
        }
        let mut out =
            Vec::with_capacity(self.width as usize * self.height as usize * self.format.bytes_per_pixel());
        for y in 0..self.height {
            out.extend_from_slice(self.row(y));
        }
        out
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("stride", &self.stride)
            .field("sequence", &self.sequence)
            .field("len", &self.data.len())
            .finish()
    }
}
