// SPDX-License-Identifier: GPL-3.0-only

//! CPU image operations behind the vein enhancement mode
//!
//! Everything here works on [`GrayPlane`], a packed single-channel buffer.
//! The stages are composed by [`crate::pipelines::modes::ModeEngine`]:
//!
//! ```text
//! Frame ──▶ luminance ──▶ CLAHE ×N ──▶ inverse threshold ──▶ opening ──▶ mask
//! ```

pub mod clahe;
pub mod morphology;
pub mod roi;

pub use clahe::Clahe;
pub use morphology::{StructuringElement, count_regions};
pub use roi::{RoiGeometry, RoiShape};

use crate::backends::camera::types::{Frame, PixelFormat};

/// Packed 8-bit single-channel image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GrayPlane {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl GrayPlane {
    /// Plane filled with one value
    pub fn new(width: u32, height: u32, value: u8) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    /// Luminance of a frame
    ///
    /// Color frames use BT.601 weights in 14-bit fixed point, rounded.
    /// Gray frames are copied without padding.
    pub fn luminance(frame: &Frame) -> Self {
        let width = frame.width();
        let height = frame.height();
        let mut data = Vec::with_capacity(width as usize * height as usize);

        match frame.format() {
            PixelFormat::Gray8 => {
                for y in 0..height {
                    data.extend_from_slice(frame.row(y));
                }
            }
            PixelFormat::Rgb24 => {
                for y in 0..height {
                    data.extend(frame.row(y).chunks_exact(3).map(|p| luma(p[0], p[1], p[2])));
                }
            }
            PixelFormat::Bgr24 => {
                for y in 0..height {
                    data.extend(frame.row(y).chunks_exact(3).map(|p| luma(p[2], p[1], p[0])));
                }
            }
        }

        Self {
            width,
            height,
            data,
        }
    }

    #[inline]
    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.data[y as usize * self.width as usize + x as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, value: u8) {
        let idx = y as usize * self.width as usize + x as usize;
        self.data[idx] = value;
    }

    /// Binary inverse threshold: values at or below `threshold` become 255, the rest 0
    pub fn threshold_inverse(&mut self, threshold: u8) {
        for v in &mut self.data {
            *v = if *v > threshold { 0 } else { 255 };
        }
    }

    /// Number of non-zero pixels
    pub fn count_nonzero(&self) -> usize {
        self.data.iter().filter(|&&v| v != 0).count()
    }

    /// Extract a rectangle
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for row in y..y + height {
            let start = row as usize * self.width as usize + x as usize;
            data.extend_from_slice(&self.data[start..start + width as usize]);
        }
        Self {
            width,
            height,
            data,
        }
    }
}

/// BT.601 luma with OpenCV-compatible rounding
#[inline]
pub(crate) fn luma(r: u8, g: u8, b: u8) -> u8 {
    const R: u32 = 4899;
    const G: u32 = 9617;
    const B: u32 = 1868;
    ((r as u32 * R + g as u32 * G + b as u32 * B + (1 << 13)) >> 14) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_extremes() {
        assert_eq!(luma(0, 0, 0), 0);
        assert_eq!(luma(255, 255, 255), 255);
        // pure green dominates
        assert_eq!(luma(0, 255, 0), 150);
    }

    #[test]
    fn bgr_and_rgb_agree() {
        let rgb = Frame::filled(2, 2, PixelFormat::Rgb24, &[200, 40, 10]).unwrap();
        let bgr = Frame::filled(2, 2, PixelFormat::Bgr24, &[10, 40, 200]).unwrap();
        assert_eq!(GrayPlane::luminance(&rgb), GrayPlane::luminance(&bgr));
    }

    #[test]
    fn gray_frame_drops_padding() {
        let frame = Frame::new(2, 2, PixelFormat::Gray8, 3, vec![1, 2, 9, 3, 4, 9]).unwrap();
        assert_eq!(GrayPlane::luminance(&frame).data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn threshold_marks_dark_pixels() {
        let mut plane = GrayPlane {
            width: 4,
            height: 1,
            data: vec![0, 50, 51, 255],
        };
        plane.threshold_inverse(50);
        assert_eq!(plane.data, vec![255, 255, 0, 0]);
    }

    #[test]
    fn crop_extracts_rectangle() {
        let plane = GrayPlane {
            width: 3,
            height: 3,
            data: (0..9).collect(),
        };
        let cropped = plane.crop(1, 1, 2, 2);
        assert_eq!(cropped.data, vec![4, 5, 7, 8]);
    }
}
