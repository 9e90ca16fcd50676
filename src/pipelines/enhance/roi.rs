// SPDX-License-Identifier: GPL-3.0-only

//! Centered region of interest

use serde::{Deserialize, Serialize};

/// How the region of interest is sized from the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoiShape {
    /// `ratio × width` by `ratio × height`
    #[default]
    Proportional,
    /// Square with side `ratio × min(width, height)`
    Square,
}

/// Pixel rectangle, recomputed for every frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiGeometry {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl RoiGeometry {
    /// Centered rectangle for a frame of the given size
    ///
    /// The result is never empty and never exceeds the frame.
    pub fn for_frame(frame_width: u32, frame_height: u32, ratio: f32, shape: RoiShape) -> Self {
        let scale = |len: u32| ((len as f32 * ratio).round() as u32).clamp(1, len.max(1));
        let (width, height) = match shape {
            RoiShape::Proportional => (scale(frame_width), scale(frame_height)),
            RoiShape::Square => {
                let side = scale(frame_width.min(frame_height));
                (side, side)
            }
        };
        Self {
            x: frame_width.saturating_sub(width) / 2,
            y: frame_height.saturating_sub(height) / 2,
            width,
            height,
        }
    }

    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proportional_half_of_vga() {
        let roi = RoiGeometry::for_frame(640, 480, 0.5, RoiShape::Proportional);
        assert_eq!(
            roi,
            RoiGeometry {
                x: 160,
                y: 120,
                width: 320,
                height: 240
            }
        );
        assert!(roi.contains(160, 120));
        assert!(!roi.contains(480, 120));
    }

    #[test]
    fn square_uses_short_side() {
        let roi = RoiGeometry::for_frame(640, 480, 0.5, RoiShape::Square);
        assert_eq!((roi.x, roi.y, roi.width, roi.height), (200, 120, 240, 240));
    }

    #[test]
    fn full_ratio_covers_frame() {
        let roi = RoiGeometry::for_frame(7, 5, 1.0, RoiShape::Proportional);
        assert_eq!((roi.x, roi.y, roi.width, roi.height), (0, 0, 7, 5));
    }

    #[test]
    fn tiny_ratio_is_not_empty() {
        let roi = RoiGeometry::for_frame(10, 10, 0.01, RoiShape::Proportional);
        assert_eq!((roi.width, roi.height), (1, 1));
    }
}
