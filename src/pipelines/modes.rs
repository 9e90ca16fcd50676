// SPDX-License-Identifier: GPL-3.0-only

//! Enhancement modes and the engine that applies them
//!
//! The engine is owned by the capture thread. It keeps the CLAHE context
//! alive across frames and is only reset on explicit request.

use crate::backends::camera::types::{Frame, PixelFormat};
use crate::constants::enhancement as defaults;
use crate::errors::{ConfigError, FrameResult};
use crate::pipelines::enhance::{
    Clahe, GrayPlane, RoiGeometry, RoiShape, StructuringElement, count_regions, morphology,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Enhancement mode, cycled in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Mode {
    #[default]
    Normal,
    Inverted,
    #[serde(alias = "vein")]
    VeinEnhanced,
}

impl Mode {
    /// All modes in switching order
    pub const ALL: [Mode; 3] = [Mode::Normal, Mode::Inverted, Mode::VeinEnhanced];

    /// Next mode in the cycle
    pub fn next(&self) -> Self {
        match self {
            Mode::Normal => Mode::Inverted,
            Mode::Inverted => Mode::VeinEnhanced,
            Mode::VeinEnhanced => Mode::Normal,
        }
    }

    /// Short name for status lines and CLI arguments
    pub fn name(&self) -> &'static str {
        match self {
            Mode::Normal => "normal",
            Mode::Inverted => "inverted",
            Mode::VeinEnhanced => "vein",
        }
    }

    /// Parse a mode name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "normal" => Some(Mode::Normal),
            "inverted" | "invert" => Some(Mode::Inverted),
            "vein" | "vein-enhanced" | "veinenhanced" => Some(Mode::VeinEnhanced),
            _ => None,
        }
    }

    /// Position in [`Mode::ALL`]
    pub fn index(&self) -> u8 {
        match self {
            Mode::Normal => 0,
            Mode::Inverted => 1,
            Mode::VeinEnhanced => 2,
        }
    }

    /// Mode at a position in [`Mode::ALL`], wrapping
    pub fn from_index(index: u8) -> Self {
        Self::ALL[index as usize % Self::ALL.len()]
    }
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Which modes the region-of-interest overlay applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RoiScope {
    /// Only the vein mode is framed; normal and inverted cover the whole frame
    #[default]
    VeinOnly,
    /// Every mode is framed
    AllModes,
}

/// Region-of-interest overlay settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoiSettings {
    pub enabled: bool,
    /// Fraction of the frame covered, in (0, 1]
    pub ratio: f32,
    pub shape: RoiShape,
    /// Blend factor toward white outside the region, in [0, 1]
    pub opacity: f32,
    pub scope: RoiScope,
}

impl Default for RoiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            ratio: defaults::ROI_RATIO,
            shape: RoiShape::default(),
            opacity: defaults::ROI_OPACITY,
            scope: RoiScope::default(),
        }
    }
}

/// Vein enhancement parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementSettings {
    pub clip_limit: f32,
    pub tile_grid: (u32, u32),
    /// CLAHE passes per frame
    pub iterations: u32,
    /// Luminance at or below this is marked as vein
    pub threshold: u8,
    pub kernel_size: (u32, u32),
    pub open_iterations: u32,
    /// Highlight color, RGB
    pub highlight: [u8; 3],
    pub roi: RoiSettings,
}

impl Default for EnhancementSettings {
    fn default() -> Self {
        Self {
            clip_limit: defaults::CLIP_LIMIT,
            tile_grid: defaults::TILE_GRID,
            iterations: defaults::CLAHE_ITERATIONS,
            threshold: defaults::THRESHOLD,
            kernel_size: defaults::KERNEL_SIZE,
            open_iterations: defaults::OPEN_ITERATIONS,
            highlight: defaults::HIGHLIGHT,
            roi: RoiSettings::default(),
        }
    }
}

impl EnhancementSettings {
    /// Check every value against its accepted range
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |field: &'static str, reason: String| Err(ConfigError::Invalid { field, reason });

        if !(self.clip_limit > 0.0 && self.clip_limit.is_finite()) {
            return invalid("clip_limit", format!("{} must be positive", self.clip_limit));
        }
        if self.tile_grid.0 == 0 || self.tile_grid.1 == 0 {
            return invalid("tile_grid", format!("{:?} must be at least 1x1", self.tile_grid));
        }
        if !(defaults::MIN_ITERATIONS..=defaults::MAX_ITERATIONS).contains(&self.iterations) {
            return invalid(
                "iterations",
                format!(
                    "{} outside {}..={}",
                    self.iterations,
                    defaults::MIN_ITERATIONS,
                    defaults::MAX_ITERATIONS
                ),
            );
        }
        let kernel = 1..=defaults::MAX_KERNEL;
        if !kernel.contains(&self.kernel_size.0) || !kernel.contains(&self.kernel_size.1) {
            return invalid(
                "kernel_size",
                format!(
                    "{:?} outside 1x1..={}x{}",
                    self.kernel_size,
                    defaults::MAX_KERNEL,
                    defaults::MAX_KERNEL
                ),
            );
        }
        if !(self.roi.ratio > 0.0 && self.roi.ratio <= 1.0) {
            return invalid("roi.ratio", format!("{} outside (0, 1]", self.roi.ratio));
        }
        if !(0.0..=1.0).contains(&self.roi.opacity) {
            return invalid("roi.opacity", format!("{} outside [0, 1]", self.roi.opacity));
        }
        Ok(())
    }
}

/// Applies the current mode to frames
pub struct ModeEngine {
    mode: Mode,
    settings: EnhancementSettings,
    clahe: Clahe,
    element: StructuringElement,
}

impl ModeEngine {
    /// Create an engine after validating its settings
    pub fn new(mode: Mode, settings: EnhancementSettings) -> Result<Self, ConfigError> {
        settings.validate()?;
        Ok(Self {
            mode,
            clahe: Clahe::new(settings.clip_limit, settings.tile_grid),
            element: StructuringElement::ellipse(settings.kernel_size.0, settings.kernel_size.1),
            settings,
        })
    }

    pub fn current_mode(&self) -> Mode {
        self.mode
    }

    pub fn settings(&self) -> &EnhancementSettings {
        &self.settings
    }

    /// Advance to the next mode and return it
    pub fn switch_mode(&mut self) -> Mode {
        self.mode = self.mode.next();
        info!(mode = %self.mode, "Switched mode");
        self.mode
    }

    /// Jump straight to `mode`
    pub fn set_mode(&mut self, mode: Mode) {
        if mode != self.mode {
            info!(from = %self.mode, to = %mode, "Setting mode");
            self.mode = mode;
        }
    }

    /// Throw away the CLAHE context and start over
    pub fn reset_enhancement(&mut self) {
        debug!("Resetting enhancement state");
        self.clahe.reset();
    }

    /// Transform a frame with the current mode
    ///
    /// Normal mode without an overlay returns the input unchanged, sharing
    /// its buffer. Every other path allocates a new packed frame and keeps
    /// the input's sequence number.
    pub fn apply(&mut self, frame: Frame) -> FrameResult<Frame> {
        let full = RoiGeometry {
            x: 0,
            y: 0,
            width: frame.width(),
            height: frame.height(),
        };
        match (self.mode, self.roi_for(&frame)) {
            (Mode::Normal, None) => Ok(frame),
            (Mode::Inverted, None) => invert(&frame),
            (Mode::VeinEnhanced, None) => self.compose(&frame, full),
            (_, Some(roi)) => self.compose(&frame, roi),
        }
    }

    /// Binary vein mask of a whole frame (255 = vein)
    pub fn vein_mask(&mut self, frame: &Frame) -> GrayPlane {
        self.mask_for(GrayPlane::luminance(frame))
    }

    /// Number of separate vein regions detected in a frame
    pub fn vein_regions(&mut self, frame: &Frame) -> usize {
        count_regions(&self.vein_mask(frame))
    }

    fn roi_for(&self, frame: &Frame) -> Option<RoiGeometry> {
        let roi = &self.settings.roi;
        let applies = match roi.scope {
            RoiScope::VeinOnly => self.mode == Mode::VeinEnhanced,
            RoiScope::AllModes => true,
        };
        (roi.enabled && applies)
            .then(|| RoiGeometry::for_frame(frame.width(), frame.height(), roi.ratio, roi.shape))
    }

    fn mask_for(&mut self, mut plane: GrayPlane) -> GrayPlane {
        for _ in 0..self.settings.iterations {
            self.clahe.apply(&mut plane);
        }
        plane.threshold_inverse(self.settings.threshold);
        morphology::open(&plane, &self.element, self.settings.open_iterations)
    }

    /// Apply the current mode inside `region` and blend everything else toward white
    fn compose(&mut self, frame: &Frame, region: RoiGeometry) -> FrameResult<Frame> {
        let mode = self.mode;
        let in_format = frame.format();
        // The highlight needs color channels
        let out_format = match mode {
            Mode::VeinEnhanced if !in_format.is_color() => PixelFormat::Rgb24,
            _ => in_format,
        };

        let mask = if mode == Mode::VeinEnhanced {
            let luminance = GrayPlane::luminance(frame);
            let cropped = if region.width == frame.width() && region.height == frame.height() {
                luminance
            } else {
                luminance.crop(region.x, region.y, region.width, region.height)
            };
            Some(self.mask_for(cropped))
        } else {
            None
        };

        let highlight = match out_format {
            PixelFormat::Bgr24 => {
                let [r, g, b] = self.settings.highlight;
                [b, g, r]
            }
            _ => self.settings.highlight,
        };
        let alpha = self.settings.roi.opacity;

        let in_bpp = in_format.bytes_per_pixel();
        let out_bpp = out_format.bytes_per_pixel();
        let mut out =
            Vec::with_capacity(frame.width() as usize * frame.height() as usize * out_bpp);
        let mut pixel = [0u8; 3];

        for y in 0..frame.height() {
            let row = frame.row(y);
            for x in 0..frame.width() {
                let src = &row[x as usize * in_bpp..(x as usize + 1) * in_bpp];
                let px = &mut pixel[..out_bpp];
                if out_bpp == in_bpp {
                    px.copy_from_slice(src);
                } else {
                    px.fill(src[0]);
                }

                if !region.contains(x, y) {
                    for c in px.iter_mut() {
                        *c = blend_white(*c, alpha);
                    }
                } else {
                    match (&mask, mode) {
                        (Some(mask), _) => {
                            if mask.get(x - region.x, y - region.y) != 0 {
                                px.copy_from_slice(&highlight[..out_bpp]);
                            }
                        }
                        (None, Mode::Inverted) => {
                            for c in px.iter_mut() {
                                *c = !*c;
                            }
                        }
                        (None, _) => {}
                    }
                }
                out.extend_from_slice(px);
            }
        }

        frame.derive(out_format, frame.width() as usize * out_bpp, out)
    }
}

impl Default for ModeEngine {
    fn default() -> Self {
        let settings = EnhancementSettings::default();
        Self {
            mode: Mode::default(),
            clahe: Clahe::new(settings.clip_limit, settings.tile_grid),
            element: StructuringElement::ellipse(settings.kernel_size.0, settings.kernel_size.1),
            settings,
        }
    }
}

/// Complement every byte, padding included
fn invert(frame: &Frame) -> FrameResult<Frame> {
    let data: Vec<u8> = frame.data().iter().map(|b| !b).collect();
    frame.derive(frame.format(), frame.stride(), data)
}

#[inline]
fn blend_white(value: u8, alpha: f32) -> u8 {
    (value as f32 * (1.0 - alpha) + 255.0 * alpha)
        .round()
        .clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_roi() -> EnhancementSettings {
        EnhancementSettings {
            roi: RoiSettings {
                enabled: false,
                ..RoiSettings::default()
            },
            ..EnhancementSettings::default()
        }
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in Mode::ALL {
            assert_eq!(Mode::parse(mode.name()), Some(mode));
            assert_eq!(Mode::from_index(mode.index()), mode);
        }
        assert_eq!(Mode::parse("VEIN-ENHANCED"), Some(Mode::VeinEnhanced));
        assert_eq!(Mode::parse("sepia"), None);
    }

    #[test]
    fn set_mode_jumps_without_cycling() {
        let mut engine = ModeEngine::default();
        engine.set_mode(Mode::VeinEnhanced);
        assert_eq!(engine.current_mode(), Mode::VeinEnhanced);
        engine.set_mode(Mode::VeinEnhanced);
        assert_eq!(engine.switch_mode(), Mode::Normal);
    }

    #[test]
    fn reset_drops_clahe_tables_and_keeps_settings() {
        let settings = EnhancementSettings {
            iterations: 2,
            threshold: 40,
            ..no_roi()
        };
        let mut engine = ModeEngine::new(Mode::VeinEnhanced, settings.clone()).unwrap();
        engine
            .apply(Frame::filled(32, 16, PixelFormat::Gray8, &[90]).unwrap())
            .unwrap();
        assert_eq!(engine.clahe.last_size(), Some((32, 16)));

        engine.reset_enhancement();
        assert_eq!(engine.clahe.last_size(), None);
        assert_eq!(engine.settings(), &settings);
        assert_eq!(engine.current_mode(), Mode::VeinEnhanced);
    }

    #[test]
    fn normal_shares_buffer() {
        let mut engine = ModeEngine::new(Mode::Normal, no_roi()).unwrap();
        let frame = Frame::filled(4, 4, PixelFormat::Rgb24, &[1, 2, 3]).unwrap();
        let out = engine.apply(frame.clone()).unwrap();
        assert!(out.shares_buffer(&frame));
    }

    #[test]
    fn inverted_keeps_padding_layout() {
        let mut engine = ModeEngine::new(Mode::Inverted, no_roi()).unwrap();
        let frame = Frame::new(1, 2, PixelFormat::Gray8, 2, vec![10, 0, 20, 0]).unwrap();
        let out = engine.apply(frame).unwrap();
        assert_eq!(out.stride(), 2);
        assert_eq!(out.row(0), &[245]);
        assert_eq!(out.row(1), &[235]);
    }

    #[test]
    fn gray_vein_output_is_color() {
        let settings = EnhancementSettings {
            iterations: 1,
            ..no_roi()
        };
        let mut engine = ModeEngine::new(Mode::VeinEnhanced, settings).unwrap();
        let frame = Frame::filled(64, 64, PixelFormat::Gray8, &[0]).unwrap();
        let out = engine.apply(frame).unwrap();
        assert_eq!(out.format(), PixelFormat::Rgb24);
        assert_eq!(out.pixel(32, 32), &[0, 255, 0]);
    }

    #[test]
    fn bgr_highlight_is_reordered() {
        let settings = EnhancementSettings {
            highlight: [255, 0, 0],
            iterations: 1,
            ..no_roi()
        };
        let mut engine = ModeEngine::new(Mode::VeinEnhanced, settings).unwrap();
        let frame = Frame::filled(64, 64, PixelFormat::Bgr24, &[0, 0, 0]).unwrap();
        let out = engine.apply(frame).unwrap();
        assert_eq!(out.pixel(3, 3), &[0, 0, 255]);
    }

    #[test]
    fn overlay_in_all_modes_frames_normal_output() {
        let mut settings = EnhancementSettings::default();
        settings.roi.scope = RoiScope::AllModes;
        let mut engine = ModeEngine::new(Mode::Normal, settings).unwrap();
        let frame = Frame::filled(8, 8, PixelFormat::Gray8, &[100]).unwrap();
        let out = engine.apply(frame).unwrap();
        assert_eq!(out.pixel(0, 0), &[178]);
        assert_eq!(out.pixel(4, 4), &[100]);
    }

    #[test]
    fn rejects_out_of_range_settings() {
        let mut settings = EnhancementSettings::default();
        settings.iterations = 6;
        assert!(matches!(
            ModeEngine::new(Mode::Normal, settings),
            Err(ConfigError::Invalid {
                field: "iterations",
                ..
            })
        ));

        let mut settings = EnhancementSettings::default();
        settings.roi.ratio = 0.0;
        assert!(ModeEngine::new(Mode::Normal, settings).is_err());
    }

    #[test]
    fn blend_toward_white() {
        assert_eq!(blend_white(0, 0.5), 128);
        assert_eq!(blend_white(255, 0.5), 255);
        assert_eq!(blend_white(40, 0.0), 40);
        assert_eq!(blend_white(40, 1.0), 255);
    }
}
