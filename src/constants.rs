// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How LED and buzzer commands reach the device
///
/// Chosen explicitly through configuration, never probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HardwareBackend {
    /// Log commands and keep state in memory (development hosts)
    #[default]
    Simulated,
    /// Drive Linux sysfs LED and PWM class devices
    Sysfs,
}

impl HardwareBackend {
    /// Every backend, in display order
    pub const ALL: [HardwareBackend; 2] = [HardwareBackend::Simulated, HardwareBackend::Sysfs];

    /// Get display name for the backend
    pub fn display_name(&self) -> &'static str {
        match self {
            HardwareBackend::Simulated => "simulated",
            HardwareBackend::Sysfs => "sysfs",
        }
    }

    /// Parse a backend from its display name (case-insensitive)
    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|b| b.display_name().eq_ignore_ascii_case(name.trim()))
    }
}

/// Vein enhancement defaults
pub mod enhancement {
    /// CLAHE clip limit
    pub const CLIP_LIMIT: f32 = 2.0;

    /// CLAHE tile grid (columns, rows)
    pub const TILE_GRID: (u32, u32) = (8, 8);

    /// CLAHE passes applied per frame
    pub const CLAHE_ITERATIONS: u32 = 5;

    /// Accepted range for CLAHE passes
    pub const MIN_ITERATIONS: u32 = 1;
    pub const MAX_ITERATIONS: u32 = 5;

    /// Luminance at or below this value is treated as vein
    pub const THRESHOLD: u8 = 50;

    /// Elliptical opening kernel (width, height)
    pub const KERNEL_SIZE: (u32, u32) = (2, 2);

    /// Largest accepted opening kernel side
    pub const MAX_KERNEL: u32 = 31;

    /// Opening passes
    pub const OPEN_ITERATIONS: u32 = 1;

    /// Vein highlight color (RGB)
    pub const HIGHLIGHT: [u8; 3] = [0, 255, 0];

    /// Fraction of each frame dimension covered by the region of interest
    pub const ROI_RATIO: f32 = 0.5;

    /// Blend factor toward white outside the region of interest
    pub const ROI_OPACITY: f32 = 0.5;
}

/// Frame source timing
pub mod source {
    use super::Duration;

    /// Cadence of the still image source
    pub const STILL_FRAME_DELAY: Duration = Duration::from_millis(30);

    /// Default replay rate for recorded sequences
    pub const REPLAY_FPS: u32 = 30;

    /// Default live sensor mode
    pub const DEVICE_PATH: &str = "/dev/video0";
    pub const DEVICE_WIDTH: u32 = 640;
    pub const DEVICE_HEIGHT: u32 = 480;
    pub const DEVICE_FPS: u32 = 30;

    /// Memory-mapped buffers queued on the live sensor
    pub const DEVICE_BUFFERS: u32 = 4;

    /// How long the sensor reader waits in one dequeue before rechecking its stop flag
    pub const DEVICE_POLL: Duration = Duration::from_millis(200);

    /// Longest `read()` wait for a live frame before the tick is skipped
    pub const DEVICE_READ_TIMEOUT: Duration = Duration::from_secs(1);

    /// Longest wait for the sensor reader to exit on release
    pub const DEVICE_RELEASE_TIMEOUT: Duration = Duration::from_secs(1);
}

/// Display surface
pub mod display {
    /// Box the preview is fitted into
    pub const WIDTH: u32 = 640;
    pub const HEIGHT: u32 = 480;

    /// Frames between FPS log lines
    pub const FRAME_LOG_INTERVAL: u64 = 30;
}

/// LED and buzzer
pub mod hardware {
    use super::Duration;

    /// Brightness slider bounds in percent
    pub const BRIGHTNESS_MIN: u32 = 0;
    pub const BRIGHTNESS_MAX: u32 = 100;

    /// Brightness applied at startup
    pub const DEFAULT_BRIGHTNESS: u32 = 50;

    /// Step used by the +/- preview keys
    pub const BRIGHTNESS_STEP: u32 = 5;

    /// Quiet period before a brightness change reaches the LED
    pub const BRIGHTNESS_DEBOUNCE: Duration = Duration::from_millis(150);

    /// Feedback tone on snapshot save
    pub const BEEP_FREQUENCY_HZ: u32 = 1000;
    pub const BEEP_DURATION: Duration = Duration::from_millis(200);

    /// Default sysfs nodes
    pub const LED_SYSFS_PATH: &str = "/sys/class/leds/veinscope-ir";
    pub const PWM_SYSFS_PATH: &str = "/sys/class/pwm/pwmchip0/pwm0";
}

/// Snapshot layout
pub mod snapshots {
    /// Directory under the pictures folder
    pub const DIR_NAME: &str = "veinscope";

    /// File name prefix inside a dated folder
    pub const FILE_PREFIX: &str = "image_";

    /// Date folder format
    pub const DATE_FORMAT: &str = "%Y-%m-%d";

    /// Extensions listed when browsing
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

    /// Check if extension is a browsable image (case-insensitive)
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }
}

/// Capture loop
pub mod timing {
    use super::Duration;

    /// Sleep after a transient read failure before retrying
    pub const TRANSIENT_BACKOFF: Duration = Duration::from_millis(5);

    /// Preview redraw poll interval
    pub const UI_POLL: Duration = Duration::from_millis(16);
}
