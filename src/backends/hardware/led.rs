// SPDX-License-Identifier: GPL-3.0-only

//! Infrared LED brightness control
//!
//! The sysfs backend drives a Linux LED class device (`brightness` and
//! `max_brightness` files). Percentages are scaled to the device range.

use crate::constants::hardware::{BRIGHTNESS_MAX, BRIGHTNESS_MIN};
use crate::errors::{HardwareError, HardwareResult};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
enum LedBackend {
    Simulated,
    Sysfs {
        /// Sysfs directory, e.g. `/sys/class/leds/veinscope-ir`
        path: PathBuf,
        /// Value of the `max_brightness` file
        max_brightness: u32,
    },
}

/// LED brightness in percent
#[derive(Debug, Clone)]
pub struct LedController {
    backend: LedBackend,
    brightness: u32,
    writes: u64,
}

impl LedController {
    /// In-memory LED that logs every change
    pub fn simulated() -> Self {
        Self {
            backend: LedBackend::Simulated,
            brightness: 0,
            writes: 0,
        }
    }

    /// LED class device at `path`
    ///
    /// Reads `max_brightness` and checks that `brightness` is writable.
    pub fn sysfs(path: &Path) -> HardwareResult<Self> {
        let max_brightness_path = path.join("max_brightness");
        let raw = std::fs::read_to_string(&max_brightness_path).map_err(|e| {
            HardwareError::Io(format!("{}: {}", max_brightness_path.display(), e))
        })?;
        let max_brightness = match raw.trim().parse::<u32>() {
            Ok(v) if v > 0 => v,
            _ => {
                return Err(HardwareError::Io(format!(
                    "{}: invalid max_brightness {:?}",
                    max_brightness_path.display(),
                    raw.trim()
                )));
            }
        };

        let brightness_path = path.join("brightness");
        std::fs::OpenOptions::new()
            .write(true)
            .open(&brightness_path)
            .map_err(|e| HardwareError::Io(format!("{}: {}", brightness_path.display(), e)))?;

        info!(path = %path.display(), max_brightness, "Opened LED");

        Ok(Self {
            backend: LedBackend::Sysfs {
                path: path.to_path_buf(),
                max_brightness,
            },
            brightness: 0,
            writes: 0,
        })
    }

    /// Set brightness in percent
    ///
    /// # Errors
    /// `OutOfRange` for values above 100, with no state change. `Io` if the
    /// device write fails.
    pub fn set_brightness(&mut self, percent: u32) -> HardwareResult<()> {
        if percent > BRIGHTNESS_MAX {
            return Err(HardwareError::OutOfRange {
                value: percent,
                min: BRIGHTNESS_MIN,
                max: BRIGHTNESS_MAX,
            });
        }

        match &self.backend {
            LedBackend::Simulated => {
                debug!(percent, "Simulated LED brightness");
            }
            LedBackend::Sysfs {
                path,
                max_brightness,
            } => {
                let raw = scale(percent, *max_brightness);
                std::fs::write(path.join("brightness"), raw.to_string())?;
                debug!(percent, raw, "LED brightness written");
            }
        }

        self.brightness = percent;
        self.writes += 1;
        Ok(())
    }

    /// Last brightness successfully applied, in percent
    pub fn brightness(&self) -> u32 {
        self.brightness
    }

    /// Number of successful brightness writes
    pub fn write_count(&self) -> u64 {
        self.writes
    }

    pub fn is_simulated(&self) -> bool {
        matches!(self.backend, LedBackend::Simulated)
    }

    /// Turn the LED off before exit
    pub fn cleanup(&mut self) {
        if let Err(e) = self.set_brightness(BRIGHTNESS_MIN) {
            warn!(error = %e, "Failed to turn off LED");
        }
    }
}

/// Percent to device units, rounded
fn scale(percent: u32, max_brightness: u32) -> u32 {
    ((percent as u64 * max_brightness as u64 + 50) / 100) as u32
}
