// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Loaded from JSON, then overridden from the environment, then validated.
//! Every field has a default so a partial file is enough.

use crate::backends::camera::SourceDescriptor;
use crate::backends::camera::types::PixelFormat;
use crate::constants::{HardwareBackend, display, hardware};
use crate::errors::ConfigError;
use crate::media::convert::DisplayAdapter;
use crate::pipelines::modes::{EnhancementSettings, Mode};
use crate::storage::default_snapshot_dir;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variables read by [`Config::load`]
pub mod env {
    pub const SOURCE: &str = "VEINSCOPE_SOURCE";
    pub const MODE: &str = "VEINSCOPE_MODE";
    pub const HARDWARE: &str = "VEINSCOPE_HARDWARE";
    pub const SNAPSHOT_DIR: &str = "VEINSCOPE_SNAPSHOT_DIR";
}

/// Display surface the preview is rendered for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    pub width: u32,
    pub height: u32,
    /// Layout the display consumes
    pub format: PixelFormat,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            width: display::WIDTH,
            height: display::HEIGHT,
            format: PixelFormat::Rgb24,
        }
    }
}

/// LED and buzzer selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HardwareSettings {
    pub backend: HardwareBackend,
    /// LED class directory, default sysfs node when unset
    pub led_path: Option<PathBuf>,
    /// PWM channel directory, default sysfs node when unset
    pub pwm_path: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrightnessSettings {
    /// Percent applied at startup
    pub initial: u32,
    /// Quiet window before a change reaches the LED
    pub debounce_ms: u64,
}

impl Default for BrightnessSettings {
    fn default() -> Self {
        Self {
            initial: hardware::DEFAULT_BRIGHTNESS,
            debounce_ms: hardware::BRIGHTNESS_DEBOUNCE.as_millis() as u64,
        }
    }
}

impl BrightnessSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source: SourceDescriptor,
    /// Mode the engine starts in
    pub initial_mode: Mode,
    pub enhancement: EnhancementSettings,
    pub display: DisplaySettings,
    pub hardware: HardwareSettings,
    /// Snapshot base directory, ~/Pictures/veinscope when unset
    pub snapshot_dir: Option<PathBuf>,
    pub brightness: BrightnessSettings,
}

impl Config {
    /// `$XDG_CONFIG_HOME/veinscope/config.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("veinscope").join("config.json"))
    }

    /// Load, override and validate
    ///
    /// An explicit `path` must exist. Without one the default path is used
    /// if present, otherwise defaults apply. `lookup` reads environment
    /// variables; pass `|k| std::env::var(k).ok()` in production.
    pub fn load<F>(path: Option<&Path>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => {
                    debug!("No config file, using defaults");
                    Self::default()
                }
            },
        };

        config.apply_env(lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        let config = Self::from_json(&text)?;
        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Apply `VEINSCOPE_*` overrides
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(env::SOURCE) {
            self.source = SourceDescriptor::parse(&value).map_err(|reason| ConfigError::Invalid {
                field: env::SOURCE,
                reason,
            })?;
        }
        if let Some(value) = lookup(env::MODE) {
            self.initial_mode = Mode::parse(&value).ok_or_else(|| ConfigError::Invalid {
                field: env::MODE,
                reason: format!("unknown mode {:?}", value),
            })?;
        }
        if let Some(value) = lookup(env::HARDWARE) {
            self.hardware.backend =
                HardwareBackend::parse(&value).ok_or_else(|| ConfigError::Invalid {
                    field: env::HARDWARE,
                    reason: format!("unknown backend {:?}", value),
                })?;
        }
        if let Some(value) = lookup(env::SNAPSHOT_DIR) {
            self.snapshot_dir = Some(PathBuf::from(value));
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.enhancement.validate()?;
        if self.display.width == 0 || self.display.height == 0 {
            return Err(ConfigError::Invalid {
                field: "display",
                reason: format!("{}x{} is empty", self.display.width, self.display.height),
            });
        }
        if self.brightness.initial > hardware::BRIGHTNESS_MAX {
            return Err(ConfigError::Invalid {
                field: "brightness.initial",
                reason: format!(
                    "{} outside {}..={}",
                    self.brightness.initial,
                    hardware::BRIGHTNESS_MIN,
                    hardware::BRIGHTNESS_MAX
                ),
            });
        }
        Ok(())
    }

    pub fn snapshot_dir(&self) -> PathBuf {
        self.snapshot_dir.clone().unwrap_or_else(default_snapshot_dir)
    }

    /// Adapter producing frames for the configured display
    pub fn display_adapter(&self) -> DisplayAdapter {
        DisplayAdapter::new(
            self.display.format,
            Some((self.display.width, self.display.height)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config = Config::from_json(r#"{"initial_mode": "inverted"}"#).unwrap();
        assert_eq!(config.initial_mode, Mode::Inverted);
        assert_eq!(config.enhancement, EnhancementSettings::default());
        assert_eq!(config.brightness.debounce(), Duration::from_millis(150));
    }

    #[test]
    fn bad_json_is_a_parse_error() {
        assert!(matches!(
            Config::from_json("{ not json"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn explicit_missing_path_fails() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.json");
        assert!(matches!(
            Config::load(Some(missing.as_path()), no_env),
            Err(ConfigError::Read(_))
        ));
    }

    #[test]
    fn unknown_env_mode_is_invalid() {
        let mut config = Config::default();
        let err = config
            .apply_env(|k| (k == env::MODE).then(|| "sepia".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: env::MODE, .. }));
    }

    #[test]
    fn brightness_above_range_is_invalid() {
        let mut config = Config::default();
        config.brightness.initial = 120;
        assert!(config.validate().is_err());
    }
}
