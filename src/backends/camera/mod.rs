// SPDX-License-Identifier: MPL-2.0

//! Frame sources and the capture loop that drives them
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────┐
//! │  SourceDescriptor    │  ← config / CLI string
//! └──────────┬───────────┘
//!            │ open_source()
//!            ▼
//! ┌──────────────────────┐
//! │ FrameSource trait    │  ← read / release
//! └──────────┬───────────┘
//!            │
//!     ┌──────┼─────────┐
//!     ▼      ▼         ▼
//!  ┌─────┐ ┌─────┐ ┌──────┐
//!  │V4L2 │ │Still│ │Replay│
//!  └─────┘ └─────┘ └──────┘
//! ```
//!
//! [`frame_loop::CaptureLoop`] owns one source and pulls frames from it on a
//! dedicated thread.

pub mod frame_loop;
mod handoff;
pub mod replay;
pub mod still;
pub mod types;
#[cfg(feature = "v4l2")]
pub mod v4l2;

pub use frame_loop::{CaptureLoop, LoopHandle, LoopState, LoopStats};
pub use replay::ReplaySource;
pub use still::StillImageSource;
pub use types::*;

use crate::constants::source as defaults;
use crate::errors::SourceResult;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// A producer of raw frames
///
/// Implementations are moved onto the capture thread, so they only need to
/// be `Send`.
pub trait FrameSource: Send {
    /// Name for logging
    fn name(&self) -> &str;

    /// Produce the next frame
    ///
    /// Blocks until a frame is ready (live sensors) or until the emulated
    /// frame interval has elapsed (file sources).
    ///
    /// # Errors
    /// * `Transient` - no frame this tick, the caller should try again
    /// * `EndOfStream` - a recorded sequence is exhausted
    /// * `Fatal` - the device is gone or the source was released
    fn read(&mut self) -> SourceResult<Frame>;

    /// Free the underlying device or file handles
    ///
    /// Safe to call more than once. Every `read()` after release fails with
    /// `Fatal`.
    fn release(&mut self);

    /// Whether `release()` has been called
    fn is_released(&self) -> bool;
}

/// Which source to open
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceDescriptor {
    /// Live V4L2 sensor
    Device {
        path: PathBuf,
        width: u32,
        height: u32,
        fps: u32,
    },
    /// One image file, repeated at a fixed cadence
    Still { path: PathBuf, delay_ms: u64 },
    /// A directory of image files played in name order
    Replay {
        dir: PathBuf,
        fps: u32,
        #[serde(default)]
        looping: bool,
    },
}

impl Default for SourceDescriptor {
    fn default() -> Self {
        Self::device(defaults::DEVICE_PATH)
    }
}

impl SourceDescriptor {
    /// Live sensor at the default resolution
    pub fn device(path: impl Into<PathBuf>) -> Self {
        Self::Device {
            path: path.into(),
            width: defaults::DEVICE_WIDTH,
            height: defaults::DEVICE_HEIGHT,
            fps: defaults::DEVICE_FPS,
        }
    }

    /// Still image at the default cadence
    pub fn still(path: impl Into<PathBuf>) -> Self {
        Self::Still {
            path: path.into(),
            delay_ms: defaults::STILL_FRAME_DELAY.as_millis() as u64,
        }
    }

    /// Parse a command-line source string
    ///
    /// Accepted forms:
    /// * `device:/dev/video0` or a bare `/dev/...` path
    /// * `still:path/to/image.png`
    /// * `replay:path/to/dir` or `replay-loop:path/to/dir`
    /// * a bare path: directories replay, files are stills
    pub fn parse(input: &str) -> Result<Self, String> {
        let input = input.trim();
        if input.is_empty() {
            return Err("empty source".to_string());
        }

        if let Some((kind, rest)) = input.split_once(':') {
            let rest = rest.trim();
            match kind {
                "device" => return Ok(Self::device(rest)),
                "still" => return Ok(Self::still(rest)),
                "replay" | "replay-loop" => {
                    return Ok(Self::Replay {
                        dir: PathBuf::from(rest),
                        fps: defaults::REPLAY_FPS,
                        looping: kind == "replay-loop",
                    });
                }
                _ => {}
            }
        }

        let path = PathBuf::from(input);
        if input.starts_with("/dev/") {
            Ok(Self::device(path))
        } else if path.is_dir() {
            Ok(Self::Replay {
                dir: path,
                fps: defaults::REPLAY_FPS,
                looping: false,
            })
        } else {
            Ok(Self::still(path))
        }
    }
}

impl std::fmt::Display for SourceDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Device {
                path,
                width,
                height,
                fps,
            } => write!(f, "device:{} ({}x{}@{})", path.display(), width, height, fps),
            Self::Still { path, delay_ms } => {
                write!(f, "still:{} ({}ms)", path.display(), delay_ms)
            }
            Self::Replay { dir, fps, looping } => write!(
                f,
                "replay:{} ({}fps{})",
                dir.display(),
                fps,
                if *looping { ", looping" } else { "" }
            ),
        }
    }
}

/// Open the source a descriptor names
///
/// # Errors
/// `Unavailable` when the backend cannot be constructed. Live devices need
/// the `v4l2` feature; without it they fail here instead of at the first read.
pub fn open_source(descriptor: &SourceDescriptor) -> SourceResult<Box<dyn FrameSource>> {
    info!(source = %descriptor, "Opening frame source");
    match descriptor {
        SourceDescriptor::Device {
            path,
            width,
            height,
            fps,
        } => open_device(path, *width, *height, *fps),
        SourceDescriptor::Still { path, delay_ms } => Ok(Box::new(StillImageSource::open(
            path,
            Duration::from_millis(*delay_ms),
        )?)),
        SourceDescriptor::Replay { dir, fps, looping } => {
            Ok(Box::new(ReplaySource::open(dir, *fps, *looping)?))
        }
    }
}

#[cfg(feature = "v4l2")]
fn open_device(
    path: &std::path::Path,
    width: u32,
    height: u32,
    fps: u32,
) -> SourceResult<Box<dyn FrameSource>> {
    Ok(Box::new(v4l2::LiveSource::open(path, width, height, fps)?))
}

#[cfg(not(feature = "v4l2"))]
fn open_device(
    path: &std::path::Path,
    _width: u32,
    _height: u32,
    _fps: u32,
) -> SourceResult<Box<dyn FrameSource>> {
    Err(crate::errors::SourceError::Unavailable(format!(
        "{}: live capture backend unavailable (built without the v4l2 feature)",
        path.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;

    #[test]
    fn parse_prefixed_sources() {
        assert_eq!(
            SourceDescriptor::parse("device:/dev/video2").unwrap(),
            SourceDescriptor::device("/dev/video2")
        );
        assert_eq!(
            SourceDescriptor::parse("still:hand.png").unwrap(),
            SourceDescriptor::still("hand.png")
        );
        assert!(matches!(
            SourceDescriptor::parse("replay-loop:clips").unwrap(),
            SourceDescriptor::Replay { looping: true, .. }
        ));
    }

    #[test]
    fn parse_bare_paths() {
        assert!(matches!(
            SourceDescriptor::parse("/dev/video0").unwrap(),
            SourceDescriptor::Device { .. }
        ));
        assert!(matches!(
            SourceDescriptor::parse("missing-file.jpg").unwrap(),
            SourceDescriptor::Still { .. }
        ));
        assert!(SourceDescriptor::parse("  ").is_err());
    }

    #[test]
    fn descriptor_json_is_tagged() {
        let json = serde_json::to_string(&SourceDescriptor::still("a.png")).unwrap();
        assert!(json.contains("\"kind\":\"still\""));
        let back: SourceDescriptor = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SourceDescriptor::still("a.png"));
    }

    #[cfg(not(feature = "v4l2"))]
    #[test]
    fn device_without_backend_fails_fast() {
        let err = open_source(&SourceDescriptor::device("/dev/video0")).err();
        assert!(matches!(err, Some(SourceError::Unavailable(_))));
    }

    #[test]
    fn missing_still_is_unavailable() {
        let err = open_source(&SourceDescriptor::still("/nonexistent/vein.png")).err();
        assert!(matches!(err, Some(SourceError::Unavailable(_))));
    }
}
