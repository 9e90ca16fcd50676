// SPDX-License-Identifier: MPL-2.0

//! Veinscope - vein visualization camera
//!
//! Captures frames from an infrared sensor (or a still image or recorded
//! sequence during development), applies one of three display modes and
//! hands display-ready frames to a consumer, while driving the illumination
//! LED and a feedback buzzer.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Frame sources, the capture loop, LED and buzzer
//! - [`pipelines`]: Mode engine, vein enhancement and frame sinks
//! - [`media`]: Display layout conversion
//! - [`app`]: Preview state and brightness debouncing
//! - [`config`]: User configuration handling
//! - [`storage`]: Snapshot storage
//! - [`terminal`]: Terminal preview
//!
//! # Example
//!
//! ```ignore
//! let source = open_source(&SourceDescriptor::still("hand.png"))?;
//! let engine = ModeEngine::new(Mode::VeinEnhanced, EnhancementSettings::default())?;
//! let (tx, rx) = latest_frame_slot();
//! let mut capture = CaptureLoop::new("demo", source, engine, DisplayAdapter::default(), Box::new(tx));
//! capture.start()?;
//! ```

pub mod app;
pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod media;
pub mod pipelines;
pub mod storage;
pub mod terminal;

// Re-export commonly used types
pub use backends::camera::{
    CaptureLoop, FrameSource, LoopHandle, LoopState, SourceDescriptor, open_source,
};
pub use backends::camera::types::{Frame, PixelFormat};
pub use config::Config;
pub use errors::{AppError, AppResult};
pub use media::convert::{DisplayAdapter, DisplayFrame};
pub use pipelines::modes::{EnhancementSettings, Mode, ModeEngine};
pub use pipelines::sink::{FrameSink, SinkEvent, StreamEnd, latest_frame_slot};
