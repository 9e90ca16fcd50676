// SPDX-License-Identifier: GPL-3.0-only

//! Preview application state
//!
//! - [`state`]: playback, files action and view transforms
//! - [`debounce`]: coalescing of LED brightness changes

pub mod debounce;
pub mod state;

pub use debounce::BrightnessDebouncer;
pub use state::{AppState, FilesAction, Playback, Rotation, Zoom};
