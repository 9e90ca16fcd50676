// SPDX-License-Identifier: MPL-2.0

//! Pixel layout conversion for display and storage
//!
//! Processed frames keep the sensor layout until they reach a consumer. The
//! [`convert`] module turns them into packed buffers in the layout the
//! display wants, fitted into its box, and provides the view transforms
//! (zoom, rotation) and image crate conversion used for snapshots.
//!
//! # Modules
//!
//! - [`convert`]: Display adapter and layout conversion

pub mod convert;

// Re-export commonly used types
pub use convert::{DisplayAdapter, DisplayFrame, convert_layout, fit_within};
