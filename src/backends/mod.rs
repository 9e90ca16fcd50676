// SPDX-License-Identifier: MPL-2.0

//! Backend abstraction layer for frame capture and device hardware
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │            Capture loop / preview            │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                   │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │     Camera       │  │    Hardware     │  │
//! │  │ V4L2 / still /   │  │  LED / buzzer   │  │
//! │  │     replay       │  │ sysfs / sim     │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Frame sources and the capture loop
//! - [`hardware`]: Illumination LED and feedback buzzer

pub mod camera;
pub mod hardware;
