// SPDX-License-Identifier: MPL-2.0

//! Frame processing between the source and the display
//!
//! # Pipeline Architecture
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────┐
//! │ Source Frame │ ──▶ │    Mode Engine    │ ──▶ │  Frame Sink  │
//! │ (BGR/RGB/Y)  │     │  - Normal         │     │  - preview   │
//! │              │     │  - Inverted       │     │  - snapshot  │
//! │              │     │  - Vein enhanced  │     │              │
//! └──────────────┘     └───────────────────┘     └──────────────┘
//! ```
//!
//! # Modules
//!
//! - [`enhance`]: CLAHE, thresholding, morphology and region of interest
//! - [`modes`]: Display modes and the engine applying them
//! - [`sink`]: Consumers of finished frames

pub mod enhance;
pub mod modes;
pub mod sink;
