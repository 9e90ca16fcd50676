// SPDX-License-Identifier: GPL-3.0-only

//! Application state management
//!
//! Pure state for the preview: whether the feed is live, what the files
//! button does, and the view transforms. Nothing here touches the renderer
//! or the capture thread.

use crate::errors::FrameResult;
use crate::media::convert::DisplayFrame;

/// Live feed or frozen frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Playback {
    #[default]
    Live,
    Paused,
}

/// What the files button does in the current playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilesAction {
    /// Open the snapshot browser
    Browse,
    /// Save the frozen frame
    Save,
}

impl FilesAction {
    pub fn label(&self) -> &'static str {
        match self {
            FilesAction::Browse => "browse",
            FilesAction::Save => "save",
        }
    }
}

/// Center crop factor applied to the displayed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zoom {
    #[default]
    X1,
    X2,
}

impl Zoom {
    pub fn toggle(self) -> Self {
        match self {
            Zoom::X1 => Zoom::X2,
            Zoom::X2 => Zoom::X1,
        }
    }

    pub fn factor(self) -> u32 {
        match self {
            Zoom::X1 => 1,
            Zoom::X2 => 2,
        }
    }
}

/// Display rotation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg180,
}

impl Rotation {
    pub fn toggle(self) -> Self {
        match self {
            Rotation::Deg0 => Rotation::Deg180,
            Rotation::Deg180 => Rotation::Deg0,
        }
    }

    pub fn degrees(self) -> u32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg180 => 180,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub playback: Playback,
    pub zoom: Zoom,
    pub rotation: Rotation,
    /// Frame held while paused
    frozen: Option<DisplayFrame>,
}

impl AppState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_paused(&self) -> bool {
        self.playback == Playback::Paused
    }

    /// Browse while live, save while paused
    pub fn files_action(&self) -> FilesAction {
        match self.playback {
            Playback::Live => FilesAction::Browse,
            Playback::Paused => FilesAction::Save,
        }
    }

    /// Toggle between live and paused
    ///
    /// Pausing freezes `current`. Pausing with no frame yet stays live.
    pub fn toggle_playback(&mut self, current: Option<&DisplayFrame>) {
        match self.playback {
            Playback::Live => {
                if let Some(frame) = current {
                    self.frozen = Some(frame.clone());
                    self.playback = Playback::Paused;
                }
            }
            Playback::Paused => {
                self.frozen = None;
                self.playback = Playback::Live;
            }
        }
    }

    /// Frame held while paused, untransformed
    pub fn frozen_frame(&self) -> Option<&DisplayFrame> {
        self.frozen.as_ref()
    }

    pub fn toggle_zoom(&mut self) {
        self.zoom = self.zoom.toggle();
    }

    pub fn toggle_rotation(&mut self) {
        self.rotation = self.rotation.toggle();
    }

    /// Apply zoom then rotation to a frame for display
    pub fn view(&self, frame: &DisplayFrame) -> FrameResult<DisplayFrame> {
        let zoomed = frame.zoomed(self.zoom.factor())?;
        Ok(match self.rotation {
            Rotation::Deg0 => zoomed,
            Rotation::Deg180 => zoomed.rotated_180(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    fn frame(sequence: u64) -> DisplayFrame {
        DisplayFrame {
            width: 2,
            height: 1,
            stride: 2,
            format: PixelFormat::Gray8,
            data: vec![10, 20],
            sequence,
        }
    }

    #[test]
    fn files_action_follows_playback() {
        let mut state = AppState::new();
        assert_eq!(state.files_action(), FilesAction::Browse);

        state.toggle_playback(Some(&frame(1)));
        assert!(state.is_paused());
        assert_eq!(state.files_action(), FilesAction::Save);
        assert_eq!(state.frozen_frame().map(|f| f.sequence), Some(1));

        state.toggle_playback(None);
        assert_eq!(state.files_action(), FilesAction::Browse);
        assert!(state.frozen_frame().is_none());
    }

    #[test]
    fn pause_without_frame_stays_live() {
        let mut state = AppState::new();
        state.toggle_playback(None);
        assert_eq!(state.playback, Playback::Live);
    }

    #[test]
    fn view_applies_rotation() {
        let mut state = AppState::new();
        assert_eq!(state.view(&frame(1)).unwrap().data, vec![10, 20]);

        state.toggle_rotation();
        assert_eq!(state.rotation.degrees(), 180);
        assert_eq!(state.view(&frame(1)).unwrap().data, vec![20, 10]);
    }

    #[test]
    fn zoom_toggles() {
        let mut state = AppState::new();
        state.toggle_zoom();
        assert_eq!(state.zoom.factor(), 2);
        state.toggle_zoom();
        assert_eq!(state.zoom, Zoom::X1);
    }
}
