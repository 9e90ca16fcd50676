// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview
//!
//! Renders the processed feed with Unicode half-block characters, two image
//! rows per terminal row. Frames arrive through the latest-frame slot, so a
//! slow terminal only drops frames and never stalls capture.
//!
//! Keys: `m` next mode, `1`-`3` pick a mode, `space` pause, `s` save
//! (paused) or browse (live), `z` zoom, `r` rotate, `+`/`-` LED brightness,
//! `h` help, `q`/Ctrl+C quit.

use crate::app::{AppState, BrightnessDebouncer, FilesAction};
use crate::backends::camera::{CaptureLoop, LoopHandle, open_source};
use crate::backends::hardware::{self, Buzzer};
use crate::config::Config;
use crate::constants::hardware::{
    BEEP_DURATION, BEEP_FREQUENCY_HZ, BRIGHTNESS_MAX, BRIGHTNESS_MIN, BRIGHTNESS_STEP,
};
use crate::constants::timing::UI_POLL;
use crate::media::convert::DisplayFrame;
use crate::errors::AppResult;
use crate::pipelines::modes::{Mode, ModeEngine};
use crate::pipelines::sink::{SlotReceiver, latest_frame_slot};
use crate::storage::SnapshotStore;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::{Arc, Mutex};
use tracing::{error, info};

/// Run the terminal preview until the user quits
pub fn run(config: &Config) -> AppResult<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    let (mut led, buzzer) = hardware::open(
        config.hardware.backend,
        config.hardware.led_path.as_deref(),
        config.hardware.pwm_path.as_deref(),
    )?;
    led.set_brightness(config.brightness.initial)?;
    let led = Arc::new(Mutex::new(led));
    let debouncer = BrightnessDebouncer::new(
        runtime.handle().clone(),
        Arc::clone(&led),
        config.brightness.debounce(),
    );

    let source = open_source(&config.source)?;
    let engine = ModeEngine::new(config.initial_mode, config.enhancement.clone())?;
    let (slot_tx, slot_rx) = latest_frame_slot();
    let mut capture = CaptureLoop::new(
        "preview",
        source,
        engine,
        config.display_adapter(),
        Box::new(slot_tx),
    );
    capture.start()?;

    let mut preview = Preview {
        frames: slot_rx,
        handle: capture.handle(),
        state: AppState::new(),
        debouncer,
        buzzer,
        store: SnapshotStore::new(config.snapshot_dir()),
        latest: None,
        message: help_line(),
    };

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = preview.run(&mut terminal);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    capture.stop();
    preview.debouncer.cancel();
    led.lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .cleanup();
    info!(stats = ?capture.stats(), "Preview closed");

    result
}

struct Preview {
    frames: SlotReceiver,
    handle: LoopHandle,
    state: AppState,
    debouncer: BrightnessDebouncer,
    buzzer: Buzzer,
    store: SnapshotStore,
    latest: Option<Arc<DisplayFrame>>,
    message: String,
}

impl Preview {
    fn run(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    ) -> AppResult<()> {
        loop {
            if let Some(frame) = self.frames.take_latest() {
                self.latest = Some(frame);
            }
            if let Some(end) = self.frames.stream_end() {
                let text = format!("{} | 'q' quit", end);
                if self.message != text {
                    info!(%end, "Stream ended");
                    self.message = text;
                }
            }

            let shown = self.shown_frame();
            let status = self.status_line();
            terminal.draw(|f| {
                let area = f.area();

                // Reserve bottom line for status
                let camera_area = Rect {
                    x: area.x,
                    y: area.y,
                    width: area.width,
                    height: area.height.saturating_sub(1),
                };
                f.render_widget(&FrameWidget { frame: shown }, camera_area);

                let status_area = Rect {
                    x: area.x,
                    y: area.height.saturating_sub(1),
                    width: area.width,
                    height: 1,
                };
                f.render_widget(StatusBar { message: &status }, status_area);
            })?;

            if event::poll(UI_POLL)?
                && let Event::Key(key) = event::read()?
                && key.kind == KeyEventKind::Press
            {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    break;
                }
                match key.code {
                    KeyCode::Char('q') => break,
                    KeyCode::Char('m') => self.handle.request_mode_switch(),
                    KeyCode::Char(c @ '1'..='3') => {
                        self.handle.request_mode(Mode::from_index(c as u8 - b'1'));
                    }
                    KeyCode::Char(' ') => {
                        self.state.toggle_playback(self.latest.as_deref());
                    }
                    KeyCode::Char('s') => self.files_action(),
                    KeyCode::Char('z') => self.state.toggle_zoom(),
                    KeyCode::Char('r') => self.state.toggle_rotation(),
                    KeyCode::Char('+') | KeyCode::Char('=') => self.step_brightness(true),
                    KeyCode::Char('-') => self.step_brightness(false),
                    KeyCode::Char('h') => self.message = help_line(),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Frozen frame while paused, newest frame otherwise, with view transforms
    fn shown_frame(&self) -> Option<DisplayFrame> {
        let frame = match self.state.frozen_frame() {
            Some(frozen) => frozen,
            None => self.latest.as_deref()?,
        };
        match self.state.view(frame) {
            Ok(view) => Some(view),
            Err(e) => {
                error!(error = %e, "View transform failed");
                Some(frame.clone())
            }
        }
    }

    fn status_line(&self) -> String {
        format!(
            "{} | {} | {}x | {}° | LED {}% | {}",
            self.handle.current_mode().name(),
            if self.state.is_paused() { "paused" } else { "live" },
            self.state.zoom.factor(),
            self.state.rotation.degrees(),
            self.debouncer.target(),
            self.message
        )
    }

    fn files_action(&mut self) {
        match self.state.files_action() {
            FilesAction::Save => {
                let Some(frame) = self.state.frozen_frame() else {
                    return;
                };
                match self.store.save(frame) {
                    Ok(path) => {
                        if let Err(e) = self.buzzer.beep(BEEP_FREQUENCY_HZ, BEEP_DURATION) {
                            error!(error = %e, "Beep failed");
                        }
                        self.message = format!("Saved: {}", path.display());
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to save snapshot");
                        self.message = format!("Error: {}", e);
                    }
                }
            }
            FilesAction::Browse => self.message = browse_summary(&self.store),
        }
    }

    fn step_brightness(&mut self, up: bool) {
        let current = self.debouncer.target();
        let next = if up {
            (current + BRIGHTNESS_STEP).min(BRIGHTNESS_MAX)
        } else {
            current.saturating_sub(BRIGHTNESS_STEP).max(BRIGHTNESS_MIN)
        };
        if let Err(e) = self.debouncer.submit(next) {
            self.message = format!("Error: {}", e);
        }
    }
}

fn help_line() -> String {
    format!(
        "'m'/'1-3' mode | 'space' pause | 's' {}/{} | 'z' zoom | 'r' rotate | '+/-' LED | 'q' quit",
        FilesAction::Save.label(),
        FilesAction::Browse.label()
    )
}

/// One-line summary of stored snapshots
fn browse_summary(store: &SnapshotStore) -> String {
    let dates = match store.dates() {
        Ok(dates) => dates,
        Err(e) => return format!("Error: {}", e),
    };
    let Some(newest) = dates.first() else {
        return format!("No snapshots in {}", store.base_dir().display());
    };
    let count = store.snapshots(newest).map(|s| s.len()).unwrap_or(0);
    format!(
        "{} day(s) of snapshots, {} on {}",
        dates.len(),
        count,
        newest
    )
}

/// Widget that renders a display frame using half-block characters
struct FrameWidget {
    frame: Option<DisplayFrame>,
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = &self.frame else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };
        if area.width == 0 || area.height == 0 {
            return;
        }

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        for ty in 0..display_height {
            for tx in 0..display_width {
                let src_x = ((tx as f64 * x_scale) as u32).min(frame.width - 1);
                let src_y_top = ((ty as f64 * 2.0 * y_scale) as u32).min(frame.height - 1);
                let src_y_bottom =
                    (((ty as f64 * 2.0 + 1.0) * y_scale) as u32).min(frame.height - 1);

                let [r, g, b] = frame.rgb(src_x, src_y_top);
                let top = Color::Rgb(r, g, b);
                let [r, g, b] = frame.rgb(src_x, src_y_bottom);
                let bottom = Color::Rgb(r, g, b);

                if let Some(cell) = buf.cell_mut((x_offset + tx, y_offset + ty)) {
                    cell.set_char('▀');
                    cell.set_fg(top);
                    cell.set_bg(bottom);
                }
            }
        }
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    #[test]
    fn frame_widget_uses_half_blocks() {
        let frame = DisplayFrame {
            width: 4,
            height: 4,
            stride: 12,
            format: PixelFormat::Rgb24,
            data: [255u8, 0, 0].repeat(16),
            sequence: 1,
        };
        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        (&FrameWidget { frame: Some(frame) }).render(area, &mut buf);

        for y in 0..2u16 {
            for x in 0..4u16 {
                let cell = &buf[(x, y)];
                assert_eq!(cell.symbol(), "▀");
                assert_eq!(cell.fg, Color::Rgb(255, 0, 0));
                assert_eq!(cell.bg, Color::Rgb(255, 0, 0));
            }
        }
    }

    #[test]
    fn empty_widget_shows_placeholder() {
        let area = Rect::new(0, 0, 30, 3);
        let mut buf = Buffer::empty(area);
        (&FrameWidget { frame: None }).render(area, &mut buf);
        assert_eq!(buf[(4u16, 1u16)].symbol(), "W");
    }

    #[test]
    fn status_bar_truncates() {
        let area = Rect::new(0, 0, 3, 1);
        let mut buf = Buffer::empty(area);
        StatusBar { message: "abcdef" }.render(area, &mut buf);
        assert_eq!(buf[(2u16, 0u16)].symbol(), "c");
    }

    #[test]
    fn browse_summary_reports_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        assert!(browse_summary(&store).starts_with("No snapshots"));
    }
}
