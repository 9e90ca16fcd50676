// SPDX-License-Identifier: GPL-3.0-only
//! Capture loop thread lifecycle
//!
//! The loop owns a [`FrameSource`], a [`ModeEngine`], a [`DisplayAdapter`]
//! and a [`FrameSink`]. Each tick reads one frame, transforms it, converts
//! it for display and hands it to the sink, all on one dedicated thread.
//!
//! Other threads talk to the loop only through atomics: a stop flag, a
//! counter of pending mode switches, a requested target mode and a mirror
//! of the current mode.
//!
//! ```text
//!  Idle ──start()──▶ Running ──stop() / fatal read──▶ Stopping ──join──▶ Stopped
//!    └─────────────────────stop()──────────────────────────┘
//! ```

use super::FrameSource;
use crate::constants::{display::FRAME_LOG_INTERVAL, timing::TRANSIENT_BACKOFF};
use crate::errors::LoopError;
use crate::media::convert::DisplayAdapter;
use crate::pipelines::modes::{Mode, ModeEngine};
use crate::pipelines::sink::{FrameSink, StreamEnd};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use tracing::{debug, info, trace, warn};

/// Action returned by one loop iteration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopAction {
    /// Continue running the loop
    Continue,
    /// Stop the loop gracefully
    Stop,
}

/// Lifecycle state of a [`CaptureLoop`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// Constructed, not started
    Idle,
    /// Thread running
    Running,
    /// Stop requested or stream ended; thread finishing
    Stopping,
    /// Source released and thread joined
    Stopped,
}

impl LoopState {
    fn as_u8(self) -> u8 {
        match self {
            LoopState::Idle => 0,
            LoopState::Running => 1,
            LoopState::Stopping => 2,
            LoopState::Stopped => 3,
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => LoopState::Idle,
            1 => LoopState::Running,
            2 => LoopState::Stopping,
            _ => LoopState::Stopped,
        }
    }
}

/// Frame counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Frames handed to the sink
    pub delivered: u64,
    /// Ticks that produced no frame
    pub skipped: u64,
}

/// Marks an empty `requested_mode` slot
const NO_MODE_REQUEST: u8 = u8::MAX;

/// State shared between the loop thread and its controllers
struct Shared {
    state: AtomicU8,
    stop_signal: AtomicBool,
    pending_switches: AtomicU32,
    requested_mode: AtomicU8,
    mode: AtomicU8,
    delivered: AtomicU64,
    skipped: AtomicU64,
}

impl Shared {
    fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::SeqCst))
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state.as_u8(), Ordering::SeqCst);
    }

    fn transition(&self, from: LoopState, to: LoopState) -> bool {
        self.state
            .compare_exchange(from.as_u8(), to.as_u8(), Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

/// Cloneable control handle for a running loop
///
/// Safe to use from any thread, including from inside the sink.
#[derive(Clone)]
pub struct LoopHandle {
    shared: Arc<Shared>,
}

impl LoopHandle {
    /// Ask the loop to advance to the next mode
    ///
    /// Consumed at the top of the next iteration; an in-flight read is
    /// never interrupted. Every request counts.
    pub fn request_mode_switch(&self) {
        self.shared.pending_switches.fetch_add(1, Ordering::SeqCst);
    }

    /// Ask the loop to jump to `mode`
    ///
    /// Replaces switches requested earlier and not yet consumed; switches
    /// requested afterwards apply on top of it.
    pub fn request_mode(&self, mode: Mode) {
        self.shared.pending_switches.store(0, Ordering::SeqCst);
        self.shared.requested_mode.store(mode.index(), Ordering::SeqCst);
    }

    /// Signal the loop to stop without waiting for it
    pub fn request_stop(&self) {
        self.shared.stop_signal.store(true, Ordering::SeqCst);
        self.shared.transition(LoopState::Running, LoopState::Stopping);
    }

    /// Mode the loop applied on its most recent iteration
    pub fn current_mode(&self) -> Mode {
        Mode::from_index(self.shared.mode.load(Ordering::SeqCst))
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    pub fn stats(&self) -> LoopStats {
        LoopStats {
            delivered: self.shared.delivered.load(Ordering::SeqCst),
            skipped: self.shared.skipped.load(Ordering::SeqCst),
        }
    }
}

/// Everything the loop thread owns
struct Worker {
    source: Box<dyn FrameSource>,
    engine: ModeEngine,
    adapter: DisplayAdapter,
    sink: Box<dyn FrameSink>,
}

impl Worker {
    /// One iteration: consume mode requests, read, transform, present, emit
    fn tick(&mut self, shared: &Shared, name: &str) -> LoopAction {
        let requested = shared.requested_mode.swap(NO_MODE_REQUEST, Ordering::SeqCst);
        if requested != NO_MODE_REQUEST {
            self.engine.set_mode(Mode::from_index(requested));
        }
        let switches = shared.pending_switches.swap(0, Ordering::SeqCst);
        for _ in 0..(switches as usize % Mode::ALL.len()) {
            self.engine.switch_mode();
        }
        shared
            .mode
            .store(self.engine.current_mode().index(), Ordering::SeqCst);

        let frame = match self.source.read() {
            Ok(frame) => frame,
            Err(e) if e.is_terminal() => {
                warn!(name = %name, error = %e, "Frame source ended");
                shared.transition(LoopState::Running, LoopState::Stopping);
                self.sink.on_stream_end(StreamEnd::from(e));
                return LoopAction::Stop;
            }
            Err(e) => {
                trace!(name = %name, error = %e, "No frame this tick");
                shared.skipped.fetch_add(1, Ordering::SeqCst);
                thread::sleep(TRANSIENT_BACKOFF);
                return LoopAction::Continue;
            }
        };

        let sequence = frame.sequence();
        let processed = match self.engine.apply(frame) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(name = %name, sequence, error = %e, "Enhancement failed, skipping frame");
                shared.skipped.fetch_add(1, Ordering::SeqCst);
                return LoopAction::Continue;
            }
        };

        match self.adapter.present(&processed) {
            Ok(display) => {
                self.sink.on_frame(display);
                let delivered = shared.delivered.fetch_add(1, Ordering::SeqCst) + 1;
                if delivered % FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        name = %name,
                        delivered,
                        sequence,
                        mode = %self.engine.current_mode(),
                        latency_us = processed.captured_at().elapsed().as_micros() as u64,
                        "Frame delivered"
                    );
                }
            }
            Err(e) => {
                warn!(name = %name, sequence, error = %e, "Presentation failed, skipping frame");
                shared.skipped.fetch_add(1, Ordering::SeqCst);
            }
        }
        LoopAction::Continue
    }
}

/// Controller for the capture thread
///
/// # Example
///
/// ```ignore
/// let mut capture = CaptureLoop::new("capture", source, engine, adapter, sink);
/// capture.start()?;
/// capture.handle().request_mode_switch();
/// capture.stop();
/// ```
pub struct CaptureLoop {
    name: String,
    shared: Arc<Shared>,
    /// Present until the thread is started
    worker: Option<Worker>,
    thread_handle: Option<JoinHandle<()>>,
}

impl CaptureLoop {
    pub fn new(
        name: &str,
        source: Box<dyn FrameSource>,
        engine: ModeEngine,
        adapter: DisplayAdapter,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: AtomicU8::new(LoopState::Idle.as_u8()),
            stop_signal: AtomicBool::new(false),
            pending_switches: AtomicU32::new(0),
            requested_mode: AtomicU8::new(NO_MODE_REQUEST),
            mode: AtomicU8::new(engine.current_mode().index()),
            delivered: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
        });
        Self {
            name: name.to_string(),
            shared,
            worker: Some(Worker {
                source,
                engine,
                adapter,
                sink,
            }),
            thread_handle: None,
        }
    }

    /// Spawn the capture thread
    ///
    /// # Errors
    /// `AlreadyStarted` unless the loop is idle; `Spawn` if the OS refuses
    /// to create the thread.
    pub fn start(&mut self) -> Result<(), LoopError> {
        if !self.shared.transition(LoopState::Idle, LoopState::Running) {
            return Err(LoopError::AlreadyStarted);
        }
        let Some(mut worker) = self.worker.take() else {
            return Err(LoopError::AlreadyStarted);
        };

        let shared = Arc::clone(&self.shared);
        let name = self.name.clone();
        info!(name = %self.name, source = %worker.source.name(), "Starting capture loop");

        let spawned = thread::Builder::new().name(self.name.clone()).spawn(move || {
            debug!(name = %name, "Capture loop thread started");

            loop {
                if shared.stop_signal.load(Ordering::SeqCst) {
                    debug!(name = %name, "Stop signal received");
                    break;
                }

                match worker.tick(&shared, &name) {
                    LoopAction::Continue => {}
                    LoopAction::Stop => {
                        debug!(name = %name, "Loop requested stop");
                        break;
                    }
                }
            }

            shared.transition(LoopState::Running, LoopState::Stopping);
            worker.source.release();
            shared.set_state(LoopState::Stopped);
            info!(name = %name, "Capture loop thread exiting");
        });

        match spawned {
            Ok(handle) => {
                self.thread_handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                self.shared.set_state(LoopState::Stopped);
                Err(LoopError::Spawn(e.to_string()))
            }
        }
    }

    /// Control handle usable from other threads
    pub fn handle(&self) -> LoopHandle {
        LoopHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Forwarded to [`LoopHandle::request_mode_switch`]
    pub fn request_mode_switch(&self) {
        self.handle().request_mode_switch();
    }

    pub fn state(&self) -> LoopState {
        self.shared.state()
    }

    pub fn stats(&self) -> LoopStats {
        self.handle().stats()
    }

    /// Check if the thread is still running
    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Signal the loop to stop (non-blocking)
    pub fn request_stop(&self) {
        debug!(name = %self.name, "Requesting capture loop stop");
        self.handle().request_stop();
    }

    /// Stop the loop and wait until the thread has exited and the source is released
    ///
    /// Safe to call at any time and more than once. A loop that was never
    /// started goes straight through Stopping to Stopped and releases its
    /// source. Called on the capture thread itself, it only signals.
    pub fn stop(&mut self) {
        match self.state() {
            // Ended on its own; only the finished thread is left to reap
            LoopState::Stopped => self.join(),
            LoopState::Idle => {
                self.shared.set_state(LoopState::Stopping);
                if let Some(mut worker) = self.worker.take() {
                    worker.source.release();
                }
                self.shared.set_state(LoopState::Stopped);
                debug!(name = %self.name, "Idle capture loop stopped");
            }
            LoopState::Running | LoopState::Stopping => {
                self.request_stop();
                self.join();
            }
        }
    }

    /// Wait for the thread to finish without sending the stop signal
    ///
    /// Useful once the sink has seen the end of the stream.
    pub fn join(&mut self) {
        let Some(handle) = self.thread_handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Joining ourselves would deadlock
            self.thread_handle = Some(handle);
            return;
        }

        debug!(name = %self.name, "Waiting for capture loop thread to finish");
        if let Err(e) = handle.join() {
            warn!(name = %self.name, "Capture loop thread panicked: {:?}", e);
        } else {
            debug!(name = %self.name, "Capture loop thread finished");
        }
        self.shared.set_state(LoopState::Stopped);
    }
}

impl Drop for CaptureLoop {
    fn drop(&mut self) {
        if self.thread_handle.is_some() || self.worker.is_some() {
            debug!(name = %self.name, "CaptureLoop dropped, stopping loop");
            self.stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::StillImageSource;
    use crate::backends::camera::types::{Frame, PixelFormat};
    use crate::pipelines::sink::SinkEvent;
    use std::sync::Mutex;
    use std::time::Duration;

    fn still_loop(delay: Duration, events: Arc<Mutex<Vec<SinkEvent>>>) -> CaptureLoop {
        let frame = Frame::filled(8, 6, PixelFormat::Rgb24, &[10, 20, 30]).unwrap();
        let source = StillImageSource::from_frame("still", frame, delay);
        CaptureLoop::new(
            "test-loop",
            Box::new(source),
            ModeEngine::default(),
            DisplayAdapter::passthrough(),
            Box::new(move |event: SinkEvent| events.lock().unwrap().push(event)),
        )
    }

    #[test]
    fn stop_signal_joins_thread() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut capture = still_loop(Duration::from_millis(2), Arc::clone(&events));
        capture.start().unwrap();
        assert_eq!(capture.state(), LoopState::Running);

        thread::sleep(Duration::from_millis(30));
        capture.stop();

        assert_eq!(capture.state(), LoopState::Stopped);
        assert!(!capture.is_running());
        assert!(capture.stats().delivered > 0);
        // stop() does not produce an end-of-stream event
        assert!(
            events
                .lock()
                .unwrap()
                .iter()
                .all(|e| matches!(e, SinkEvent::Frame(_)))
        );
    }

    #[test]
    fn stop_before_start_releases() {
        let mut capture = still_loop(Duration::ZERO, Arc::new(Mutex::new(Vec::new())));
        capture.stop();
        assert_eq!(capture.state(), LoopState::Stopped);
        assert_eq!(capture.start(), Err(LoopError::AlreadyStarted));
    }

    #[test]
    fn mode_switch_requests_are_counted() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut capture = still_loop(Duration::from_millis(1), events);
        let handle = capture.handle();
        assert_eq!(handle.current_mode(), Mode::Normal);

        handle.request_mode_switch();
        handle.request_mode_switch();
        capture.start().unwrap();

        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while handle.current_mode() != Mode::VeinEnhanced && std::time::Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        capture.stop();
        assert_eq!(handle.current_mode(), Mode::VeinEnhanced);
    }

    #[test]
    fn state_round_trips_through_u8() {
        for state in [
            LoopState::Idle,
            LoopState::Running,
            LoopState::Stopping,
            LoopState::Stopped,
        ] {
            assert_eq!(LoopState::from_u8(state.as_u8()), state);
        }
    }
}
