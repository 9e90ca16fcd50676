// SPDX-License-Identifier: GPL-3.0-only

//! Live V4L2 sensor source
//!
//! The device is opened and its format negotiated on the caller's thread so
//! configuration errors surface from `open()`. The memory-mapped stream is
//! then driven by a small reader thread. It keeps only the newest frame for
//! `read()`, so a slow consumer sees the latest capture rather than a queued
//! one. Dequeues, reads and release are all bounded in time, so a stalled
//! sensor never wedges the capture loop.

use super::FrameSource;
use super::handoff::{LatestSlot, Take, join_within};
use super::types::{Frame, PixelFormat};
use crate::constants::source::{
    DEVICE_BUFFERS, DEVICE_POLL, DEVICE_READ_TIMEOUT, DEVICE_RELEASE_TIMEOUT,
};
use crate::errors::{SourceError, SourceResult};
use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};
use v4l::buffer::Type;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::video::capture::Parameters;

/// Negotiated stream layout
#[derive(Debug, Clone, Copy)]
struct StreamLayout {
    width: u32,
    height: u32,
    stride: usize,
    format: PixelFormat,
}

pub struct LiveSource {
    name: String,
    frames: Arc<LatestSlot<SourceResult<Vec<u8>>>>,
    released: bool,
    running: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
    layout: StreamLayout,
    sequence: u64,
}

impl LiveSource {
    /// Open a V4L2 capture device
    ///
    /// Requests RGB3 at the given size and rate. Drivers that only offer
    /// BGR3 or GREY are accepted as well.
    ///
    /// # Errors
    /// `Unavailable` if the device cannot be opened, offers no usable pixel
    /// format, or refuses to start streaming.
    pub fn open(path: &Path, width: u32, height: u32, fps: u32) -> SourceResult<Self> {
        let unavailable = |what: &str, e: std::io::Error| {
            SourceError::Unavailable(format!("{}: {}: {}", path.display(), what, e))
        };

        let dev = Device::with_path(path).map_err(|e| unavailable("open", e))?;

        let mut format = dev.format().map_err(|e| unavailable("query format", e))?;
        format.width = width;
        format.height = height;
        format.fourcc = v4l::FourCC::new(&PixelFormat::Rgb24.fourcc());
        let format = match dev.set_format(&format) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "Could not set format, using current device format");
                dev.format().map_err(|e| unavailable("query format", e))?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(format.fourcc.repr).ok_or_else(|| {
            SourceError::Unavailable(format!(
                "{}: unsupported pixel format {}",
                path.display(),
                format.fourcc
            ))
        })?;

        if fps > 0 {
            if let Err(e) = dev.set_params(&Parameters::with_fps(fps)) {
                warn!(fps, error = %e, "Could not set frame rate");
            }
        }

        let row = format.width as usize * pixel_format.bytes_per_pixel();
        let layout = StreamLayout {
            width: format.width,
            height: format.height,
            stride: (format.stride as usize).max(row),
            format: pixel_format,
        };
        info!(
            path = %path.display(),
            width = layout.width,
            height = layout.height,
            stride = layout.stride,
            format = %layout.format,
            "Negotiated V4L2 format"
        );

        let running = Arc::new(AtomicBool::new(true));
        let frames = Arc::new(LatestSlot::new());
        let (ready_tx, ready_rx) = mpsc::channel();
        let running_clone = Arc::clone(&running);
        let reader_frames = Arc::clone(&frames);
        let name = path.display().to_string();
        let thread_name = name.clone();

        let reader = thread::Builder::new()
            .name("v4l2-reader".into())
            .spawn(move || {
                let mut stream =
                    match MmapStream::with_buffers(&dev, Type::VideoCapture, DEVICE_BUFFERS) {
                        Ok(s) => {
                            let _ = ready_tx.send(Ok(()));
                            s
                        }
                        Err(e) => {
                            let _ = ready_tx.send(Err(e));
                            return;
                        }
                    };
                // Wake up regularly so a stalled sensor cannot hide the stop flag
                stream.set_timeout(DEVICE_POLL);

                while running_clone.load(Ordering::SeqCst) {
                    let result = match stream.next() {
                        Ok((buf, _meta)) => Ok(buf.to_vec()),
                        Err(e) if e.kind() == ErrorKind::TimedOut => continue,
                        Err(e) if e.raw_os_error() == Some(libc::ENODEV) => {
                            Err(SourceError::Fatal(format!("device disconnected: {}", e)))
                        }
                        Err(e) => Err(SourceError::Transient(e.to_string())),
                    };
                    let fatal = matches!(result, Err(SourceError::Fatal(_)));
                    if !reader_frames.put(result) || fatal {
                        break;
                    }
                }
                reader_frames.close();
                debug!(
                    name = %thread_name,
                    replaced = reader_frames.replaced(),
                    "V4L2 reader exiting"
                );
            })
            .map_err(|e| unavailable("spawn reader", e))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = reader.join();
                return Err(unavailable("start stream", e));
            }
            Err(_) => {
                let _ = reader.join();
                return Err(SourceError::Unavailable(format!(
                    "{}: reader thread exited during startup",
                    path.display()
                )));
            }
        }

        Ok(Self {
            name,
            frames,
            released: false,
            running,
            reader: Some(reader),
            layout,
            sequence: 0,
        })
    }

    fn to_frame(&self, buf: Vec<u8>) -> SourceResult<Frame> {
        let layout = self.layout;
        let expected = layout.stride * layout.height as usize;
        if buf.len() < expected {
            return Err(SourceError::Transient(format!(
                "short buffer: {} of {} bytes",
                buf.len(),
                expected
            )));
        }
        let mut buf = buf;
        buf.truncate(expected);
        Frame::new(layout.width, layout.height, layout.format, layout.stride, buf)
            .map_err(|e| SourceError::Transient(e.to_string()))
    }
}

impl FrameSource for LiveSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> SourceResult<Frame> {
        if self.released {
            return Err(SourceError::Fatal("device released".to_string()));
        }
        let buf = match self.frames.take(DEVICE_READ_TIMEOUT) {
            Take::Item(result) => result?,
            Take::TimedOut => {
                return Err(SourceError::Transient(format!(
                    "no frame within {} ms",
                    DEVICE_READ_TIMEOUT.as_millis()
                )));
            }
            Take::Closed => return Err(SourceError::Fatal("reader thread stopped".to_string())),
        };
        let frame = self.to_frame(buf)?;
        self.sequence += 1;
        Ok(frame.restamp(self.sequence))
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        self.running.store(false, Ordering::SeqCst);
        self.frames.close();
        if let Some(handle) = self.reader.take() {
            match join_within(handle, DEVICE_RELEASE_TIMEOUT) {
                Some(Ok(())) => info!(name = %self.name, "Released V4L2 device"),
                Some(Err(_)) => warn!(name = %self.name, "V4L2 reader thread panicked"),
                None => warn!(
                    name = %self.name,
                    timeout_ms = DEVICE_RELEASE_TIMEOUT.as_millis() as u64,
                    "V4L2 reader did not stop in time, leaving it detached"
                ),
            }
        }
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

impl Drop for LiveSource {
    fn drop(&mut self) {
        self.release();
    }
}
