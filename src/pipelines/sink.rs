// SPDX-License-Identifier: GPL-3.0-only

//! Frame consumers
//!
//! The capture loop pushes every finished frame into a [`FrameSink`]. The
//! preview uses [`latest_frame_slot`], a single-slot handoff where a newer
//! frame replaces an unread older one so the producer never waits for the
//! renderer.

use crate::errors::SourceError;
use crate::media::convert::DisplayFrame;
use std::sync::Arc;
use tokio::sync::watch;

/// Why a stream ended on its own
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnd {
    /// A recorded sequence ran out of frames
    Exhausted,
    /// The source failed and cannot continue
    Failed(String),
}

impl From<SourceError> for StreamEnd {
    fn from(err: SourceError) -> Self {
        match err {
            SourceError::EndOfStream => StreamEnd::Exhausted,
            other => StreamEnd::Failed(other.to_string()),
        }
    }
}

impl std::fmt::Display for StreamEnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamEnd::Exhausted => write!(f, "stream ended"),
            StreamEnd::Failed(reason) => write!(f, "stream failed: {}", reason),
        }
    }
}

/// Event delivered to closure sinks
#[derive(Debug, Clone)]
pub enum SinkEvent {
    Frame(DisplayFrame),
    End(StreamEnd),
}

/// Consumer of finished frames, called on the capture thread
///
/// Implementations must return quickly; anything slow belongs on the
/// consumer's own thread.
pub trait FrameSink: Send {
    /// Called once per produced frame, in capture order
    fn on_frame(&mut self, frame: DisplayFrame);

    /// Called at most once, when the source is exhausted or fails
    fn on_stream_end(&mut self, end: StreamEnd);
}

impl<F> FrameSink for F
where
    F: FnMut(SinkEvent) + Send,
{
    fn on_frame(&mut self, frame: DisplayFrame) {
        self(SinkEvent::Frame(frame));
    }

    fn on_stream_end(&mut self, end: StreamEnd) {
        self(SinkEvent::End(end));
    }
}

/// Producer half of the latest-frame slot
pub struct SlotSender {
    frames: watch::Sender<Option<Arc<DisplayFrame>>>,
    end: watch::Sender<Option<StreamEnd>>,
}

/// Consumer half of the latest-frame slot
#[derive(Clone)]
pub struct SlotReceiver {
    frames: watch::Receiver<Option<Arc<DisplayFrame>>>,
    end: watch::Receiver<Option<StreamEnd>>,
}

/// Create a single-slot, overwrite-on-full frame handoff
pub fn latest_frame_slot() -> (SlotSender, SlotReceiver) {
    let (frame_tx, frame_rx) = watch::channel(None);
    let (end_tx, end_rx) = watch::channel(None);
    (
        SlotSender {
            frames: frame_tx,
            end: end_tx,
        },
        SlotReceiver {
            frames: frame_rx,
            end: end_rx,
        },
    )
}

impl FrameSink for SlotSender {
    fn on_frame(&mut self, frame: DisplayFrame) {
        // send_replace never fails, even with no receiver left
        self.frames.send_replace(Some(Arc::new(frame)));
    }

    fn on_stream_end(&mut self, end: StreamEnd) {
        self.end.send_replace(Some(end));
    }
}

impl SlotReceiver {
    /// Newest frame not yet taken, if any
    pub fn take_latest(&mut self) -> Option<Arc<DisplayFrame>> {
        match self.frames.has_changed() {
            Ok(true) => self.frames.borrow_and_update().clone(),
            _ => None,
        }
    }

    /// Newest frame, whether or not it was taken before
    pub fn latest(&self) -> Option<Arc<DisplayFrame>> {
        self.frames.borrow().clone()
    }

    /// Terminal event, once the stream has ended
    pub fn stream_end(&self) -> Option<StreamEnd> {
        self.end.borrow().clone()
    }

    /// Wait for a new frame
    ///
    /// Returns `None` once the producer is gone and no new frame is pending.
    pub async fn next_frame(&mut self) -> Option<Arc<DisplayFrame>> {
        match self.frames.changed().await {
            Ok(()) => self.frames.borrow_and_update().clone(),
            Err(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    fn display(sequence: u64) -> DisplayFrame {
        DisplayFrame {
            width: 1,
            height: 1,
            stride: 1,
            format: PixelFormat::Gray8,
            data: vec![sequence as u8],
            sequence,
        }
    }

    #[test]
    fn newer_frame_overwrites_unread() {
        let (mut tx, mut rx) = latest_frame_slot();
        assert!(rx.take_latest().is_none());

        tx.on_frame(display(1));
        tx.on_frame(display(2));
        assert_eq!(rx.take_latest().map(|f| f.sequence), Some(2));
        assert!(rx.take_latest().is_none());
        assert_eq!(rx.latest().map(|f| f.sequence), Some(2));
    }

    #[test]
    fn stream_end_is_visible() {
        let (mut tx, rx) = latest_frame_slot();
        assert!(rx.stream_end().is_none());
        tx.on_stream_end(StreamEnd::Exhausted);
        assert_eq!(rx.stream_end(), Some(StreamEnd::Exhausted));
    }

    #[test]
    fn sender_survives_dropped_receiver() {
        let (mut tx, rx) = latest_frame_slot();
        drop(rx);
        tx.on_frame(display(3));
        tx.on_stream_end(StreamEnd::Failed("gone".into()));
    }

    #[test]
    fn end_of_stream_maps_to_exhausted() {
        assert_eq!(StreamEnd::from(SourceError::EndOfStream), StreamEnd::Exhausted);
        assert!(matches!(
            StreamEnd::from(SourceError::Fatal("unplugged".into())),
            StreamEnd::Failed(_)
        ));
    }

    #[tokio::test]
    async fn next_frame_wakes_on_send() {
        let (mut tx, mut rx) = latest_frame_slot();
        let waiter = tokio::spawn(async move { rx.next_frame().await.map(|f| f.sequence) });
        tokio::task::yield_now().await;
        tx.on_frame(display(7));
        assert_eq!(waiter.await.unwrap(), Some(7));
    }
}
