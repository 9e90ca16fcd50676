// SPDX-License-Identifier: GPL-3.0-only

//! Newest-item handoff between a device reader thread and its source
//!
//! The reader overwrites an item nobody has taken yet, so a consumer that
//! falls behind gets the most recent capture instead of a queued old one.

#![cfg_attr(not(feature = "v4l2"), allow(dead_code))]

use std::sync::{Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const JOIN_POLL: Duration = Duration::from_millis(5);

#[derive(Debug)]
struct Slot<T> {
    pending: Option<T>,
    closed: bool,
    replaced: u64,
}

/// Outcome of [`LatestSlot::take`]
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Take<T> {
    Item(T),
    TimedOut,
    /// Closed with nothing left to take
    Closed,
}

/// Single-item slot where a newer item replaces an unread one
pub(crate) struct LatestSlot<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T> LatestSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                pending: None,
                closed: false,
                replaced: 0,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Store `item`, replacing one not yet taken
    ///
    /// Returns `false` once the slot is closed; the item is dropped.
    pub(crate) fn put(&self, item: T) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        if slot.pending.replace(item).is_some() {
            slot.replaced += 1;
        }
        drop(slot);
        self.ready.notify_one();
        true
    }

    /// Refuse further items and wake a waiting consumer
    pub(crate) fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    /// Items overwritten before they were taken
    pub(crate) fn replaced(&self) -> u64 {
        self.lock().replaced
    }

    /// Wait up to `timeout` for an item
    ///
    /// An item stored before the slot was closed is still handed out.
    pub(crate) fn take(&self, timeout: Duration) -> Take<T> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if let Some(item) = slot.pending.take() {
                return Take::Item(item);
            }
            if slot.closed {
                return Take::Closed;
            }
            let now = Instant::now();
            if now >= deadline {
                return Take::TimedOut;
            }
            slot = match self.ready.wait_timeout(slot, deadline - now) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
    }
}

/// Join `handle` if the thread finishes within `timeout`
///
/// Returns `None` when it does not; the thread is then left detached.
pub(crate) fn join_within(
    handle: JoinHandle<()>,
    timeout: Duration,
) -> Option<thread::Result<()>> {
    let deadline = Instant::now() + timeout;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            return None;
        }
        thread::sleep(JOIN_POLL);
    }
    Some(handle.join())
}
