// SPDX-License-Identifier: GPL-3.0-only

//! Brightness debouncing
//!
//! A held `+` key produces a burst of brightness requests. Only the last one
//! in a quiet window reaches the LED.

use crate::backends::hardware::LedController;
use crate::constants::hardware::{BRIGHTNESS_MAX, BRIGHTNESS_MIN};
use crate::errors::{HardwareError, HardwareResult};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub struct BrightnessDebouncer {
    runtime: Handle,
    led: Arc<Mutex<LedController>>,
    window: Duration,
    target: u32,
    pending: Option<JoinHandle<()>>,
}

impl BrightnessDebouncer {
    pub fn new(runtime: Handle, led: Arc<Mutex<LedController>>, window: Duration) -> Self {
        let target = lock(&led).brightness();
        Self {
            runtime,
            led,
            window,
            target,
            pending: None,
        }
    }

    /// Schedule a brightness change, replacing any change still waiting
    ///
    /// Range errors are returned immediately and leave the pending write alone.
    pub fn submit(&mut self, percent: u32) -> HardwareResult<()> {
        if percent > BRIGHTNESS_MAX {
            return Err(HardwareError::OutOfRange {
                value: percent,
                min: BRIGHTNESS_MIN,
                max: BRIGHTNESS_MAX,
            });
        }

        if let Some(previous) = self.pending.take() {
            previous.abort();
        }

        let led = Arc::clone(&self.led);
        let window = self.window;
        self.pending = Some(self.runtime.spawn(async move {
            tokio::time::sleep(window).await;
            if let Err(e) = lock(&led).set_brightness(percent) {
                warn!(percent, error = %e, "Failed to apply LED brightness");
            }
        }));
        self.target = percent;
        debug!(percent, "Brightness change scheduled");
        Ok(())
    }

    /// Last accepted value, applied or not
    pub fn target(&self) -> u32 {
        self.target
    }

    pub fn is_pending(&self) -> bool {
        self.pending.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Wait until the scheduled write, if any, has been applied
    pub async fn flush(&mut self) {
        if let Some(handle) = self.pending.take() {
            let _ = handle.await;
        }
    }

    /// Drop a scheduled write without applying it
    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for BrightnessDebouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

fn lock(led: &Mutex<LedController>) -> std::sync::MutexGuard<'_, LedController> {
    led.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn debouncer(window_ms: u64) -> (BrightnessDebouncer, Arc<Mutex<LedController>>) {
        let led = Arc::new(Mutex::new(LedController::simulated()));
        let debouncer = BrightnessDebouncer::new(
            Handle::current(),
            Arc::clone(&led),
            Duration::from_millis(window_ms),
        );
        (debouncer, led)
    }

    #[tokio::test]
    async fn burst_collapses_to_last_value() {
        let (mut debouncer, led) = debouncer(50);
        for percent in [10, 20, 30, 40] {
            debouncer.submit(percent).unwrap();
        }
        assert_eq!(debouncer.target(), 40);
        debouncer.flush().await;

        let led = led.lock().unwrap();
        assert_eq!(led.brightness(), 40);
        assert_eq!(led.write_count(), 1);
    }

    #[tokio::test]
    async fn out_of_range_is_rejected_synchronously() {
        let (mut debouncer, led) = debouncer(10);
        debouncer.submit(60).unwrap();
        assert!(debouncer.submit(101).is_err());
        assert_eq!(debouncer.target(), 60);
        debouncer.flush().await;
        assert_eq!(led.lock().unwrap().brightness(), 60);
    }

    #[tokio::test]
    async fn cancel_discards_pending_write() {
        let (mut debouncer, led) = debouncer(20);
        debouncer.submit(70).unwrap();
        assert!(debouncer.is_pending());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert_eq!(led.lock().unwrap().write_count(), 0);
    }
}
