// SPDX-License-Identifier: GPL-3.0-only

//! Feedback buzzer
//!
//! Beeps run on their own thread so a caller on the UI path never waits for
//! the tone to finish. The sysfs backend drives a PWM channel at 50% duty.

use crate::errors::{HardwareError, HardwareResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Audible range accepted by `beep`
const MIN_FREQUENCY_HZ: u32 = 20;
const MAX_FREQUENCY_HZ: u32 = 20_000;

#[derive(Debug, Clone)]
enum BuzzerBackend {
    Simulated,
    /// Exported PWM channel, e.g. `/sys/class/pwm/pwmchip0/pwm0`
    Sysfs(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Buzzer {
    backend: BuzzerBackend,
    completed: Arc<AtomicU64>,
}

impl Buzzer {
    pub fn simulated() -> Self {
        Self {
            backend: BuzzerBackend::Simulated,
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// PWM channel at `path`; the channel must already be exported
    pub fn sysfs(path: &Path) -> HardwareResult<Self> {
        for file in ["period", "duty_cycle", "enable"] {
            let p = path.join(file);
            if !p.exists() {
                return Err(HardwareError::Io(format!("{}: missing", p.display())));
            }
        }
        info!(path = %path.display(), "Opened buzzer PWM channel");
        Ok(Self {
            backend: BuzzerBackend::Sysfs(path.to_path_buf()),
            completed: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Sound a tone without blocking the caller
    ///
    /// The returned handle may be dropped; joining it waits for the tone to
    /// end. Write failures on the beep thread are logged.
    pub fn beep(&self, frequency_hz: u32, duration: Duration) -> HardwareResult<JoinHandle<()>> {
        if !(MIN_FREQUENCY_HZ..=MAX_FREQUENCY_HZ).contains(&frequency_hz) {
            return Err(HardwareError::OutOfRange {
                value: frequency_hz,
                min: MIN_FREQUENCY_HZ,
                max: MAX_FREQUENCY_HZ,
            });
        }

        let backend = self.backend.clone();
        let completed = Arc::clone(&self.completed);
        thread::Builder::new()
            .name("buzzer".into())
            .spawn(move || {
                match &backend {
                    BuzzerBackend::Simulated => {
                        info!(frequency_hz, duration_ms = duration.as_millis() as u64, "Beep");
                        thread::sleep(duration);
                    }
                    BuzzerBackend::Sysfs(path) => {
                        if let Err(e) = pwm_tone(path, frequency_hz, duration) {
                            warn!(path = %path.display(), error = %e, "Beep failed");
                            return;
                        }
                    }
                }
                completed.fetch_add(1, Ordering::Relaxed);
            })
            .map_err(|e| HardwareError::Io(format!("spawn buzzer thread: {}", e)))
    }

    /// Number of tones that ran to completion
    pub fn completed_beeps(&self) -> u64 {
        self.completed.load(Ordering::Relaxed)
    }
}

fn pwm_tone(path: &Path, frequency_hz: u32, duration: Duration) -> std::io::Result<()> {
    let period_ns = 1_000_000_000 / frequency_hz as u64;
    // Lower the duty cycle first, the kernel rejects duty_cycle > period
    std::fs::write(path.join("duty_cycle"), "0")?;
    std::fs::write(path.join("period"), period_ns.to_string())?;
    std::fs::write(path.join("duty_cycle"), (period_ns / 2).to_string())?;
    std::fs::write(path.join("enable"), "1")?;
    debug!(frequency_hz, period_ns, "PWM enabled");

    thread::sleep(duration);

    std::fs::write(path.join("enable"), "0")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_pwm() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in ["period", "duty_cycle", "enable"] {
            std::fs::write(dir.path().join(file), "0").unwrap();
        }
        dir
    }

    #[test]
    fn simulated_beep_completes() {
        let buzzer = Buzzer::simulated();
        buzzer.beep(1000, Duration::from_millis(1)).unwrap().join().unwrap();
        assert_eq!(buzzer.completed_beeps(), 1);
    }

    #[test]
    fn rejects_inaudible_frequency() {
        let buzzer = Buzzer::simulated();
        assert!(matches!(
            buzzer.beep(0, Duration::from_millis(1)),
            Err(HardwareError::OutOfRange { value: 0, .. })
        ));
        assert_eq!(buzzer.completed_beeps(), 0);
    }

    #[test]
    fn sysfs_programs_half_duty_and_disables() {
        let dir = fake_pwm();
        let buzzer = Buzzer::sysfs(dir.path()).unwrap();
        buzzer.beep(1000, Duration::from_millis(1)).unwrap().join().unwrap();

        let read = |f: &str| std::fs::read_to_string(dir.path().join(f)).unwrap();
        assert_eq!(read("period"), "1000000");
        assert_eq!(read("duty_cycle"), "500000");
        assert_eq!(read("enable"), "0");
        assert_eq!(buzzer.completed_beeps(), 1);
    }

    #[test]
    fn sysfs_requires_exported_channel() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Buzzer::sysfs(dir.path()).is_err());
    }
}
