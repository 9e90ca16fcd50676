// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for LED, buzzer and brightness debouncing

use std::sync::{Arc, Mutex};
use std::time::Duration;
use veinscope::app::BrightnessDebouncer;
use veinscope::backends::hardware::{self, LedController};
use veinscope::constants::HardwareBackend;
use veinscope::errors::HardwareError;

fn sysfs_led() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("max_brightness"), "255").unwrap();
    std::fs::write(dir.path().join("brightness"), "0").unwrap();
    dir
}

#[test]
fn led_range_checks_match_across_backends() {
    let dir = sysfs_led();
    let mut leds = [
        LedController::simulated(),
        LedController::sysfs(dir.path()).unwrap(),
    ];

    for led in &mut leds {
        assert_eq!(
            led.set_brightness(150),
            Err(HardwareError::OutOfRange {
                value: 150,
                min: 0,
                max: 100
            })
        );
        assert_eq!(led.brightness(), 0);

        // Repeating a value is accepted and changes nothing
        for percent in [0, 0, 100, 100] {
            led.set_brightness(percent).unwrap();
            assert_eq!(led.brightness(), percent);
        }
    }
    assert_eq!(
        std::fs::read_to_string(dir.path().join("brightness")).unwrap(),
        "255"
    );
}

#[test]
fn out_of_range_message_names_the_bounds() {
    let err = LedController::simulated().set_brightness(150).unwrap_err();
    assert_eq!(err.to_string(), "Value 150 outside 0..=100");
}

#[test]
fn simulated_backend_opens_without_devices() {
    let (led, buzzer) = hardware::open(HardwareBackend::Simulated, None, None).unwrap();
    assert!(led.is_simulated());
    buzzer.beep(440, Duration::from_millis(1)).unwrap().join().unwrap();
    assert_eq!(buzzer.completed_beeps(), 1);
}

#[test]
fn sysfs_backend_fails_on_missing_nodes() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("none");
    assert!(matches!(
        hardware::open(
            HardwareBackend::Sysfs,
            Some(missing.as_path()),
            Some(missing.as_path())
        ),
        Err(HardwareError::Io(_))
    ));
}

#[tokio::test]
async fn debouncer_applies_only_the_last_value() {
    let led = Arc::new(Mutex::new(LedController::simulated()));
    let mut debouncer = BrightnessDebouncer::new(
        tokio::runtime::Handle::current(),
        Arc::clone(&led),
        Duration::from_millis(30),
    );

    for percent in (5..=60).step_by(5) {
        debouncer.submit(percent).unwrap();
    }
    assert!(debouncer.is_pending());
    debouncer.flush().await;

    let led = led.lock().unwrap();
    assert_eq!(led.brightness(), 60);
    assert_eq!(led.write_count(), 1);
}

#[tokio::test]
async fn separated_submissions_both_apply() {
    let led = Arc::new(Mutex::new(LedController::simulated()));
    let mut debouncer = BrightnessDebouncer::new(
        tokio::runtime::Handle::current(),
        Arc::clone(&led),
        Duration::from_millis(5),
    );

    debouncer.submit(20).unwrap();
    debouncer.flush().await;
    debouncer.submit(80).unwrap();
    debouncer.flush().await;

    let led = led.lock().unwrap();
    assert_eq!(led.brightness(), 80);
    assert_eq!(led.write_count(), 2);
}
