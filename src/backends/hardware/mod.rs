// SPDX-License-Identifier: GPL-3.0-only

//! Boundary hardware: the infrared illumination LED and the feedback buzzer
//!
//! Both come in two flavours selected by [`HardwareBackend`]: a simulated
//! device that only logs and keeps state, and a Linux sysfs device. They
//! accept and reject exactly the same inputs so code above this layer never
//! needs to know which one it talks to.

pub mod buzzer;
pub mod led;

pub use buzzer::Buzzer;
pub use led::LedController;

use crate::constants::HardwareBackend;
use crate::constants::hardware::{LED_SYSFS_PATH, PWM_SYSFS_PATH};
use crate::errors::HardwareResult;
use std::path::Path;

/// Open the LED and buzzer for a backend
///
/// `None` paths fall back to the default sysfs nodes.
pub fn open(
    backend: HardwareBackend,
    led_path: Option<&Path>,
    pwm_path: Option<&Path>,
) -> HardwareResult<(LedController, Buzzer)> {
    match backend {
        HardwareBackend::Simulated => Ok((LedController::simulated(), Buzzer::simulated())),
        HardwareBackend::Sysfs => {
            let led = LedController::sysfs(led_path.unwrap_or(Path::new(LED_SYSFS_PATH)))?;
            let buzzer = Buzzer::sysfs(pwm_path.unwrap_or(Path::new(PWM_SYSFS_PATH)))?;
            Ok((led, buzzer))
        }
    }
}
