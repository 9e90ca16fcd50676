// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands for headless operation
//!
//! This module provides command-line functionality for:
//! - Saving processed snapshots without the preview
//! - Driving the LED and buzzer directly
//! - Listing display modes and the active enhancement settings

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::time::Duration;
use veinscope::backends::camera::{CaptureLoop, open_source};
use veinscope::backends::hardware;
use veinscope::config::Config;
use veinscope::errors::AppResult;
use veinscope::pipelines::modes::{Mode, ModeEngine};
use veinscope::pipelines::sink::SinkEvent;
use veinscope::storage::SnapshotStore;

/// Capture `frames` processed frames and save each as a snapshot
pub fn snapshot(
    config: &Config,
    frames: u32,
    output: Option<PathBuf>,
) -> AppResult<()> {
    let store = SnapshotStore::new(output.unwrap_or_else(|| config.snapshot_dir()));
    println!("Source: {}", config.source);
    println!("Mode: {}", config.initial_mode);
    println!("Output: {}", store.base_dir().display());

    let source = open_source(&config.source)?;
    let engine = ModeEngine::new(config.initial_mode, config.enhancement.clone())?;
    let (tx, rx) = mpsc::channel();
    let sink = move |event: SinkEvent| {
        let _ = tx.send(event);
    };
    let mut capture = CaptureLoop::new(
        "snapshot",
        source,
        engine,
        config.display_adapter(),
        Box::new(sink),
    );

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!();
    println!("Capturing... (press Ctrl+C to stop early)");
    capture.start()?;

    let mut saved = 0;
    while saved < frames {
        if stop_flag.load(Ordering::SeqCst) {
            println!("Stopping early...");
            break;
        }
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(SinkEvent::Frame(frame)) => {
                let path = store.save(&frame)?;
                println!("Saved: {}", path.display());
                saved += 1;
            }
            Ok(SinkEvent::End(end)) => {
                println!("Source finished: {}", end);
                break;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    capture.stop();
    println!();
    println!("{} snapshot(s) saved", saved);
    Ok(())
}

/// Set the LED brightness in percent
pub fn led(config: &Config, percent: u32) -> AppResult<()> {
    let (mut led, _) = hardware::open(
        config.hardware.backend,
        config.hardware.led_path.as_deref(),
        config.hardware.pwm_path.as_deref(),
    )?;
    led.set_brightness(percent)?;
    println!(
        "LED set to {}% ({})",
        led.brightness(),
        config.hardware.backend.display_name()
    );
    Ok(())
}

/// Sound the buzzer and wait for the tone to end
pub fn beep(
    config: &Config,
    frequency_hz: u32,
    duration_ms: u64,
) -> AppResult<()> {
    let (_, buzzer) = hardware::open(
        config.hardware.backend,
        config.hardware.led_path.as_deref(),
        config.hardware.pwm_path.as_deref(),
    )?;
    buzzer
        .beep(frequency_hz, Duration::from_millis(duration_ms))?
        .join()
        .map_err(|_| "buzzer thread panicked")?;
    println!("Beep {} Hz for {} ms", frequency_hz, duration_ms);
    Ok(())
}

/// List display modes and the enhancement parameters in effect
pub fn list_modes(config: &Config) -> AppResult<()> {
    println!("Display modes (cycled with 'm' in the preview):");
    println!();
    for mode in Mode::ALL {
        let marker = if mode == config.initial_mode { "*" } else { " " };
        println!("  {} [{}] {}", marker, mode.index(), mode.name());
    }

    let engine = ModeEngine::new(config.initial_mode, config.enhancement.clone())?;
    let e = engine.settings();
    println!();
    println!("Vein enhancement:");
    println!(
        "  CLAHE: clip {} grid {}x{} x{}",
        e.clip_limit, e.tile_grid.0, e.tile_grid.1, e.iterations
    );
    println!("  Threshold: {}", e.threshold);
    println!(
        "  Opening: {}x{} ellipse x{}",
        e.kernel_size.0, e.kernel_size.1, e.open_iterations
    );
    if e.roi.enabled {
        println!(
            "  ROI: {:.0}% {:?}, outside blended {:.0}% to white ({:?})",
            e.roi.ratio * 100.0,
            e.roi.shape,
            e.roi.opacity * 100.0,
            e.roi.scope
        );
    } else {
        println!("  ROI: off");
    }
    Ok(())
}
