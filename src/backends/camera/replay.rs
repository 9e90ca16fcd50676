// SPDX-License-Identifier: GPL-3.0-only

//! Pre-recorded frame sequence source
//!
//! Plays a directory of image files in file-name order at a fixed rate.
//! A file that fails to decode only costs one tick.

use super::FrameSource;
use super::still::load_image_frame;
use super::types::Frame;
use crate::constants::snapshots::is_image_extension;
use crate::errors::{SourceError, SourceResult};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub struct ReplaySource {
    name: String,
    files: Vec<PathBuf>,
    position: usize,
    interval: Duration,
    looping: bool,
    last_read: Option<Instant>,
    sequence: u64,
    released: bool,
}

impl ReplaySource {
    /// Index the image files of a directory
    ///
    /// # Errors
    /// `Unavailable` if the directory cannot be listed or holds no images.
    pub fn open(dir: &Path, fps: u32, looping: bool) -> SourceResult<Self> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| SourceError::Unavailable(format!("{}: {}", dir.display(), e)))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(is_image_extension)
            })
            .collect();
        files.sort();

        if files.is_empty() {
            return Err(SourceError::Unavailable(format!(
                "{}: no image files",
                dir.display()
            )));
        }

        info!(dir = %dir.display(), frames = files.len(), fps, looping, "Opened replay sequence");
        Ok(Self::from_files(dir.display().to_string(), files, fps, looping))
    }

    /// Play an explicit list of files
    pub fn from_files(name: impl Into<String>, files: Vec<PathBuf>, fps: u32, looping: bool) -> Self {
        let interval = if fps == 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(1.0 / fps as f64)
        };
        Self {
            name: name.into(),
            files,
            position: 0,
            interval,
            looping,
            last_read: None,
            sequence: 0,
            released: false,
        }
    }

    /// Number of files in the sequence
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    fn pace(&mut self) {
        if let Some(last) = self.last_read {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        self.last_read = Some(Instant::now());
    }
}

impl FrameSource for ReplaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self) -> SourceResult<Frame> {
        if self.released {
            return Err(SourceError::Fatal("replay released".to_string()));
        }
        if self.position >= self.files.len() {
            if !self.looping || self.files.is_empty() {
                return Err(SourceError::EndOfStream);
            }
            debug!(name = %self.name, "Restarting replay sequence");
            self.position = 0;
        }

        self.pace();
        let path = &self.files[self.position];
        self.position += 1;

        match load_image_frame(path) {
            Ok(frame) => {
                self.sequence += 1;
                Ok(frame.restamp(self.sequence))
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Skipping unreadable frame");
                Err(SourceError::Transient(e.to_string()))
            }
        }
    }

    fn release(&mut self) {
        if !self.released {
            debug!(name = %self.name, "Released replay sequence");
            self.released = true;
            self.files.clear();
        }
    }

    fn is_released(&self) -> bool {
        self.released
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_gray(dir: &Path, name: &str, value: u8) {
        image::GrayImage::from_pixel(2, 2, image::Luma([value]))
            .save(dir.join(name))
            .unwrap();
    }

    #[test]
    fn plays_in_name_order_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        write_gray(dir.path(), "b.png", 2);
        write_gray(dir.path(), "a.png", 1);
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut source = ReplaySource::open(dir.path(), 0, false).unwrap();
        assert_eq!(source.len(), 2);
        assert_eq!(source.read().unwrap().pixel(0, 0), &[1]);
        assert_eq!(source.read().unwrap().pixel(0, 0), &[2]);
        assert_eq!(source.read().unwrap_err(), SourceError::EndOfStream);
    }

    #[test]
    fn looping_wraps_around() {
        let dir = tempfile::tempdir().unwrap();
        write_gray(dir.path(), "only.png", 5);
        let mut source = ReplaySource::open(dir.path(), 0, true).unwrap();
        for expected in 1..=3 {
            assert_eq!(source.read().unwrap().sequence(), expected);
        }
    }

    #[test]
    fn corrupt_file_is_transient() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.png"), b"not a png").unwrap();
        write_gray(dir.path(), "b.png", 8);

        let mut source = ReplaySource::open(dir.path(), 0, false).unwrap();
        assert!(matches!(source.read(), Err(SourceError::Transient(_))));
        assert_eq!(source.read().unwrap().pixel(1, 1), &[8]);
    }

    #[test]
    fn empty_directory_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ReplaySource::open(dir.path(), 30, false),
            Err(SourceError::Unavailable(_))
        ));
    }

    #[test]
    fn release_ends_reads() {
        let dir = tempfile::tempdir().unwrap();
        write_gray(dir.path(), "a.png", 1);
        let mut source = ReplaySource::open(dir.path(), 0, true).unwrap();
        source.release();
        source.release();
        assert!(matches!(source.read(), Err(SourceError::Fatal(_))));
    }
}
