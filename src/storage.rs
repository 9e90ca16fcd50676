// SPDX-License-Identifier: MPL-2.0

//! Snapshot storage
//!
//! Snapshots are PNG files grouped by capture day:
//!
//! ```text
//! <base>/2026-10-18/image_1.png
//!                  /image_2.png
//! ```
//!
//! A new snapshot takes the first unused index, so a deleted file's number is
//! reused before the sequence grows.

use crate::constants::snapshots::{DATE_FORMAT, DIR_NAME, FILE_PREFIX, is_image_extension};
use crate::errors::StorageError;
use crate::media::convert::DisplayFrame;
use chrono::{Local, NaiveDate};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default base directory (~/Pictures/veinscope)
pub fn default_snapshot_dir() -> PathBuf {
    dirs::picture_dir()
        .unwrap_or_else(|| dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")))
        .join(DIR_NAME)
}

#[derive(Debug, Clone)]
pub struct SnapshotStore {
    base_dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Save into today's folder
    pub fn save(&self, frame: &DisplayFrame) -> Result<PathBuf, StorageError> {
        self.save_on(frame, Local::now().date_naive())
    }

    /// Save into the folder of `date`
    pub fn save_on(&self, frame: &DisplayFrame, date: NaiveDate) -> Result<PathBuf, StorageError> {
        let day_dir = self.base_dir.join(date.format(DATE_FORMAT).to_string());
        std::fs::create_dir_all(&day_dir)?;

        let path = next_free_path(&day_dir);
        let image = frame
            .to_dynamic_image()
            .map_err(|e| StorageError::Encoding(e.to_string()))?;
        image.save_with_format(&path, image::ImageFormat::Png)?;

        info!(
            path = %path.display(),
            width = frame.width,
            height = frame.height,
            "Snapshot saved"
        );
        Ok(path)
    }

    /// Dated folders, newest first
    ///
    /// Entries whose name is not a date are ignored.
    pub fn dates(&self) -> Result<Vec<String>, StorageError> {
        let entries = match std::fs::read_dir(&self.base_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut dates: Vec<NaiveDate> = entries
            .flatten()
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| {
                let name = entry.file_name();
                NaiveDate::parse_from_str(name.to_str()?, DATE_FORMAT).ok()
            })
            .collect();
        dates.sort_unstable_by(|a, b| b.cmp(a));

        debug!(count = dates.len(), dir = %self.base_dir.display(), "Listed snapshot dates");
        Ok(dates
            .into_iter()
            .map(|d| d.format(DATE_FORMAT).to_string())
            .collect())
    }

    /// Images saved on `date`, in index order
    pub fn snapshots(&self, date: &str) -> Result<Vec<PathBuf>, StorageError> {
        let day_dir = self.base_dir.join(date);
        let entries = match std::fs::read_dir(&day_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .and_then(|ext| ext.to_str())
                        .is_some_and(is_image_extension)
            })
            .collect();
        files.sort_by(|a, b| {
            snapshot_index(a)
                .cmp(&snapshot_index(b))
                .then_with(|| a.cmp(b))
        });
        Ok(files)
    }
}

/// First `image_<n>.png` in `dir` that does not exist yet, n ≥ 1
fn next_free_path(dir: &Path) -> PathBuf {
    let mut index = 1u32;
    loop {
        let candidate = dir.join(format!("{}{}.png", FILE_PREFIX, index));
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Numeric index of a snapshot file; unnumbered files sort last
fn snapshot_index(path: &Path) -> u32 {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .and_then(|stem| stem.strip_prefix(FILE_PREFIX))
        .and_then(|n| n.parse().ok())
        .unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::types::PixelFormat;

    fn frame() -> DisplayFrame {
        DisplayFrame {
            width: 2,
            height: 2,
            stride: 6,
            format: PixelFormat::Rgb24,
            data: vec![0, 255, 0, 10, 20, 30, 40, 50, 60, 255, 255, 255],
            sequence: 1,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, d).unwrap()
    }

    #[test]
    fn saves_into_dated_folder() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let first = store.save_on(&frame(), day(18)).unwrap();
        let second = store.save_on(&frame(), day(18)).unwrap();
        assert_eq!(first, dir.path().join("2026-10-18").join("image_1.png"));
        assert_eq!(second, dir.path().join("2026-10-18").join("image_2.png"));

        let decoded = image::open(&first).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 255, 0]);
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 255, 255]);
    }

    #[test]
    fn snapshot_index_parses_numbered_files() {
        assert_eq!(snapshot_index(Path::new("image_12.png")), 12);
        assert_eq!(snapshot_index(Path::new("other.png")), u32::MAX);
    }

    #[test]
    fn missing_base_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("absent"));
        assert!(store.dates().unwrap().is_empty());
        assert!(store.snapshots("2026-10-18").unwrap().is_empty());
    }
}
