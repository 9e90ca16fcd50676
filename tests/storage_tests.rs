// SPDX-License-Identifier: MPL-2.0

//! Integration tests for snapshot storage

use chrono::NaiveDate;
use veinscope::PixelFormat;
use veinscope::media::convert::DisplayFrame;
use veinscope::storage::SnapshotStore;

fn gray_frame() -> DisplayFrame {
    DisplayFrame {
        width: 3,
        height: 2,
        stride: 3,
        format: PixelFormat::Gray8,
        data: vec![0, 50, 100, 150, 200, 250],
        sequence: 1,
    }
}

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 10, day).unwrap()
}

fn file_name(path: &std::path::Path) -> String {
    path.file_name().unwrap().to_string_lossy().into_owned()
}

#[test]
fn numbering_fills_the_first_gap() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());

    for _ in 0..3 {
        store.save_on(&gray_frame(), date(18)).unwrap();
    }
    std::fs::remove_file(dir.path().join("2026-10-18/image_2.png")).unwrap();

    let refill = store.save_on(&gray_frame(), date(18)).unwrap();
    assert_eq!(file_name(&refill), "image_2.png");
    let next = store.save_on(&gray_frame(), date(18)).unwrap();
    assert_eq!(file_name(&next), "image_4.png");
}

#[test]
fn gray_snapshot_decodes_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    let path = store.save_on(&gray_frame(), date(1)).unwrap();

    let decoded = image::open(path).unwrap().to_luma8();
    assert_eq!(decoded.dimensions(), (3, 2));
    assert_eq!(decoded.into_raw(), gray_frame().data);
}

#[test]
fn dates_are_listed_newest_first() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    store.save_on(&gray_frame(), date(2)).unwrap();
    store.save_on(&gray_frame(), date(17)).unwrap();
    store.save_on(&gray_frame(), date(9)).unwrap();
    std::fs::create_dir(dir.path().join("exports")).unwrap();

    assert_eq!(
        store.dates().unwrap(),
        vec!["2026-10-17", "2026-10-09", "2026-10-02"]
    );
}

#[test]
fn snapshots_are_listed_in_index_order() {
    let dir = tempfile::tempdir().unwrap();
    let store = SnapshotStore::new(dir.path());
    for _ in 0..10 {
        store.save_on(&gray_frame(), date(5)).unwrap();
    }
    std::fs::write(dir.path().join("2026-10-05/notes.txt"), "x").unwrap();

    let names: Vec<String> = store
        .snapshots("2026-10-05")
        .unwrap()
        .iter()
        .map(|p| file_name(p))
        .collect();
    assert_eq!(names.len(), 10);
    assert_eq!(names[1], "image_2.png");
    assert_eq!(names[9], "image_10.png");
}
