use std::fs;
use std::path::Path;

use linelog::{Direction, LogDir, LogDirConfig, SegmentId, TailLocator};
use tempfile::tempdir;

fn populate(root: &Path, entries: &[&str]) {
    for entry in entries {
        let path = root.join(entry);
        if entry.ends_with('/') {
            fs::create_dir_all(&path).expect("mkdir");
        } else {
            fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
            fs::write(&path, b"line\n").expect("write");
        }
    }
}

#[test]
fn descending_search_skips_empty_subtrees() {
    let dir = tempdir().expect("tempdir");
    populate(
        dir.path(),
        &[
            "000/000/888.txt",
            "000/000/889.txt",
            "000/002/001.txt",
            "006/098/",
            "006/099/",
            "026/",
            "076/099/",
        ],
    );

    let locator = TailLocator::new(dir.path(), 2, Direction::Reverse);
    assert_eq!(
        locator.first().expect("locate"),
        Some(dir.path().join("000/002/001.txt"))
    );

    let log = LogDir::open(dir.path(), LogDirConfig::default()).expect("open log");
    assert_eq!(log.tail().expect("tail"), Some(SegmentId::new(2_001)));
}

#[test]
fn append_lands_after_located_tail() {
    let dir = tempdir().expect("tempdir");
    populate(dir.path(), &["000/000/888.txt", "000/002/001.txt", "009/"]);

    let config = LogDirConfig {
        max_segment_bytes: 1,
        ..LogDirConfig::default()
    };
    let mut log = LogDir::open(dir.path(), config).expect("open log");
    log.append("new").expect("append");

    assert!(dir.path().join("000/002/001.txt.zst").exists());
    assert!(dir.path().join("000/002/002.txt").exists());
    assert!(!dir.path().join("009/000").exists());

    let lines = log
        .iter(Direction::Forward)
        .collect::<linelog::Result<Vec<_>>>()
        .expect("read");
    assert_eq!(lines, vec!["line", "line", "new"]);
}

#[test]
fn ascending_search_visits_everything_in_order() {
    let dir = tempdir().expect("tempdir");
    populate(
        dir.path(),
        &["001/000/000.txt", "000/999/999.txt", "000/000/000.txt", "000/500/", "zzz/000/000.txt"],
    );

    let found = TailLocator::new(dir.path(), 2, Direction::Forward)
        .paths()
        .collect::<linelog::Result<Vec<_>>>()
        .expect("walk");
    assert_eq!(
        found,
        vec![
            dir.path().join("000/000/000.txt"),
            dir.path().join("000/999/999.txt"),
            dir.path().join("001/000/000.txt"),
        ]
    );
}
