//! Log directory: segment rotation and whole-log iteration.
//!
//! # Design
//!
//! The directory keeps no in-memory state besides its configuration; the
//! tree on disk is the state. Every append finds the tail with a reverse
//! [`TailLocator`] descent, which touches one directory per level in the
//! common case.
//!
//! Only one writer may append to a directory at a time. Nothing here locks;
//! two writers would race on tail discovery and segment creation. Readers
//! may run beside the writer: they never modify the tree, never see a torn
//! line, and never see a half-sealed segment.
//!
//! # Example
//!
//! ```no_run
//! use linelog::{Direction, LogDir, LogDirConfig};
//!
//! let mut log = LogDir::open("./journal", LogDirConfig::default())?;
//! log.append("first")?;
//! log.append("second")?;
//!
//! for line in log.iter(Direction::Reverse) {
//!     println!("{}", line?);
//! }
//! # Ok::<(), linelog::Error>(())
//! ```

use std::fs;
use std::iter::Rev;
use std::path::{Path, PathBuf};
use std::vec;

use crate::config::LogDirConfig;
use crate::locator::{numeric_prefix_str, Direction, NumericPaths, TailLocator};
use crate::segment::{ByteLines, Segment, LINE_SEPARATOR};
use crate::segment_id::SegmentId;
use crate::segment_path::{ArtifactKind, SegmentPath};
use crate::{Codec, Error, Result};

/// A directory tree of segments forming one append-only log.
#[derive(Debug, Clone)]
pub struct LogDir {
    root: PathBuf,
    config: LogDirConfig,
}

impl LogDir {
    /// Open a log rooted at `root`. Directories are created on first append.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidConfig`: `config` failed validation
    pub fn open(root: impl Into<PathBuf>, config: LogDirConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            root: root.into(),
            config,
        })
    }

    pub fn path(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &LogDirConfig {
        &self.config
    }

    fn locator(&self, direction: Direction) -> TailLocator {
        TailLocator::new(&self.root, self.config.subdirs, direction)
    }

    /// Segments in `direction`, one entry per id, as suffix-less paths.
    pub fn segments(&self, direction: Direction) -> SegmentPaths {
        SegmentPaths {
            paths: self.locator(direction).paths(),
            subdirs: self.config.subdirs,
            codec: self.config.codec,
            last: None,
        }
    }

    fn tail_location(&self) -> Result<Option<SegmentPath>> {
        self.segments(Direction::Reverse).next().transpose()
    }

    /// Id of the newest segment, if any.
    pub fn tail(&self) -> Result<Option<SegmentId>> {
        Ok(self.tail_location()?.map(|location| location.id()))
    }

    fn open_segment(&self, location: &SegmentPath) -> Result<Segment> {
        Segment::open(location, self.config.codec, self.config.compression_level)
    }

    /// Append one line to the log.
    ///
    /// If the tail is sealed or has reached `max_segment_bytes`, it is sealed
    /// (when needed) and the line starts the next segment.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidLine`: `line` contains the separator
    /// - `Error::CapacityExceeded`: no segment ids left for this depth
    /// - `Error::MalformedPath`: the tree holds a misnamed segment
    /// - `Error::Io`: filesystem failure
    pub fn append(&mut self, line: &str) -> Result<()> {
        if line.as_bytes().contains(&LINE_SEPARATOR) {
            return Err(Error::InvalidLine);
        }
        let mut segment = self.writable_tail()?;
        segment.append(line)
    }

    fn writable_tail(&self) -> Result<Segment> {
        let location = match self.tail_location()? {
            None => SegmentPath::first(&self.root, "", self.config.subdirs),
            Some(tail) => {
                let mut segment = self.open_segment(&tail)?;
                if !segment.is_sealed() {
                    if segment.size_in_bytes()? < self.config.max_segment_bytes {
                        return Ok(segment);
                    }
                    segment.seal()?;
                }
                let next = tail.next()?;
                log::info!("rotating {} -> segment {}", self.root.display(), next.id());
                next
            }
        };

        if let Some(parent) = location.path().parent() {
            fs::create_dir_all(parent)?;
        }
        self.open_segment(&location)
    }

    /// Seal the tail segment now instead of on the next append.
    ///
    /// Returns `false` when there is no raw tail to seal.
    pub fn seal_tail(&mut self) -> Result<bool> {
        let Some(tail) = self.tail_location()? else {
            return Ok(false);
        };
        let mut segment = self.open_segment(&tail)?;
        if segment.is_sealed() {
            return Ok(false);
        }
        segment.seal()?;
        Ok(true)
    }

    /// Every line of the log as bytes, oldest first or newest first.
    pub fn byte_lines(&self, direction: Direction) -> DirByteLines {
        DirByteLines {
            segments: self.segments(direction),
            direction,
            codec: self.config.codec,
            level: self.config.compression_level,
            current: None,
            current_path: PathBuf::new(),
        }
    }

    /// Every line of the log, oldest first or newest first.
    ///
    /// Holds one segment open at a time; reverse order reads each segment
    /// fully before yielding its last line.
    pub fn iter(&self, direction: Direction) -> DirLines {
        DirLines {
            inner: self.byte_lines(direction),
        }
    }

    pub fn lines(&self) -> DirLines {
        self.iter(Direction::Forward)
    }

    pub fn reversed_lines(&self) -> DirLines {
        self.iter(Direction::Reverse)
    }
}

impl<'a> IntoIterator for &'a LogDir {
    type Item = Result<String>;
    type IntoIter = DirLines;

    fn into_iter(self) -> DirLines {
        self.lines()
    }
}

/// Segment locations of a [`LogDir`], deduplicated by id.
///
/// Raw and sealed artifacts count; transient artifacts and names with other
/// suffixes are skipped.
pub struct SegmentPaths {
    paths: NumericPaths,
    subdirs: usize,
    codec: Codec,
    last: Option<SegmentId>,
}

impl Iterator for SegmentPaths {
    type Item = Result<SegmentPath>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let path = match self.paths.next()? {
                Ok(path) => path,
                Err(err) => return Some(Err(err)),
            };

            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let digits = numeric_prefix_str(name).unwrap_or_default();
            match ArtifactKind::classify(&name[digits.len()..], self.codec) {
                Some(ArtifactKind::Raw) | Some(ArtifactKind::Sealed) => {}
                _ => continue,
            }

            let location = match SegmentPath::from_path(&path, self.subdirs) {
                Ok(location) => location,
                Err(err) => return Some(Err(err)),
            };
            let id = location.id();
            if self.last == Some(id) {
                continue;
            }
            self.last = Some(id);
            log::debug!("found segment {} at {}", id, path.display());
            return Some(Ok(location.with_suffix("")));
        }
    }
}

enum Cursor {
    Forward(ByteLines),
    Reverse(Rev<vec::IntoIter<Vec<u8>>>),
}

impl Iterator for Cursor {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Cursor::Forward(lines) => lines.next(),
            Cursor::Reverse(lines) => lines.next().map(Ok),
        }
    }
}

/// Lines of a whole [`LogDir`] as bytes, segment after segment.
pub struct DirByteLines {
    segments: SegmentPaths,
    direction: Direction,
    codec: Codec,
    level: i32,
    current: Option<Cursor>,
    current_path: PathBuf,
}

impl DirByteLines {
    /// Path of the segment currently being read.
    pub fn current_path(&self) -> &Path {
        &self.current_path
    }

    fn advance(&mut self) -> Option<Result<()>> {
        let location = match self.segments.next()? {
            Ok(location) => location,
            Err(err) => return Some(Err(err)),
        };
        let segment = match Segment::inspect(&location, self.codec, self.level) {
            Ok(segment) => segment,
            Err(err) => return Some(Err(err)),
        };
        self.current_path = segment.path().to_path_buf();
        let cursor = match self.direction {
            Direction::Forward => Cursor::Forward(segment.byte_lines()),
            Direction::Reverse => match segment.reversed_byte_lines() {
                Ok(lines) => Cursor::Reverse(lines),
                Err(err) => return Some(Err(err)),
            },
        };
        self.current = Some(cursor);
        Some(Ok(()))
    }
}

impl Iterator for DirByteLines {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(cursor) = self.current.as_mut() {
                if let Some(line) = cursor.next() {
                    return Some(line);
                }
                self.current = None;
            }
            if let Err(err) = self.advance()? {
                return Some(Err(err));
            }
        }
    }
}

/// Lines of a whole [`LogDir`] as strings.
pub struct DirLines {
    inner: DirByteLines,
}

impl Iterator for DirLines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.inner.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        Some(
            String::from_utf8(line)
                .map_err(|_| Error::InvalidUtf8(self.inner.current_path().to_path_buf())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::SegmentState;
    use tempfile::TempDir;

    fn small(max_segment_bytes: u64) -> LogDirConfig {
        LogDirConfig {
            max_segment_bytes,
            ..LogDirConfig::default()
        }
    }

    fn collect(log: &LogDir, direction: Direction) -> Vec<String> {
        log.iter(direction).collect::<Result<Vec<_>>>().unwrap()
    }

    fn segment(log: &LogDir, id: u64) -> Segment {
        let location = SegmentPath::for_id(log.path(), SegmentId::new(id), "", log.config().subdirs).unwrap();
        Segment::inspect(&location, log.config().codec, log.config().compression_level).unwrap()
    }

    #[test]
    fn test_empty_log() {
        let dir = TempDir::new().unwrap();
        let log = LogDir::open(dir.path().join("missing"), LogDirConfig::default()).unwrap();
        assert_eq!(log.tail().unwrap(), None);
        assert!(collect(&log, Direction::Forward).is_empty());
        assert!(collect(&log, Direction::Reverse).is_empty());
    }

    #[test]
    fn test_first_append_creates_layout() {
        let dir = TempDir::new().unwrap();
        let mut log = LogDir::open(dir.path(), LogDirConfig::default()).unwrap();
        log.append("hello").unwrap();

        assert!(dir.path().join("000/000/000.txt").exists());
        assert_eq!(log.tail().unwrap(), Some(SegmentId::FIRST));
        assert_eq!(collect(&log, Direction::Forward), vec!["hello"]);
    }

    #[test]
    fn test_rotation_is_deferred_to_next_append() {
        let dir = TempDir::new().unwrap();
        let mut log = LogDir::open(dir.path(), small(150)).unwrap();
        let line = "x".repeat(50);

        log.append(&line).unwrap();
        log.append(&line).unwrap();
        log.append(&line).unwrap();
        // 153 bytes, over the threshold, but nothing rotates until the next line.
        assert_eq!(log.tail().unwrap(), Some(SegmentId::new(0)));
        assert_eq!(segment(&log, 0).state(), SegmentState::Raw);
        assert_eq!(segment(&log, 0).size_in_bytes().unwrap(), 153);

        log.append("next").unwrap();
        assert_eq!(log.tail().unwrap(), Some(SegmentId::new(1)));
        assert!(segment(&log, 0).is_sealed());
        assert!(!dir.path().join("000/000/000.txt").exists());
        assert_eq!(segment(&log, 1).lines().collect::<Result<Vec<_>>>().unwrap(), vec!["next"]);
    }

    #[test]
    fn test_invalid_line_does_not_rotate() {
        let dir = TempDir::new().unwrap();
        let mut log = LogDir::open(dir.path(), small(4)).unwrap();
        log.append("full").unwrap();

        assert!(matches!(log.append("two\nlines"), Err(Error::InvalidLine)));
        assert_eq!(segment(&log, 0).state(), SegmentState::Raw);
        assert_eq!(log.tail().unwrap(), Some(SegmentId::new(0)));
    }

    #[test]
    fn test_forward_and_reverse_across_segments() {
        let dir = TempDir::new().unwrap();
        let mut log = LogDir::open(dir.path(), small(64)).unwrap();
        let lines: Vec<String> = (0..200).map(|i| format!("line {i:04}")).collect();
        for line in &lines {
            log.append(line).unwrap();
        }
        assert!(log.tail().unwrap().unwrap().get() > 10);

        assert_eq!(collect(&log, Direction::Forward), lines);
        let mut reversed = lines.clone();
        reversed.reverse();
        assert_eq!(collect(&log, Direction::Reverse), reversed);
    }

    #[test]
    fn test_seal_tail() {
        let dir = TempDir::new().unwrap();
        let mut log = LogDir::open(dir.path(), LogDirConfig::default()).unwrap();
        assert!(!log.seal_tail().unwrap());

        log.append("a").unwrap();
        assert!(log.seal_tail().unwrap());
        assert!(!log.seal_tail().unwrap());

        log.append("b").unwrap();
        assert_eq!(log.tail().unwrap(), Some(SegmentId::new(1)));
        assert_eq!(collect(&log, Direction::Forward), vec!["a", "b"]);
    }

    #[test]
    fn test_segments_dedup_and_skip() {
        let dir = TempDir::new().unwrap();
        let leaf = dir.path().join("000/000");
        fs::create_dir_all(&leaf).unwrap();
        fs::write(leaf.join("000.txt.zst.tmp"), b"").unwrap();
        fs::write(leaf.join("001.txt"), b"").unwrap();
        fs::write(leaf.join("001.txt.zst.tmp"), b"").unwrap();
        fs::write(leaf.join("002.txt.zst"), b"").unwrap();
        fs::write(leaf.join("003.bak"), b"").unwrap();
        fs::write(leaf.join("readme"), b"").unwrap();

        let log = LogDir::open(dir.path(), LogDirConfig::default()).unwrap();
        let ids: Vec<u64> = log
            .segments(Direction::Forward)
            .map(|s| s.map(|s| s.id().get()))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(log.tail().unwrap(), Some(SegmentId::new(2)));
    }

    #[test]
    fn test_misnamed_segment_is_malformed() {
        let dir = TempDir::new().unwrap();
        let leaf = dir.path().join("000/000");
        fs::create_dir_all(&leaf).unwrap();
        fs::write(leaf.join("7.txt"), b"x\n").unwrap();

        let mut log = LogDir::open(dir.path(), LogDirConfig::default()).unwrap();
        assert!(matches!(log.tail(), Err(Error::MalformedPath(_))));
        assert!(matches!(log.append("y"), Err(Error::MalformedPath(_))));
    }

    #[test]
    fn test_capacity_exceeded() {
        let dir = TempDir::new().unwrap();
        let config = LogDirConfig {
            subdirs: 0,
            max_segment_bytes: 1,
            ..LogDirConfig::default()
        };
        fs::write(dir.path().join("999.txt"), b"last\n").unwrap();

        let mut log = LogDir::open(dir.path(), config).unwrap();
        assert!(matches!(
            log.append("overflow"),
            Err(Error::CapacityExceeded { groups: 1, .. })
        ));
    }

    #[test]
    fn test_into_iterator() {
        let dir = TempDir::new().unwrap();
        let mut log = LogDir::open(dir.path(), LogDirConfig::default()).unwrap();
        log.append("one").unwrap();
        log.append("two").unwrap();

        let mut seen = Vec::new();
        for line in &log {
            seen.push(line.unwrap());
        }
        assert_eq!(seen, vec!["one", "two"]);
    }
}
