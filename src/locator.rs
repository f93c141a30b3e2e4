//! Ordered descent through a numerically named directory tree.
//!
//! Only entries whose names start with decimal digits take part; they are
//! ordered by the value of that prefix (`555`, `555suffix` and `555.zst` all
//! count as 555). The locator lists one directory at a time and backtracks
//! out of subtrees that turn out to hold no file at the target depth, so
//! finding the extreme segment touches a handful of directories instead of
//! the whole tree:
//!
//! ```text
//! 076/099/            <- empty, skipped
//! 026/                <- empty, skipped
//! 006/098/ 006/099/   <- empty, skipped
//! 005/002/001.txt     <- last file
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::vec;

use crate::Result;

/// Iteration order over numeric names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    /// Ascending numeric order, oldest segment first.
    #[default]
    Forward,
    /// Descending numeric order, newest segment first.
    Reverse,
}

/// Leading run of ASCII digits in `name`.
pub fn numeric_prefix_str(name: &str) -> Option<&str> {
    let end = name.bytes().take_while(u8::is_ascii_digit).count();
    if end == 0 {
        None
    } else {
        Some(&name[..end])
    }
}

/// Value of the leading digits of `name`; `None` without any, or when the
/// run does not fit in a `u64`.
pub fn numeric_prefix(name: &str) -> Option<u64> {
    numeric_prefix_str(name).and_then(|digits| digits.parse().ok())
}

/// Keep names with a numeric prefix, ordered by it. Ties break on the full
/// name so the result is deterministic.
pub fn sort_by_numeric_prefix<S: AsRef<str>>(names: Vec<S>, direction: Direction) -> Vec<S> {
    let mut keyed: Vec<(u64, S)> = names
        .into_iter()
        .filter_map(|name| numeric_prefix(name.as_ref()).map(|n| (n, name)))
        .collect();
    keyed.sort_by(|a, b| (a.0, a.1.as_ref()).cmp(&(b.0, b.1.as_ref())));
    if direction == Direction::Reverse {
        keyed.reverse();
    }
    keyed.into_iter().map(|(_, name)| name).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryKind {
    Dir,
    File,
}

/// Numerically named children of `dir` of the given kind, sorted.
///
/// A missing directory has no children.
fn numeric_children(dir: &Path, kind: EntryKind, direction: Direction) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = match entry.file_name().into_string() {
            Ok(name) => name,
            Err(_) => continue,
        };
        if numeric_prefix(&name).is_none() {
            continue;
        }
        // Follow symlinks; entries removed since the listing are skipped.
        let meta = match fs::metadata(entry.path()) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => continue,
            Err(err) => return Err(err),
        };
        let matches = match kind {
            EntryKind::Dir => meta.is_dir(),
            EntryKind::File => meta.is_file(),
        };
        if matches {
            names.push(name);
        }
    }

    Ok(sort_by_numeric_prefix(names, direction)
        .into_iter()
        .map(|name| dir.join(name))
        .collect())
}

/// Finds files `depth` directory levels below a root, in numeric order.
#[derive(Debug, Clone)]
pub struct TailLocator {
    root: PathBuf,
    depth: usize,
    direction: Direction,
}

impl TailLocator {
    pub fn new(root: impl Into<PathBuf>, depth: usize, direction: Direction) -> Self {
        Self {
            root: root.into(),
            depth,
            direction,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Lazy sequence of every qualifying file. Each call starts over.
    pub fn paths(&self) -> NumericPaths {
        NumericPaths {
            root: Some(self.root.clone()),
            depth: self.depth,
            direction: self.direction,
            stack: Vec::new(),
        }
    }

    /// The most extreme file in the locator's direction, if any.
    pub fn first(&self) -> Result<Option<PathBuf>> {
        self.paths().next().transpose()
    }
}

/// Iterator over the files found by a [`TailLocator`].
///
/// Keeps one sorted listing per level on an explicit stack; an exhausted
/// listing is popped, which resumes with the next sibling one level up.
pub struct NumericPaths {
    root: Option<PathBuf>,
    depth: usize,
    direction: Direction,
    // (directory levels still below the listed entries, remaining entries)
    stack: Vec<(usize, vec::IntoIter<PathBuf>)>,
}

impl NumericPaths {
    fn descend(&mut self, dir: &Path, levels_below: usize) -> io::Result<()> {
        let kind = if levels_below == 0 {
            EntryKind::File
        } else {
            EntryKind::Dir
        };
        let children = numeric_children(dir, kind, self.direction)?;
        self.stack.push((levels_below, children.into_iter()));
        Ok(())
    }
}

impl Iterator for NumericPaths {
    type Item = Result<PathBuf>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(root) = self.root.take() {
            if let Err(err) = self.descend(&root, self.depth) {
                return Some(Err(err.into()));
            }
        }

        loop {
            let (levels_below, entries) = self.stack.last_mut()?;
            let levels_below = *levels_below;
            match entries.next() {
                None => {
                    self.stack.pop();
                }
                Some(path) if levels_below == 0 => return Some(Ok(path)),
                Some(path) => {
                    if let Err(err) = self.descend(&path, levels_below - 1) {
                        return Some(Err(err.into()));
                    }
                }
            }
        }
    }
}
