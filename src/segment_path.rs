//! Segment naming and directory layout.
//!
//! ```text
//! {root}/
//!   000/
//!     000/
//!       000.txt.zst        <- segment 0 (sealed)
//!       001.txt.zst        <- segment 1 (sealed)
//!       002.txt            <- segment 2 (raw tail)
//!       002.txt.zst.tmp    <- transient seal output, short lived
//! ```

use std::path::{Path, PathBuf};

use crate::codec::Codec;
use crate::locator::numeric_prefix_str;
use crate::segment_id::{compose, decompose, increment, SegmentId, GROUP_BASE};
use crate::{Error, Result};

/// Suffix of a raw (uncompressed) segment.
pub const RAW_SUFFIX: &str = ".txt";

const TRANSIENT_EXT: &str = "tmp";

/// Which on-disk artifact of a segment a file is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    Raw,
    Sealed,
    Transient,
}

impl ArtifactKind {
    pub fn suffix(self, codec: Codec) -> String {
        match self {
            ArtifactKind::Raw => RAW_SUFFIX.to_string(),
            ArtifactKind::Sealed => format!("{RAW_SUFFIX}.{}", codec.extension()),
            ArtifactKind::Transient => {
                format!("{RAW_SUFFIX}.{}.{TRANSIENT_EXT}", codec.extension())
            }
        }
    }

    /// Map a file name suffix back to its artifact kind.
    pub fn classify(suffix: &str, codec: Codec) -> Option<Self> {
        [ArtifactKind::Raw, ArtifactKind::Sealed, ArtifactKind::Transient]
            .into_iter()
            .find(|kind| kind.suffix(codec) == suffix)
    }
}

/// Strip the artifact suffix from a file name, e.g. `my.log.txt.zst` -> `my.log`.
///
/// Returns `None` for names carrying none of the artifact suffixes.
pub fn strip_artifact_suffix(name: &str, codec: Codec) -> Option<&str> {
    // Longest first: the transient suffix ends with the sealed one's text.
    [ArtifactKind::Transient, ArtifactKind::Sealed, ArtifactKind::Raw]
        .into_iter()
        .find_map(|kind| name.strip_suffix(kind.suffix(codec).as_str()))
}

/// Location of a segment artifact: root, digit groups and name suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentPath {
    root: PathBuf,
    groups: Vec<u16>,
    suffix: String,
}

impl SegmentPath {
    /// # Errors
    ///
    /// - `Error::InvalidConfig`: no groups, or a group outside `0..=999`
    pub fn new(root: impl Into<PathBuf>, groups: Vec<u16>, suffix: impl Into<String>) -> Result<Self> {
        if groups.is_empty() {
            return Err(Error::InvalidConfig("segment path needs at least one group"));
        }
        if groups.iter().any(|&g| u64::from(g) >= GROUP_BASE) {
            return Err(Error::InvalidConfig("digit group out of range"));
        }
        Ok(Self {
            root: root.into(),
            groups,
            suffix: suffix.into(),
        })
    }

    /// Path of segment 0 with `subdirs` directory levels.
    pub fn first(root: impl Into<PathBuf>, suffix: impl Into<String>, subdirs: usize) -> Self {
        Self {
            root: root.into(),
            groups: vec![0; subdirs + 1],
            suffix: suffix.into(),
        }
    }

    /// Build the path of segment `id`.
    pub fn for_id(
        root: impl Into<PathBuf>,
        id: SegmentId,
        suffix: impl Into<String>,
        subdirs: usize,
    ) -> Result<Self> {
        Self::new(root, decompose(id.get(), subdirs + 1)?, suffix)
    }

    /// Parse a segment path with `subdirs` directory levels under the root.
    ///
    /// The file name contributes its numeric prefix, every parent directory
    /// its whole name. Anything that does not rebuild to the same path is
    /// rejected, e.g. `5.txt` instead of `005.txt`.
    ///
    /// # Errors
    ///
    /// - `Error::MalformedPath`: missing numeric prefix, non-numeric parent,
    ///   or a path that does not round-trip
    pub fn from_path(file: &Path, subdirs: usize) -> Result<Self> {
        let malformed = || Error::MalformedPath(file.to_path_buf());

        let name = file.file_name().and_then(|n| n.to_str()).ok_or_else(malformed)?;
        let digits = numeric_prefix_str(name).ok_or_else(malformed)?;
        let suffix = &name[digits.len()..];

        let mut groups = Vec::with_capacity(subdirs + 1);
        groups.push(parse_group(digits).ok_or_else(malformed)?);

        let mut current = file;
        for _ in 0..subdirs {
            current = current.parent().ok_or_else(malformed)?;
            let dir_name = current.file_name().and_then(|n| n.to_str()).ok_or_else(malformed)?;
            if !dir_name.bytes().all(|b| b.is_ascii_digit()) {
                return Err(malformed());
            }
            groups.push(parse_group(dir_name).ok_or_else(malformed)?);
        }
        groups.reverse();

        let root = current.parent().ok_or_else(malformed)?;
        let parsed = Self::new(root, groups, suffix).map_err(|_| malformed())?;
        if parsed.path() != file {
            return Err(malformed());
        }
        Ok(parsed)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn groups(&self) -> &[u16] {
        &self.groups
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Number of directory levels between the root and the file.
    pub fn subdirs(&self) -> usize {
        self.groups.len() - 1
    }

    pub fn id(&self) -> SegmentId {
        // Groups are validated to < 1000 and bounded in count by construction.
        SegmentId::new(compose(&self.groups).unwrap_or(u64::MAX))
    }

    /// Full filesystem path.
    pub fn path(&self) -> PathBuf {
        let mut path = self.root.clone();
        let last = self.groups.len() - 1;
        for group in &self.groups[..last] {
            path.push(format!("{group:03}"));
        }
        path.push(format!("{:03}{}", self.groups[last], self.suffix));
        path
    }

    /// Same segment, different suffix.
    pub fn with_suffix(&self, suffix: impl Into<String>) -> Self {
        Self {
            root: self.root.clone(),
            groups: self.groups.clone(),
            suffix: suffix.into(),
        }
    }

    /// Path of the artifact `kind` for this segment.
    pub fn artifact(&self, kind: ArtifactKind, codec: Codec) -> PathBuf {
        self.with_suffix(kind.suffix(codec)).path()
    }

    /// The segment following this one, same root and suffix.
    ///
    /// # Errors
    ///
    /// - `Error::CapacityExceeded`: this is the last addressable segment
    pub fn next(&self) -> Result<Self> {
        let width = self.groups.len();
        let next = increment(self.id().get(), width)?;
        Ok(Self {
            root: self.root.clone(),
            groups: decompose(next, width)?,
            suffix: self.suffix.clone(),
        })
    }
}

fn parse_group(digits: &str) -> Option<u16> {
    digits.parse::<u16>().ok().filter(|&g| u64::from(g) < GROUP_BASE)
}
