use crate::codec::{Codec, DEFAULT_COMPRESSION_LEVEL};
use crate::segment_id::MAX_GROUPS;
use crate::{Error, Result};

/// Default number of directory levels above segment files.
pub const DEFAULT_SUBDIRS: usize = 2;

/// Default raw size at which a segment is sealed on the next append (32 MiB).
pub const DEFAULT_MAX_SEGMENT_BYTES: u64 = 32 * 1024 * 1024;

/// Configuration of a log directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct LogDirConfig {
    /// Directory levels between the root and segment files. Segment ids get
    /// `subdirs + 1` digit groups.
    pub subdirs: usize,
    /// Raw size at or above which the tail is sealed before the next append.
    /// This is not a hard cap: the last segment may stay above it until
    /// another line arrives.
    pub max_segment_bytes: u64,
    pub codec: Codec,
    pub compression_level: i32,
}

impl Default for LogDirConfig {
    fn default() -> Self {
        Self {
            subdirs: DEFAULT_SUBDIRS,
            max_segment_bytes: DEFAULT_MAX_SEGMENT_BYTES,
            codec: Codec::default(),
            compression_level: DEFAULT_COMPRESSION_LEVEL,
        }
    }
}

impl LogDirConfig {
    /// Digit groups per segment id. Saturates instead of overflowing;
    /// `validate` rejects anything past `MAX_GROUPS`.
    pub fn groups(&self) -> usize {
        self.subdirs.saturating_add(1)
    }

    /// # Errors
    ///
    /// - `Error::InvalidConfig`: too many levels, zero threshold, or a
    ///   compression level the codec rejects
    pub fn validate(&self) -> Result<()> {
        if self.subdirs >= MAX_GROUPS {
            return Err(Error::InvalidConfig("subdirs exceeds supported depth"));
        }
        if self.max_segment_bytes == 0 {
            return Err(Error::InvalidConfig("max_segment_bytes must be > 0"));
        }
        self.codec.validate_level(self.compression_level)
    }
}
