use std::io;
use std::path::PathBuf;

/// Errors produced by the line store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// The line contains the line separator and cannot be stored as one line.
    #[error("line contains a line separator")]
    InvalidLine,

    /// Append attempted on a segment that is no longer raw.
    #[error("segment is sealed: {}", .0.display())]
    SealedWrite(PathBuf),

    #[error("segment already sealed: {}", .0.display())]
    AlreadySealed(PathBuf),

    /// The segment id needs more digit groups than the layout provides.
    #[error("segment id {id} does not fit in {groups} digit groups")]
    CapacityExceeded { id: u64, groups: usize },

    /// A path whose numeric encoding does not round-trip to itself.
    #[error("malformed segment path: {}", .0.display())]
    MalformedPath(PathBuf),

    #[error("invalid utf-8 in segment: {}", .0.display())]
    InvalidUtf8(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = std::result::Result<T, Error>;
