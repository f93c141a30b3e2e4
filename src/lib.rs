//! Rotating, compressed, append-only line store.
//!
//! Lines are appended to the newest segment of a directory tree. Once a
//! segment reaches its size budget it is sealed (compressed) and the next
//! line opens a fresh segment. Readers stream the whole history forward or
//! backward.
//!
//! ```text
//! {root}/
//!   000/
//!     000/
//!       000.txt.zst      <- sealed
//!       001.txt.zst      <- sealed
//!       002.txt          <- raw tail, receives appends
//! ```

pub mod codec;
pub mod config;
pub mod dir;
pub mod error;
pub mod locator;
pub mod segment;
pub mod segment_id;
pub mod segment_path;

pub use codec::Codec;
pub use config::LogDirConfig;
pub use dir::{DirByteLines, DirLines, LogDir, SegmentPaths};
pub use error::{Error, Result};
pub use locator::{Direction, TailLocator};
pub use segment::{Segment, SegmentState};
pub use segment_id::SegmentId;
pub use segment_path::{ArtifactKind, SegmentPath};
