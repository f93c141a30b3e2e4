//! One segment of the log and its raw → sealed lifecycle.
//!
//! A segment is stored as one of three artifacts sharing a stem:
//!
//! - `NNN.txt`: raw, appendable lines
//! - `NNN.txt.zst`: sealed, compressed, immutable
//! - `NNN.txt.zst.tmp`: transient seal output, not yet committed
//!
//! Sealing writes the transient file and renames it over to the sealed name.
//! That rename is the commit point: before it the raw file is authoritative,
//! after it the sealed file is, even if the raw file is still around.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::codec::Codec;
use crate::segment_id::SegmentId;
use crate::segment_path::{ArtifactKind, SegmentPath};
use crate::{Error, Result};

/// Separator between stored lines.
pub const LINE_SEPARATOR: u8 = b'\n';

/// Logical state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Appendable, stored uncompressed.
    Raw,
    /// Compressed copy being written; only observable inside `seal()`.
    Sealing,
    /// Committed, compressed, immutable.
    Sealed,
}

/// A single segment file (raw or sealed).
#[derive(Debug)]
pub struct Segment {
    id: SegmentId,
    raw: PathBuf,
    sealed: PathBuf,
    transient: PathBuf,
    codec: Codec,
    level: i32,
    state: SegmentState,
}

impl Segment {
    /// Open a segment for writing, recovering from an interrupted seal.
    ///
    /// A leftover transient artifact is deleted. If a sealed artifact exists
    /// it wins and any raw artifact beside it is deleted as redundant.
    /// Otherwise the segment is raw; the raw file need not exist yet, and an
    /// unterminated fragment left by an interrupted append is cut off so the
    /// next line starts on a fresh record.
    pub fn open(location: &SegmentPath, codec: Codec, level: i32) -> Result<Self> {
        let mut segment = Self::at(location, codec, level);

        if remove_if_exists(&segment.transient)? {
            log::warn!(
                "removed incomplete seal output {}",
                segment.transient.display()
            );
        }

        if exists(&segment.sealed)? {
            segment.state = SegmentState::Sealed;
            if remove_if_exists(&segment.raw)? {
                log::warn!(
                    "removed raw artifact superseded by {}",
                    segment.sealed.display()
                );
            }
        } else {
            let dropped = truncate_torn_tail(&segment.raw)?;
            if dropped > 0 {
                log::warn!(
                    "dropped {} bytes of unterminated line from {}",
                    dropped,
                    segment.raw.display()
                );
            }
        }

        Ok(segment)
    }

    /// Open a segment for reading only. Nothing on disk is touched, so this
    /// is safe while a writer owns the directory.
    pub fn inspect(location: &SegmentPath, codec: Codec, level: i32) -> Result<Self> {
        let mut segment = Self::at(location, codec, level);
        if exists(&segment.sealed)? {
            segment.state = SegmentState::Sealed;
        }
        Ok(segment)
    }

    fn at(location: &SegmentPath, codec: Codec, level: i32) -> Self {
        Self {
            id: location.id(),
            raw: location.artifact(ArtifactKind::Raw, codec),
            sealed: location.artifact(ArtifactKind::Sealed, codec),
            transient: location.artifact(ArtifactKind::Transient, codec),
            codec,
            level,
            state: SegmentState::Raw,
        }
    }

    pub fn id(&self) -> SegmentId {
        self.id
    }

    pub fn state(&self) -> SegmentState {
        self.state
    }

    pub fn is_sealed(&self) -> bool {
        self.state == SegmentState::Sealed
    }

    /// Path of the artifact backing the current state.
    pub fn path(&self) -> &Path {
        match self.state {
            SegmentState::Sealed => &self.sealed,
            SegmentState::Raw | SegmentState::Sealing => &self.raw,
        }
    }

    /// Append one line and flush it to disk.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidLine`: `line` contains the separator
    /// - `Error::SealedWrite`: the segment is not raw
    /// - `Error::Io`: write or sync failed
    pub fn append(&mut self, line: &str) -> Result<()> {
        if line.as_bytes().contains(&LINE_SEPARATOR) {
            return Err(Error::InvalidLine);
        }
        if self.state != SegmentState::Raw {
            return Err(Error::SealedWrite(self.path().to_path_buf()));
        }

        let mut record = Vec::with_capacity(line.len() + 1);
        record.extend_from_slice(line.as_bytes());
        record.push(LINE_SEPARATOR);

        let mut file = OpenOptions::new().create(true).append(true).open(&self.raw)?;
        // Single write per line; readers drop an unterminated tail.
        file.write_all(&record)?;
        file.sync_data()?;
        Ok(())
    }

    /// Compress the raw artifact and commit it as the sealed artifact.
    ///
    /// Returns the size of the sealed file. On failure nothing is committed
    /// and the segment stays raw.
    ///
    /// # Errors
    ///
    /// - `Error::AlreadySealed`: the segment is not raw, or a sealed artifact
    ///   appeared under its name (the commit rename never replaces one)
    /// - `Error::Io`: compression, rename or cleanup failed
    pub fn seal(&mut self) -> Result<u64> {
        if self.state != SegmentState::Raw {
            return Err(Error::AlreadySealed(self.path().to_path_buf()));
        }

        self.state = SegmentState::Sealing;
        let sealed_len = match self.write_transient() {
            Ok(len) => len,
            Err(err) => {
                let _ = fs::remove_file(&self.transient);
                self.state = SegmentState::Raw;
                return Err(err);
            }
        };

        if let Err(err) = rename_noreplace(&self.transient, &self.sealed) {
            let _ = fs::remove_file(&self.transient);
            self.state = SegmentState::Raw;
            return Err(match err.kind() {
                io::ErrorKind::AlreadyExists => Error::AlreadySealed(self.sealed.clone()),
                _ => Error::Io(err),
            });
        }
        self.state = SegmentState::Sealed;

        remove_if_exists(&self.raw)?;
        if let Some(parent) = self.sealed.parent() {
            sync_dir(parent)?;
        }

        log::info!(
            "sealed segment {} -> {} ({} bytes)",
            self.id,
            self.sealed.display(),
            sealed_len
        );
        Ok(sealed_len)
    }

    fn write_transient(&self) -> Result<u64> {
        let _ = fs::remove_file(&self.transient);

        let output = File::create(&self.transient)?;
        let output = match File::open(&self.raw) {
            Ok(mut input) => self.codec.encode(&mut input, output, self.level)?,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                self.codec.encode(&mut io::empty(), output, self.level)?
            }
            Err(err) => return Err(err.into()),
        };
        output.sync_all()?;
        Ok(output.metadata()?.len())
    }

    /// On-disk size of the current artifact; 0 for a raw segment not yet
    /// written. Sealed segments report their compressed size.
    pub fn size_in_bytes(&self) -> Result<u64> {
        match fs::metadata(self.path()) {
            Ok(meta) => Ok(meta.len()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err.into()),
        }
    }

    /// Lines in storage order, without separators. Lazy; call again to
    /// restart.
    pub fn byte_lines(&self) -> ByteLines {
        ByteLines {
            source: Source::Pending {
                raw: self.raw.clone(),
                sealed: self.sealed.clone(),
                codec: self.codec,
            },
        }
    }

    /// Lines in storage order as strings.
    pub fn lines(&self) -> Lines {
        Lines {
            inner: self.byte_lines(),
            path: self.path().to_path_buf(),
        }
    }

    /// Lines last to first. The segment is read completely up front.
    pub fn reversed_byte_lines(&self) -> Result<std::iter::Rev<std::vec::IntoIter<Vec<u8>>>> {
        let lines = self.byte_lines().collect::<Result<Vec<_>>>()?;
        Ok(lines.into_iter().rev())
    }

    pub fn reversed_lines(&self) -> Result<std::iter::Rev<std::vec::IntoIter<String>>> {
        let lines = self.lines().collect::<Result<Vec<_>>>()?;
        Ok(lines.into_iter().rev())
    }
}

enum Source {
    Pending {
        raw: PathBuf,
        sealed: PathBuf,
        codec: Codec,
    },
    Open(Box<dyn BufRead + Send>),
    Done,
}

/// Lazy forward iterator over the lines of one segment.
///
/// The artifact is resolved on the first pull: sealed if present, else raw,
/// else sealed once more in case the writer sealed in between. No artifact
/// at all reads as an empty segment.
pub struct ByteLines {
    source: Source,
}

impl ByteLines {
    fn resolve(raw: &Path, sealed: &Path, codec: Codec) -> Result<Option<Box<dyn BufRead + Send>>> {
        if let Some(reader) = open_sealed(sealed, codec)? {
            return Ok(Some(reader));
        }
        match File::open(raw) {
            Ok(file) => return Ok(Some(Box::new(BufReader::new(file)))),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        open_sealed(sealed, codec)
    }
}

fn open_sealed(sealed: &Path, codec: Codec) -> Result<Option<Box<dyn BufRead + Send>>> {
    match File::open(sealed) {
        Ok(file) => Ok(Some(Box::new(BufReader::new(codec.decoder(file)?)))),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

impl Iterator for ByteLines {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Source::Pending { raw, sealed, codec } = &self.source {
            let resolved = Self::resolve(raw, sealed, *codec);
            self.source = match resolved {
                Ok(Some(reader)) => Source::Open(reader),
                Ok(None) => Source::Done,
                Err(err) => {
                    self.source = Source::Done;
                    return Some(Err(err));
                }
            };
        }

        let reader = match &mut self.source {
            Source::Open(reader) => reader,
            _ => return None,
        };

        let mut line = Vec::new();
        match reader.read_until(LINE_SEPARATOR, &mut line) {
            Ok(0) => {
                self.source = Source::Done;
                None
            }
            Ok(_) if line.last() == Some(&LINE_SEPARATOR) => {
                line.pop();
                Some(Ok(line))
            }
            // Unterminated tail: a line still being written.
            Ok(_) => {
                self.source = Source::Done;
                None
            }
            Err(err) => {
                self.source = Source::Done;
                Some(Err(err.into()))
            }
        }
    }
}

/// Lazy forward iterator over the lines of one segment as strings.
pub struct Lines {
    inner: ByteLines,
    path: PathBuf,
}

impl Iterator for Lines {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let line = match self.inner.next()? {
            Ok(line) => line,
            Err(err) => return Some(Err(err)),
        };
        Some(String::from_utf8(line).map_err(|_| Error::InvalidUtf8(self.path.clone())))
    }
}

fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Remove `path`, reporting whether there was anything to remove.
fn remove_if_exists(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

/// Cut `raw` back to just after its last separator. Returns the number of
/// bytes removed; a missing file counts as clean.
fn truncate_torn_tail(raw: &Path) -> Result<u64> {
    let mut file = match OpenOptions::new().read(true).write(true).open(raw) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(0),
        Err(err) => return Err(err.into()),
    };
    let len = file.metadata()?.len();

    let mut keep = 0;
    let mut end = len;
    let mut chunk = [0u8; 4096];
    while end > 0 {
        let start = end.saturating_sub(chunk.len() as u64);
        let buf = &mut chunk[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(buf)?;
        if let Some(pos) = buf.iter().rposition(|&b| b == LINE_SEPARATOR) {
            keep = start + pos as u64 + 1;
            break;
        }
        end = start;
    }

    if keep == len {
        return Ok(0);
    }
    file.set_len(keep)?;
    file.sync_data()?;
    Ok(len - keep)
}

/// The seal commit point: move the transient artifact onto the sealed name
/// unless something already lives there. Linux gets the check and the move
/// in one `renameat2(RENAME_NOREPLACE)`; elsewhere, or on filesystems that
/// reject the flag, an existence check precedes a plain rename.
fn rename_noreplace(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(target_os = "linux")]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = |path: &Path| {
            CString::new(path.as_os_str().as_bytes())
                .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err))
        };
        let (from_c, to_c) = (c_path(from)?, c_path(to)?);

        // SAFETY: both pointers come from live NUL-terminated CStrings.
        let rc = unsafe {
            libc::renameat2(
                libc::AT_FDCWD,
                from_c.as_ptr(),
                libc::AT_FDCWD,
                to_c.as_ptr(),
                libc::RENAME_NOREPLACE,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::ENOSYS) | Some(libc::EINVAL) => {}
            _ => return Err(err),
        }
    }

    if to.exists() {
        return Err(io::ErrorKind::AlreadyExists.into());
    }
    fs::rename(from, to)
}

#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
