//! Streaming compression used to seal segments.

use std::fmt;
use std::fs::File;
use std::io::{self, Read, Write};
use std::str::FromStr;

use crate::{Error, Result};

pub const DEFAULT_COMPRESSION_LEVEL: i32 = 3;

/// Compression codec for sealed segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
pub enum Codec {
    #[default]
    Zstd,
    #[cfg(feature = "gzip")]
    Gzip,
    /// Sealed as `.txt.xz`.
    #[cfg(feature = "xz")]
    Xz,
}

impl Codec {
    /// File extension appended to the raw name of a sealed segment.
    pub fn extension(self) -> &'static str {
        match self {
            Codec::Zstd => "zst",
            #[cfg(feature = "gzip")]
            Codec::Gzip => "gz",
            #[cfg(feature = "xz")]
            Codec::Xz => "xz",
        }
    }

    /// Check that `level` is accepted by this codec.
    pub fn validate_level(self, level: i32) -> Result<()> {
        let ok = match self {
            Codec::Zstd => zstd::compression_level_range().contains(&level),
            #[cfg(feature = "gzip")]
            Codec::Gzip => (0..=9).contains(&level),
            #[cfg(feature = "xz")]
            Codec::Xz => (0..=9).contains(&level),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::InvalidConfig("compression level out of range for codec"))
        }
    }

    /// Stream all of `input` into `output` through the encoder.
    ///
    /// Returns the underlying writer once the stream is finished.
    pub fn encode<R: Read, W: Write>(self, input: &mut R, output: W, level: i32) -> io::Result<W> {
        match self {
            Codec::Zstd => {
                let mut encoder = zstd::stream::write::Encoder::new(output, level)?;
                io::copy(input, &mut encoder)?;
                encoder.finish()
            }
            #[cfg(feature = "gzip")]
            Codec::Gzip => {
                let level = flate2::Compression::new(level.clamp(0, 9) as u32);
                let mut encoder = flate2::write::GzEncoder::new(output, level);
                io::copy(input, &mut encoder)?;
                encoder.finish()
            }
            #[cfg(feature = "xz")]
            Codec::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(output, level.clamp(0, 9) as u32);
                io::copy(input, &mut encoder)?;
                encoder.finish()
            }
        }
    }

    /// Wrap a sealed file in a streaming decoder.
    pub fn decoder(self, file: File) -> io::Result<Box<dyn Read + Send>> {
        match self {
            Codec::Zstd => Ok(Box::new(zstd::stream::read::Decoder::new(file)?)),
            #[cfg(feature = "gzip")]
            Codec::Gzip => Ok(Box::new(flate2::read::MultiGzDecoder::new(file))),
            #[cfg(feature = "xz")]
            Codec::Xz => Ok(Box::new(xz2::read::XzDecoder::new_multi_decoder(file))),
        }
    }
}

impl fmt::Display for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Codec::Zstd => f.write_str("zstd"),
            #[cfg(feature = "gzip")]
            Codec::Gzip => f.write_str("gzip"),
            #[cfg(feature = "xz")]
            Codec::Xz => f.write_str("xz"),
        }
    }
}

impl FromStr for Codec {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "zstd" | "zst" => Ok(Codec::Zstd),
            #[cfg(feature = "gzip")]
            "gzip" | "gz" => Ok(Codec::Gzip),
            #[cfg(feature = "xz")]
            "xz" => Ok(Codec::Xz),
            _ => Err(Error::InvalidConfig("unknown codec")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Seek, SeekFrom};
    use tempfile::tempfile;

    fn round_trip(codec: Codec, data: &[u8]) -> Vec<u8> {
        let mut file = tempfile().unwrap();
        let mut input = data;
        file = codec.encode(&mut input, file, DEFAULT_COMPRESSION_LEVEL).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();

        let mut out = Vec::new();
        codec.decoder(file).unwrap().read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_zstd_is_lossless() {
        let data = b"line one\nline two\n".repeat(500);
        assert_eq!(round_trip(Codec::Zstd, &data), data);
        assert_eq!(round_trip(Codec::Zstd, b""), b"");
    }

    #[cfg(feature = "gzip")]
    #[test]
    fn test_gzip_is_lossless() {
        let data = b"alpha\nbeta\n\ngamma\n".repeat(100);
        assert_eq!(round_trip(Codec::Gzip, &data), data);
    }

    #[test]
    fn test_parse_and_extension() {
        assert_eq!("zstd".parse::<Codec>().unwrap(), Codec::Zstd);
        assert_eq!(Codec::Zstd.extension(), "zst");
        assert!("lz4".parse::<Codec>().is_err());
    }

    #[cfg(feature = "xz")]
    #[test]
    fn test_xz_is_lossless() {
        let data = b"one\n\ntwo\n".repeat(200);
        assert_eq!(round_trip(Codec::Xz, &data), data);
        assert_eq!("xz".parse::<Codec>().unwrap().extension(), "xz");
        assert!(Codec::Xz.validate_level(10).is_err());
    }

    #[test]
    fn test_validate_level() {
        assert!(Codec::Zstd.validate_level(3).is_ok());
        assert!(Codec::Zstd.validate_level(1000).is_err());
    }
}
