//! Compression decision and content-coding encoders.

use std::io::Write;

use flate2::write::{GzEncoder, ZlibEncoder};
use flate2::Compression;

/// Payloads smaller than this are sent uncompressed by default.
pub const DEFAULT_MIN_COMPRESS_SIZE: usize = 1024;

/// HTTP content codings known to this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    Identity,
    Gzip,
    Deflate,
    Brotli,
}

impl Encoding {
    /// Token as used in `Accept-Encoding` / `Content-Encoding`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Encoding::Identity => "identity",
            Encoding::Gzip => "gzip",
            Encoding::Deflate => "deflate",
            Encoding::Brotli => "br",
        }
    }

    /// Parse a content-coding token (case-insensitive).
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "identity" => Some(Encoding::Identity),
            "gzip" | "x-gzip" => Some(Encoding::Gzip),
            "deflate" => Some(Encoding::Deflate),
            "br" => Some(Encoding::Brotli),
            _ => None,
        }
    }

    /// True for codings that actually transform the payload.
    pub fn is_compression(&self) -> bool {
        !matches!(self, Encoding::Identity)
    }
}

impl std::fmt::Display for Encoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decide whether a payload should be compressed.
///
/// True only for a real compression scheme and a payload of at least
/// `min_size_bytes`. Small bodies stay uncompressed because framing overhead
/// would exceed the savings.
pub fn should_compress(
    negotiated_encoding: Option<&str>,
    content_size: usize,
    min_size_bytes: usize,
) -> bool {
    let real_scheme = negotiated_encoding
        .and_then(Encoding::from_token)
        .is_some_and(|enc| enc.is_compression());
    real_scheme && content_size >= min_size_bytes
}

/// Encode `data` with the given coding.
///
/// `deflate` produces the zlib format, which is what HTTP's `deflate` coding
/// means. Brotli is recognized but not produced; it is never offered.
pub fn compress(encoding: Encoding, data: &[u8]) -> std::io::Result<Vec<u8>> {
    match encoding {
        Encoding::Identity => Ok(data.to_vec()),
        Encoding::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Encoding::Deflate => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data)?;
            encoder.finish()
        }
        Encoding::Brotli => Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "brotli encoding is not supported",
        )),
    }
}
