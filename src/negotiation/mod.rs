//! Content negotiation subsystem.
//!
//! # Data Flow
//! ```text
//! Accept / Accept-Encoding header
//!     → preference.rs (weighted, stably sorted PreferenceList)
//!     → negotiator.rs (pick a candidate: exact, type/*, *, fallback)
//!     → compression.rs (compress or not, gzip/deflate encoders)
//!     → serialization (final bytes + Content-* headers)
//! ```
//!
//! # Design Decisions
//! - Parsing is permissive: malformed content never raises
//! - Client quality first; server order breaks ties within wildcards
//! - Encoding negotiation always has `identity` available unless excluded

pub mod compression;
pub mod negotiator;
pub mod preference;

pub use compression::{compress, should_compress, Encoding, DEFAULT_MIN_COMPRESS_SIZE};
pub use negotiator::{select, select_content_type, select_encoding, select_encoding_header};
pub use preference::{parse, parse_header_value, PreferenceEntry, PreferenceList};

/// The no-op content coding.
pub const IDENTITY: &str = "identity";

/// Media types this crate produces.
pub mod media_type {
    pub const APPLICATION_JSON: &str = "application/json";
}

/// Codings offered by the serializer, in server preference order.
pub const SERVER_ENCODINGS: [&str; 3] = ["gzip", "deflate", IDENTITY];

/// Build a `Content-Type` value, appending `charset` when non-empty.
pub fn content_type_header(content_type: &str, charset: &str) -> String {
    if charset.is_empty() {
        content_type.to_string()
    } else {
        format!("{content_type}; charset={charset}")
    }
}

/// Outcome of one negotiation, fixed once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiationResult {
    content_type: String,
    charset: String,
    encoding: Option<String>,
}

impl NegotiationResult {
    pub fn new(content_type: impl Into<String>, charset: impl Into<String>, encoding: Option<String>) -> Self {
        Self {
            content_type: content_type.into(),
            charset: charset.into(),
            encoding,
        }
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn charset(&self) -> &str {
        &self.charset
    }

    /// Applied content coding; `None` when the payload is sent as-is.
    pub fn encoding(&self) -> Option<&str> {
        self.encoding.as_deref()
    }

    /// Full `Content-Type` header value.
    pub fn content_type_header(&self) -> String {
        content_type_header(&self.content_type, &self.charset)
    }
}
