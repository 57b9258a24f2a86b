//! Error types shared by the client, the retry loop and the serializer.

use std::time::Duration;
use thiserror::Error;

/// A failed transport attempt, or a retryable status, as seen by the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportFailure {
    /// Connection refused, DNS failure, reset during connect.
    #[error("connection failed: {0}")]
    Connect(String),

    /// The attempt did not complete in time.
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    /// Malformed request, broken body stream, redirect loop.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The server answered with a status configured as retryable.
    #[error("HTTP {status}: {body_preview}")]
    Status { status: u16, body_preview: String },
}

/// Errors surfaced to callers of this crate.
#[derive(Debug, Error)]
pub enum HttpError {
    /// The preference header was not visible ASCII text.
    #[error("invalid preference header: {0}")]
    NegotiationParse(String),

    /// Transient failures persisted through every allowed attempt.
    #[error("request failed after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: TransportFailure },

    /// The server answered with a status that is never retried.
    #[error("HTTP {status} after {attempts} attempt(s): {body_preview}")]
    Permanent {
        status: u16,
        attempts: u32,
        body_preview: String,
    },

    /// The transport rejected the request in a way retrying cannot fix.
    #[error("protocol error after {attempts} attempt(s): {message}")]
    Protocol { attempts: u32, message: String },

    /// The request URL could not be built.
    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    /// JSON encoding or decoding failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The compressor failed to write its output.
    #[error("compression failed: {0}")]
    Compression(#[from] std::io::Error),
}

impl HttpError {
    /// Number of network attempts made before this error, when one was made.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetriesExhausted { attempts, .. }
            | Self::Permanent { attempts, .. }
            | Self::Protocol { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }

    /// True for failures caused by transient network or server conditions.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RetriesExhausted { .. })
    }

    /// HTTP status of the final response, if the failure carried one.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Permanent { status, .. } => Some(*status),
            Self::RetriesExhausted {
                last: TransportFailure::Status { status, .. },
                ..
            } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for this crate.
pub type HttpResult<T> = Result<T, HttpError>;

/// Trim a response body for inclusion in error messages.
pub(crate) fn body_preview(body: &[u8]) -> String {
    const LIMIT: usize = 256;
    let text = String::from_utf8_lossy(&body[..body.len().min(LIMIT)]);
    if body.len() > LIMIT {
        format!("{text}...")
    } else {
        text.into_owned()
    }
}
