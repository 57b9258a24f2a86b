//! Outbound transport abstraction.
//!
//! # Responsibilities
//! - Describe one outbound request independent of the HTTP library
//! - Perform exactly one network attempt per `send`
//! - Classify I/O failures (connect / timeout / protocol)
//!
//! # Design Decisions
//! - Any status code is a successful transport result; the retry loop
//!   decides what a status means
//! - Bodies are fully buffered so a cached entry is never half-written

pub mod http_transport;

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use bytes::Bytes;
use reqwest::Method;
use url::Url;

use crate::error::TransportFailure;

pub use http_transport::ReqwestTransport;

/// A fully-built outbound request.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    /// Absolute URL, query string included.
    pub url: Url,
    /// Header overrides; names are matched case-insensitively by the transport.
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
    /// Per-attempt deadline override.
    pub timeout: Option<Duration>,
}

impl OutboundRequest {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: BTreeMap::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Attach a JSON body and its Content-Type.
    pub fn json_body(mut self, body: &serde_json::Value) -> Result<Self, serde_json::Error> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        self.headers
            .insert("content-type".to_string(), "application/json".to_string());
        Ok(self)
    }
}

/// A complete response: status, headers and the whole body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Lowercased header names.
    pub headers: BTreeMap<String, String>,
    pub body: Bytes,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// One network attempt.
///
/// Implementations must not retry internally.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &OutboundRequest,
    ) -> impl Future<Output = Result<TransportResponse, TransportFailure>> + Send;
}
