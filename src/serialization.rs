//! Negotiated serialization of in-process objects.
//!
//! # Data Flow
//! ```text
//! Serializable::to_structured()
//!     → canonical JSON text (sorted keys, compact unless pretty)
//!     → Accept-Encoding → select_encoding(gzip, deflate, identity)
//!     → should_compress(encoding, len, min_compress_size)
//!     → NegotiatedPayload { content, headers, negotiation }
//! ```
//!
//! Output is deterministic for a given input: serde_json maps keep their
//! keys sorted and the gzip header carries no timestamp.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::{Map, Value};

use crate::error::HttpResult;
use crate::negotiation::{
    self, compress, media_type, should_compress, Encoding, NegotiationResult, IDENTITY,
    SERVER_ENCODINGS,
};
use crate::observability::metrics;

pub const CONTENT_TYPE: &str = "Content-Type";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";

/// An object that can describe itself as a JSON object.
///
/// Implementors provide [`to_structured`](Serializable::to_structured); the
/// JSON, gzip and negotiation helpers come for free.
pub trait Serializable {
    fn to_structured(&self) -> Map<String, Value>;

    /// Canonical JSON text.
    fn to_json(&self, pretty: bool) -> HttpResult<String> {
        let value = Value::Object(self.to_structured());
        let text = if pretty {
            serde_json::to_string_pretty(&value)?
        } else {
            serde_json::to_string(&value)?
        };
        Ok(text)
    }

    /// Compact JSON, gzip-compressed.
    fn to_json_gzipped(&self) -> HttpResult<Vec<u8>> {
        let json = self.to_json(false)?;
        Ok(compress(Encoding::Gzip, json.as_bytes())?)
    }

    /// Compact JSON, gzip-compressed, then base64 (standard alphabet).
    fn to_json_gzipped_base64(&self) -> HttpResult<String> {
        Ok(STANDARD.encode(self.to_json_gzipped()?))
    }

    fn serialize_with_negotiation(&self, options: &SerializeOptions) -> HttpResult<NegotiatedPayload> {
        serialize_with_negotiation(self, options)
    }
}

impl Serializable for Map<String, Value> {
    fn to_structured(&self) -> Map<String, Value> {
        self.clone()
    }
}

/// Inputs to one negotiated serialization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializeOptions {
    /// Raw `Accept-Encoding` value; `None` or empty means identity.
    pub accept_encoding: Option<String>,
    pub min_compress_size: usize,
    /// Charset for `Content-Type`; empty omits the parameter.
    pub charset: String,
    pub pretty: bool,
}

impl SerializeOptions {
    pub fn new(accept_encoding: Option<&str>) -> Self {
        Self {
            accept_encoding: accept_encoding.map(str::to_string),
            ..Self::default()
        }
    }

    pub fn from_config(config: &crate::config::NegotiationConfig, accept_encoding: Option<&str>) -> Self {
        Self {
            accept_encoding: accept_encoding.map(str::to_string),
            min_compress_size: config.min_compress_size,
            charset: config.charset.clone(),
            pretty: false,
        }
    }
}

impl Default for SerializeOptions {
    fn default() -> Self {
        Self {
            accept_encoding: None,
            min_compress_size: negotiation::DEFAULT_MIN_COMPRESS_SIZE,
            charset: "utf-8".to_string(),
            pretty: false,
        }
    }
}

/// Final representation body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    /// Uncompressed JSON text.
    Text(String),
    /// Compressed bytes.
    Binary(Vec<u8>),
}

impl Content {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            Content::Text(text) => text.into_bytes(),
            Content::Binary(bytes) => bytes,
        }
    }
}

/// Body, headers and the negotiation that produced them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedPayload {
    pub content: Content,
    pub headers: BTreeMap<String, String>,
    pub negotiation: NegotiationResult,
}

/// Serialize `source` and negotiate its wire representation.
///
/// Header parsing never fails here: an unusable `Accept-Encoding` degrades
/// to identity. `Content-Encoding` is set only when the body was compressed.
pub fn serialize_with_negotiation<S: Serializable + ?Sized>(
    source: &S,
    options: &SerializeOptions,
) -> HttpResult<NegotiatedPayload> {
    let json = source.to_json(options.pretty)?;
    let original_len = json.len();

    let encoding = negotiate_encoding(options.accept_encoding.as_deref());
    let applied = encoding
        .filter(|enc| should_compress(Some(enc.as_str()), original_len, options.min_compress_size));

    let content = match applied {
        Some(enc) => Content::Binary(compress(enc, json.as_bytes())?),
        None => Content::Text(json),
    };

    let negotiation = NegotiationResult::new(
        media_type::APPLICATION_JSON,
        options.charset.clone(),
        applied.map(|enc| enc.as_str().to_string()),
    );

    let mut headers = BTreeMap::new();
    headers.insert(CONTENT_TYPE.to_string(), negotiation.content_type_header());
    headers.insert(CONTENT_LENGTH.to_string(), content.len().to_string());
    if let Some(enc) = negotiation.encoding() {
        headers.insert(CONTENT_ENCODING.to_string(), enc.to_string());
    }

    metrics::record_negotiation(
        negotiation.encoding().unwrap_or(IDENTITY),
        original_len,
        content.len(),
    );
    tracing::debug!(
        encoding = negotiation.encoding().unwrap_or(IDENTITY),
        original_len,
        final_len = content.len(),
        "negotiated_payload"
    );

    Ok(NegotiatedPayload {
        content,
        headers,
        negotiation,
    })
}

/// Compressing coding for the header, if the client accepts one we offer.
fn negotiate_encoding(accept_encoding: Option<&str>) -> Option<Encoding> {
    let header = accept_encoding.map(str::trim).filter(|h| !h.is_empty())?;
    let preferences = negotiation::parse(header);
    negotiation::select_encoding(&preferences, &SERVER_ENCODINGS)
        .as_deref()
        .and_then(Encoding::from_token)
        .filter(Encoding::is_compression)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::{GzDecoder, ZlibDecoder};
    use serde_json::json;
    use std::io::Read;

    struct Station {
        name: &'static str,
        canton: &'static str,
        platforms: u32,
    }

    impl Serializable for Station {
        fn to_structured(&self) -> Map<String, Value> {
            let mut map = Map::new();
            map.insert("name".into(), json!(self.name));
            map.insert("canton".into(), json!(self.canton));
            map.insert("platforms".into(), json!(self.platforms));
            map
        }
    }

    fn station() -> Station {
        Station {
            name: "Bern",
            canton: "BE",
            platforms: 12,
        }
    }

    fn large() -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("data".into(), json!("x".repeat(2000)));
        map
    }

    #[test]
    fn test_to_json_sorts_keys() {
        assert_eq!(
            station().to_json(false).unwrap(),
            r#"{"canton":"BE","name":"Bern","platforms":12}"#
        );
        assert!(station().to_json(true).unwrap().contains("\n  \"canton\": \"BE\""));
    }

    #[test]
    fn test_gzipped_round_trip() {
        let gz = station().to_json_gzipped().unwrap();
        let mut text = String::new();
        GzDecoder::new(&gz[..]).read_to_string(&mut text).unwrap();
        assert_eq!(text, station().to_json(false).unwrap());

        let b64 = station().to_json_gzipped_base64().unwrap();
        assert_eq!(STANDARD.decode(b64).unwrap(), gz);
    }

    #[test]
    fn test_no_encoding_without_header() {
        for header in [None, Some(""), Some("   ")] {
            let payload = large()
                .serialize_with_negotiation(&SerializeOptions::new(header))
                .unwrap();
            assert!(!payload.headers.contains_key(CONTENT_ENCODING));
            assert!(matches!(payload.content, Content::Text(_)));
            assert_eq!(payload.negotiation.encoding(), None);
        }
    }

    #[test]
    fn test_small_payload_not_compressed() {
        let payload = station()
            .serialize_with_negotiation(&SerializeOptions::new(Some("gzip")))
            .unwrap();
        assert!(!payload.headers.contains_key(CONTENT_ENCODING));
        assert_eq!(
            payload.headers[CONTENT_LENGTH],
            payload.content.len().to_string()
        );
    }

    #[test]
    fn test_large_payload_gzipped() {
        let payload = large()
            .serialize_with_negotiation(&SerializeOptions::new(Some("gzip, deflate")))
            .unwrap();
        assert_eq!(payload.headers[CONTENT_ENCODING], "gzip");
        assert_eq!(
            payload.headers[CONTENT_TYPE],
            "application/json; charset=utf-8"
        );
        assert_eq!(payload.headers[CONTENT_LENGTH], payload.content.len().to_string());

        let mut text = String::new();
        GzDecoder::new(payload.content.as_bytes())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, large().to_json(false).unwrap());
    }

    #[test]
    fn test_deflate_preferred_by_quality() {
        let payload = large()
            .serialize_with_negotiation(&SerializeOptions::new(Some("gzip;q=0.5, deflate")))
            .unwrap();
        assert_eq!(payload.negotiation.encoding(), Some("deflate"));

        let mut text = String::new();
        ZlibDecoder::new(payload.content.as_bytes())
            .read_to_string(&mut text)
            .unwrap();
        assert_eq!(text, large().to_json(false).unwrap());
    }

    #[test]
    fn test_unoffered_coding_falls_back_to_identity() {
        let payload = large()
            .serialize_with_negotiation(&SerializeOptions::new(Some("br")))
            .unwrap();
        assert!(!payload.headers.contains_key(CONTENT_ENCODING));

        let payload = large()
            .serialize_with_negotiation(&SerializeOptions::new(Some("identity;q=0, *;q=0")))
            .unwrap();
        assert!(!payload.headers.contains_key(CONTENT_ENCODING));
    }

    #[test]
    fn test_empty_charset_omitted() {
        let options = SerializeOptions {
            charset: String::new(),
            ..SerializeOptions::default()
        };
        let payload = station().serialize_with_negotiation(&options).unwrap();
        assert_eq!(payload.headers[CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_deterministic_output() {
        let options = SerializeOptions::new(Some("gzip"));
        let a = large().serialize_with_negotiation(&options).unwrap();
        let b = large().serialize_with_negotiation(&options).unwrap();
        assert_eq!(a, b);
    }
}
