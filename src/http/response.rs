//! Axum response adapters.
//!
//! # Responsibilities
//! - Turn a [`NegotiatedPayload`] into a response carrying its Content-* headers
//! - Map [`HttpError`] onto a status code and a small JSON body
//! - Read `Accept-Encoding` from request headers without ever failing

use axum::body::Body;
use axum::http::header::{HeaderName, HeaderValue, ACCEPT_ENCODING, VARY};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::config::NegotiationConfig;
use crate::error::{HttpError, TransportFailure};
use crate::negotiation::parse_header_value;
use crate::serialization::{NegotiatedPayload, Serializable, SerializeOptions};

impl IntoResponse for NegotiatedPayload {
    fn into_response(self) -> Response {
        negotiated_response(self, StatusCode::OK)
    }
}

/// Build a response from a negotiated payload with the given status.
pub fn negotiated_response(payload: NegotiatedPayload, status: StatusCode) -> Response {
    let mut response = Response::new(Body::from(payload.content.into_bytes()));
    *response.status_mut() = status;

    let headers = response.headers_mut();
    for (name, value) in &payload.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = %name, "Dropping unrepresentable response header"),
        }
    }
    headers.insert(VARY, HeaderValue::from_static("accept-encoding"));
    response
}

/// Serialize `source` for a request with the given headers.
pub fn serve_negotiated<S: Serializable + ?Sized>(
    source: &S,
    request_headers: &HeaderMap,
    config: &NegotiationConfig,
) -> Response {
    let accept_encoding = accept_encoding(request_headers);
    let options = SerializeOptions::from_config(config, accept_encoding.as_deref());
    match source.serialize_with_negotiation(&options) {
        Ok(payload) => payload.into_response(),
        Err(e) => e.into_response(),
    }
}

/// The request's `Accept-Encoding`, or `None` when absent or not text.
pub fn accept_encoding(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(ACCEPT_ENCODING)?;
    match parse_header_value(value) {
        Ok(_) => value.to_str().ok().map(str::to_string),
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring unreadable Accept-Encoding");
            None
        }
    }
}

/// Status code a caller of the serving surface sees for an error.
pub fn error_status(error: &HttpError) -> StatusCode {
    match error {
        HttpError::NegotiationParse(_) | HttpError::InvalidUrl { .. } => StatusCode::BAD_REQUEST,
        HttpError::Permanent { status, .. } => {
            StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
        }
        HttpError::RetriesExhausted {
            last: TransportFailure::Timeout(_),
            ..
        } => StatusCode::GATEWAY_TIMEOUT,
        HttpError::RetriesExhausted { .. } | HttpError::Protocol { .. } | HttpError::Json(_) => {
            StatusCode::BAD_GATEWAY
        }
        HttpError::Compression(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = error_status(&self);
        let mut body = json!({ "error": self.to_string() });
        if let Some(attempts) = self.attempts() {
            body["attempts"] = json!(attempts);
        }
        (status, axum::Json(body)).into_response()
    }
}
