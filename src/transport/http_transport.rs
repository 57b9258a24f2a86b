//! `reqwest`-backed transport.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

use crate::error::TransportFailure;
use crate::transport::{OutboundRequest, Transport, TransportResponse};

/// Transport over a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    timeout: Duration,
}

impl ReqwestTransport {
    /// Build a transport with the given per-attempt timeout and User-Agent.
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self, TransportFailure> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(timeout)
            .build()
            .map_err(|e| TransportFailure::Protocol(e.to_string()))?;
        Ok(Self::from_client(client, timeout))
    }

    /// Wrap an existing client.
    pub fn from_client(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn classify(&self, error: reqwest::Error, deadline: Duration) -> TransportFailure {
        if error.is_timeout() {
            TransportFailure::Timeout(deadline)
        } else if error.is_connect() || error.is_request() {
            TransportFailure::Connect(error.to_string())
        } else {
            TransportFailure::Protocol(error.to_string())
        }
    }
}

impl Transport for ReqwestTransport {
    async fn send(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportFailure> {
        let deadline = request.timeout.unwrap_or(self.timeout);

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TransportFailure::Protocol(format!("header name '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TransportFailure::Protocol(format!("header value for '{name}': {e}")))?;
            headers.insert(name, value);
        }

        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .timeout(deadline);
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.classify(e, deadline))?;

        let status = response.status().as_u16();
        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.classify(e, deadline))?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}
