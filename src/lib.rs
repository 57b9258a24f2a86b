//! Client-side HTTP commons: content negotiation, a TTL response cache,
//! retries with exponential backoff, and negotiated serialization.
//!
//! # Architecture Overview
//!
//! ```text
//!   caller ──▶ client ──▶ cache (GET) ──hit──▶ response
//!                │           │ miss
//!                │           ▼
//!                └──────▶ resilience::retries ──▶ transport (reqwest)
//!
//!   Serializable ──▶ serialization ──▶ negotiation (parse, select, compress)
//!                          │
//!                          ▼
//!                   NegotiatedPayload ──▶ http::response (axum)
//! ```

// Core
pub mod cache;
pub mod client;
pub mod negotiation;
pub mod serialization;
pub mod transport;

// Cross-cutting concerns
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

// Serving surface
pub mod http;

pub use cache::{CacheKey, ResponseCache};
pub use client::{CachedHttpClient, ClientResponse, RequestOptions};
pub use config::schema::CommonsConfig;
pub use error::{HttpError, HttpResult, TransportFailure};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use negotiation::{NegotiationResult, PreferenceEntry, PreferenceList};
pub use resilience::RetryPolicy;
pub use serialization::{Content, NegotiatedPayload, Serializable, SerializeOptions};
