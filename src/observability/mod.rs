//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! cache, retry loop, client, serializer
//!     → logging.rs (structured tracing events: cache_hit, http_request, ...)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!
//! Consumers:
//!     → stdout (JSON or human-readable)
//!     → Prometheus scrape endpoint (optional, installed by the binary)
//! ```
//!
//! # Design Decisions
//! - Library code only emits; installing subscribers/recorders is the binary's job
//! - Without an installed recorder metric calls are no-ops

pub mod logging;
pub mod metrics;
