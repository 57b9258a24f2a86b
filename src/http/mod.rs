//! Serving surface.
//!
//! # Data Flow
//! ```text
//! Incoming request
//!     → server.rs (Axum router, request ID, trace, timeout)
//!     → handler (client state, or cached upstream GET)
//!     → response.rs (negotiated payload → headers + body)
//!     → Send to client
//! ```

pub mod response;
pub mod server;

pub use response::{accept_encoding, negotiated_response, serve_negotiated};
pub use server::{AppState, HttpServer};
