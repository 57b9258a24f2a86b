//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Network call:
//!     → timeouts.rs (per-attempt deadline)
//!     → On failure: retries.rs (classify, back off, try again)
//!     → backoff.rs (exponential delay with optional jitter)
//! ```
//!
//! # Design Decisions
//! - Every attempt has a deadline
//! - Connect errors and timeouts are always retryable; statuses are configurable
//! - Non-retryable statuses return at once without spending retry budget
//! - Bounded attempts: never retries indefinitely

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use backoff::calculate_backoff;
pub use retries::{RetryOutcome, RetryPolicy, RetryingTransport};
pub use timeouts::with_timeout;
