//! Response cache subsystem.
//!
//! # Data Flow
//! ```text
//! GET request
//!     → key.rs (METHOD + normalized URL + sorted query)
//!     → store.rs get (hit: serve, expired: evict + miss)
//!     → on miss: network call, then store.rs put (2xx only, after full body)
//! ```
//!
//! # Design Decisions
//! - Memory only, per client instance, no background sweeper
//! - Single mutex around the map; never held across an await point
//! - Bounded: least-recently-inserted eviction once `max_entries` is hit
//! - Expiry driven by an injectable [`Clock`] so tests control time

pub mod clock;
pub mod key;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use key::CacheKey;
pub use store::{CacheEntry, CacheStats, ResponseCache};
