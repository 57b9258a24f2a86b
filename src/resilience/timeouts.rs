//! Timeout enforcement.
//!
//! # Responsibilities
//! - Bound every transport attempt with a deadline
//! - Map an elapsed deadline to a retryable timeout failure
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Dropping the timed-out future cancels the attempt; nothing is cached

use std::future::Future;
use std::time::Duration;

use tokio::time::timeout;

use crate::error::TransportFailure;

/// Run one attempt under a deadline.
pub async fn with_timeout<T, F>(deadline: Duration, attempt: F) -> Result<T, TransportFailure>
where
    F: Future<Output = Result<T, TransportFailure>>,
{
    match timeout(deadline, attempt).await {
        Ok(result) => result,
        Err(_) => Err(TransportFailure::Timeout(deadline)),
    }
}
