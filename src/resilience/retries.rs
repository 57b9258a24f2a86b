//! Bounded retry loop around a [`Transport`].
//!
//! # Responsibilities
//! - Run attempts until success, a permanent failure, or the attempt budget
//! - Classify statuses: 2xx success, configured codes retried, other 4xx/5xx final
//! - Sleep with exponential backoff between attempts
//!
//! # State Machine
//! ```text
//! ATTEMPT → SUCCESS
//!         → RETRYABLE_FAILURE → BACKOFF → ATTEMPT
//!         → PERMANENT_FAILURE
//!         → (budget spent) EXHAUSTED
//! ```

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use uuid::Uuid;

use crate::config::RetryConfig;
use crate::error::{body_preview, HttpError, HttpResult, TransportFailure};
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::resilience::timeouts::with_timeout;
use crate::transport::{OutboundRequest, Transport, TransportResponse};

/// Retry settings, fixed once the client is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    max_delay_ms: u64,
    retryable_status_codes: BTreeSet<u16>,
    jitter: bool,
}

impl RetryPolicy {
    /// Policy retrying every 5xx, with jitter. `max_attempts` is at least 1.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            max_delay_ms,
            retryable_status_codes: (500..=599).collect(),
            jitter: true,
        }
    }

    pub fn with_retryable_status_codes<I: IntoIterator<Item = u16>>(mut self, codes: I) -> Self {
        self.retryable_status_codes = codes.into_iter().collect();
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_attempts, config.base_delay_ms, config.max_delay_ms)
            .with_retryable_status_codes(config.retryable_status_codes.iter().copied())
            .with_jitter(config.jitter)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn max_delay_ms(&self) -> u64 {
        self.max_delay_ms
    }

    pub fn retryable_status_codes(&self) -> &BTreeSet<u16> {
        &self.retryable_status_codes
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_status_codes.contains(&status)
    }

    /// Delay to wait after failed attempt `attempt` (1-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt, self.base_delay_ms, self.max_delay_ms, self.jitter)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

/// A response together with the number of attempts it took.
#[derive(Debug, Clone)]
pub struct RetryOutcome {
    pub response: TransportResponse,
    pub attempts: u32,
}

/// Wraps a transport with the retry policy.
#[derive(Debug, Clone)]
pub struct RetryingTransport<T> {
    transport: T,
    policy: RetryPolicy,
    attempt_timeout: Option<Duration>,
}

impl<T> RetryingTransport<T> {
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> RetryingTransport<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self {
            transport,
            policy,
            attempt_timeout: None,
        }
    }

    /// Bound each attempt, independently of the transport's own timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Run the request through the retry loop.
    ///
    /// Returns the first 2xx (or 1xx/3xx) response. A status outside the
    /// retryable set fails at once; transient failures are retried until
    /// `max_attempts` and then surface as [`HttpError::RetriesExhausted`].
    pub async fn execute(&self, request: &OutboundRequest) -> HttpResult<RetryOutcome> {
        let start = Instant::now();
        let method = request.method.as_str().to_string();
        let result = self.run(request).await;

        match &result {
            Ok(outcome) => {
                metrics::record_request(&method, outcome.response.status, outcome.attempts, start)
            }
            Err(HttpError::Permanent { status, attempts, .. }) => {
                metrics::record_request(&method, *status, *attempts, start)
            }
            Err(e) => metrics::record_request(&method, 0, e.attempts().unwrap_or(0), start),
        }
        result
    }

    async fn run(&self, request: &OutboundRequest) -> HttpResult<RetryOutcome> {
        let request_id = Uuid::new_v4();
        let max_attempts = self.policy.max_attempts;
        let mut attempts = 0;

        loop {
            attempts += 1;
            tracing::debug!(
                request_id = %request_id,
                method = %request.method,
                url = %request.url,
                attempt = attempts,
                "http_request"
            );

            let result = match self.attempt_timeout {
                Some(deadline) => with_timeout(deadline, self.transport.send(request)).await,
                None => self.transport.send(request).await,
            };

            let failure = match result {
                Ok(response) if response.is_success() => {
                    tracing::debug!(
                        request_id = %request_id,
                        status = response.status,
                        attempt = attempts,
                        "http_success"
                    );
                    return Ok(RetryOutcome { response, attempts });
                }
                Ok(response) if self.policy.is_retryable_status(response.status) => {
                    TransportFailure::Status {
                        status: response.status,
                        body_preview: body_preview(&response.body),
                    }
                }
                Ok(response) if response.status >= 400 => {
                    tracing::warn!(
                        request_id = %request_id,
                        status = response.status,
                        attempt = attempts,
                        "http_client_error"
                    );
                    return Err(HttpError::Permanent {
                        status: response.status,
                        attempts,
                        body_preview: body_preview(&response.body),
                    });
                }
                Ok(response) => return Ok(RetryOutcome { response, attempts }),
                Err(TransportFailure::Protocol(message)) => {
                    tracing::error!(
                        request_id = %request_id,
                        attempt = attempts,
                        error = %message,
                        "http_protocol_error"
                    );
                    return Err(HttpError::Protocol { attempts, message });
                }
                Err(failure) => failure,
            };

            if attempts >= max_attempts {
                tracing::error!(
                    request_id = %request_id,
                    attempts,
                    error = %failure,
                    "http_max_retries"
                );
                return Err(HttpError::RetriesExhausted {
                    attempts,
                    last: failure,
                });
            }

            let backoff = self.policy.delay_for(attempts);
            metrics::record_retry(retry_reason(&failure));
            tracing::warn!(
                request_id = %request_id,
                attempt = attempts,
                retry_after = ?backoff,
                error = %failure,
                "http_retry"
            );
            tokio::time::sleep(backoff).await;
        }
    }
}

fn retry_reason(failure: &TransportFailure) -> &'static str {
    match failure {
        TransportFailure::Connect(_) => "connect",
        TransportFailure::Timeout(_) => "timeout",
        TransportFailure::Status { .. } => "status",
        TransportFailure::Protocol(_) => "protocol",
    }
}
