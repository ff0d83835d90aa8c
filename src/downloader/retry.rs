//! Bounded retry with exponential backoff for requests issued by the manager

use crate::utils::error::Result;
use reqwest::{RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub attempts: u32,
    /// Delay for the first retry; doubled on every further retry
    pub backoff_factor: Duration,
    /// Hard cap on a single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 5,
            backoff_factor: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// No retries at all
    pub fn none() -> Self {
        Self {
            attempts: 0,
            backoff_factor: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `attempt` (0-indexed)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let multiplier = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.backoff_factor
            .checked_mul(multiplier)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Gateway-class server errors worth retrying
pub fn is_retryable_status(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::INTERNAL_SERVER_ERROR
            | StatusCode::BAD_GATEWAY
            | StatusCode::SERVICE_UNAVAILABLE
            | StatusCode::GATEWAY_TIMEOUT
    )
}

fn is_retryable_error(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout()
}

/// Send the request produced by `build`, retrying on retryable statuses and
/// connection errors.
///
/// Once retries are exhausted the last response is returned as-is, so the
/// caller still sees the final status.
pub async fn send_with_retry<F>(policy: &RetryPolicy, mut build: F) -> Result<Response>
where
    F: FnMut() -> RequestBuilder,
{
    let mut attempt = 0;

    loop {
        match build().send().await {
            Ok(response) if is_retryable_status(response.status()) && attempt < policy.attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "Request returned {} (attempt {}), retrying in {:?}",
                    response.status(),
                    attempt + 1,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Ok(response) => {
                debug!("Request finished with {} after {} attempt(s)", response.status(), attempt + 1);
                return Ok(response);
            }
            Err(e) if is_retryable_error(&e) && attempt < policy.attempts => {
                let delay = policy.delay_for_attempt(attempt);
                warn!(
                    "Request failed (attempt {}): {}, retrying in {:?}",
                    attempt + 1,
                    e,
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
