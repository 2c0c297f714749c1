//! Bounded retry with exponential backoff for model requests.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use thiserror::Error;

/// A non-2xx response from a model API.
#[derive(Debug, Error)]
#[error("{provider} API error ({status}): {body}")]
pub struct ApiError {
    pub provider: &'static str,
    pub status: StatusCode,
    pub body: String,
}

impl ApiError {
    pub fn new(provider: &'static str, status: StatusCode, body: String) -> Self {
        Self {
            provider,
            status,
            body,
        }
    }

    /// Client errors fail the same way on every attempt, except request
    /// timeouts and rate limits.
    pub fn is_retryable(&self) -> bool {
        !self.status.is_client_error()
            || self.status == StatusCode::REQUEST_TIMEOUT
            || self.status == StatusCode::TOO_MANY_REQUESTS
    }
}

/// Retry predicate for transport errors. Anything that isn't a
/// non-retryable `ApiError` (connection resets, timeouts, 5xx) is
/// retried.
pub fn is_transient(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ApiError>()
        .is_none_or(ApiError::is_retryable)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            initial_delay,
            max_delay,
        }
    }

    /// A single attempt, no retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }
}

/// Runs `operation` until it succeeds, `should_retry` rejects the error
/// or `policy.max_retries` retries have been used up. Returns the last
/// error in the latter two cases.
pub async fn with_retry<F, Fut, T, E, R>(
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: R,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    R: Fn(&E) -> bool,
{
    let mut retries = 0;
    let mut delay = policy.initial_delay;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if retries >= policy.max_retries || !should_retry(&e) => return Err(e),
            Err(e) => {
                retries += 1;
                tracing::warn!(
                    "Model request failed (retry {}/{}): {}. Waiting {:?}",
                    retries,
                    policy.max_retries,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(policy.max_delay);
            }
        }
    }
}
