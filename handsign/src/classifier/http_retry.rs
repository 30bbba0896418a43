//! HTTP retry with exponential backoff for the remote inference endpoint.
//!
//! 5xx responses, 429 and network timeouts are retried. Other 4xx responses
//! are returned to the caller, since the endpoint reports request problems
//! (such as a shape mismatch) as a 400 with an `error` body.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::warn;

/// Retry count and backoff base
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the second attempt; doubles on each further attempt
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
        }
    }
}

impl RetryPolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Send an HTTP request with retry and exponential backoff.
///
/// Returns `Ok(Response)` for a success or a non-retriable client error, and
/// `Err(Error::Remote)` once retries are exhausted or the request cannot be sent.
///
/// Retry behavior:
/// - 429 (rate limited): backoff 2x base, 4x base, ...
/// - 5xx (server error): backoff 1x base, 2x base, ...
/// - Timeout/connect error: backoff 1x base, 2x base, ...
pub async fn send_with_retry<F>(
    client: &Client,
    build_request: F,
    policy: RetryPolicy,
    context: &str,
) -> crate::Result<Response>
where
    F: Fn(&Client) -> RequestBuilder,
{
    let mut last_failure = String::from("no attempts made");
    for attempt in 0..policy.max_retries {
        match build_request(client).send().await {
            Ok(resp) => {
                let status = resp.status();
                if status.is_success() {
                    return Ok(resp);
                } else if status == StatusCode::TOO_MANY_REQUESTS {
                    let delay = policy.delay(attempt + 1);
                    warn!("{}: rate limited (429), retrying in {:?}", context, delay);
                    last_failure = format!("status {}", status);
                    tokio::time::sleep(delay).await;
                } else if status.is_server_error() {
                    let delay = policy.delay(attempt);
                    warn!("{}: server error ({}), retrying in {:?}", context, status, delay);
                    last_failure = format!("status {}", status);
                    tokio::time::sleep(delay).await;
                } else {
                    warn!("{}: non-retriable response ({})", context, status);
                    return Ok(resp);
                }
            }
            Err(e) if e.is_timeout() || e.is_connect() => {
                let delay = policy.delay(attempt);
                warn!("{}: network error ({}), retrying in {:?}", context, e, delay);
                last_failure = e.to_string();
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                warn!("{}: request failed: {}", context, e);
                return Err(crate::Error::Remote(format!("{}: {}", context, e)));
            }
        }
    }

    warn!("{}: failed after {} retries", context, policy.max_retries);
    Err(crate::Error::Remote(format!(
        "{}: failed after {} retries ({})",
        context, policy.max_retries, last_failure
    )))
}
