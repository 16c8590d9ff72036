//! HTTP fetch with retry on transient failures.
//!
//! Only failures that may clear up on their own (connect errors, timeouts,
//! 408, 429 and 5xx) are retried. A 404 or any other client error is returned
//! on the spot so a missing manifest is reported without waiting out the
//! backoff.

use reqwest::{Client, Response, StatusCode};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// Default number of fetch attempts (1 initial + 1 retry).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Default backoff between attempts in milliseconds.
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Configuration for [`fetch_with_retry`].
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts (minimum 1; 0 is treated as 1).
    pub max_attempts: u32,
    /// Sleep duration between consecutive attempts.
    pub backoff: Duration,
    /// Optional per-request timeout applied to each individual attempt.
    pub timeout: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Duration::from_millis(DEFAULT_BACKOFF_MS),
            timeout: None,
        }
    }
}

/// Why a fetch ultimately failed.
#[derive(Error, Debug)]
pub enum FetchError {
    /// 404 or 410 from the upstream.
    #[error("{url} not found ({status})")]
    NotFound { url: String, status: StatusCode },

    /// Still failing after every attempt with a retryable condition.
    #[error("{url} unavailable after {attempts} attempts: {reason}")]
    Transient {
        url: String,
        attempts: u32,
        reason: String,
    },

    /// Non-retryable failure (other 4xx, malformed request, body errors).
    #[error("{url}: {reason}")]
    Failed { url: String, reason: String },
}

/// Outcome of one attempt.
enum Attempt {
    Done(Response),
    Retry(String),
    Fatal(FetchError),
}

/// Fetch a URL via HTTP GET, retrying transient failures with backoff.
///
/// # Errors
///
/// [`FetchError::NotFound`] and [`FetchError::Failed`] are returned after the
/// first attempt that produces them; [`FetchError::Transient`] once all
/// attempts are exhausted.
pub async fn fetch_with_retry(
    client: &Client,
    url: &str,
    config: &RetryConfig,
) -> Result<Response, FetchError> {
    let max_attempts = config.max_attempts.max(1);
    let mut last_reason = String::new();

    for attempt in 1..=max_attempts {
        match try_once(client, url, config.timeout).await {
            Attempt::Done(response) => return Ok(response),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Retry(reason) => {
                warn!(
                    "HTTP fetch failed for {} (attempt {}/{}): {}",
                    url, attempt, max_attempts, reason
                );
                last_reason = reason;
            }
        }

        if attempt < max_attempts {
            warn!("Retrying HTTP fetch in {}ms...", config.backoff.as_millis());
            tokio::time::sleep(config.backoff).await;
        }
    }

    Err(FetchError::Transient {
        url: url.to_string(),
        attempts: max_attempts,
        reason: last_reason,
    })
}

async fn try_once(client: &Client, url: &str, timeout: Option<Duration>) -> Attempt {
    let mut request = client.get(url);
    if let Some(timeout) = timeout {
        request = request.timeout(timeout);
    }

    match request.send().await {
        Ok(response) if response.status().is_success() => Attempt::Done(response),
        Ok(response) => classify_status(url, response.status()),
        Err(e) if e.is_timeout() || e.is_connect() || e.is_request() => {
            Attempt::Retry(e.to_string())
        }
        Err(e) => Attempt::Fatal(FetchError::Failed {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn classify_status(url: &str, status: StatusCode) -> Attempt {
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        Attempt::Fatal(FetchError::NotFound {
            url: url.to_string(),
            status,
        })
    } else if is_retryable_status(status) {
        Attempt::Retry(format!("status {status}"))
    } else {
        Attempt::Fatal(FetchError::Failed {
            url: url.to_string(),
            reason: format!("status {status}"),
        })
    }
}

fn is_retryable_status(status: StatusCode) -> bool {
    status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
}
