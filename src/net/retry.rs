//! HTTP retry with status-code filtering.
//!
//! Retries on 429 and 5xx and on connect/timeout errors; never on other
//! client errors (401, 403, 404, 422 indicate auth/config problems, not
//! transience). A `Retry-After` header wins over the configured delay when
//! it is longer. Each provider carries its own delay vector — AISHub is
//! 1 request/minute, so its vector is [60, 120, 180].

use std::time::Duration;

use reqwest::{Response, StatusCode};

/// Errors surfaced by the retry wrapper.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP {status} from {url} (permanent)")]
    Permanent { status: StatusCode, url: String },
    #[error("HTTP {status} from {url} after {attempts} attempts")]
    RetriesExhausted {
        status: StatusCode,
        url: String,
        attempts: usize,
    },
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("response body error: {0}")]
    Body(String),
}

/// Per-provider retry policy.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Backoff delays in seconds; the length bounds the retry count.
    pub delays_secs: Vec<u64>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            delays_secs: vec![2, 5, 15],
        }
    }
}

impl RetryPolicy {
    /// Rate-limited providers (e.g. AISHub's 1 req/min) wait a full window.
    pub fn rate_limited() -> Self {
        Self {
            delays_secs: vec![60, 120, 180],
        }
    }

    pub fn attempts(&self) -> usize {
        self.delays_secs.len() + 1
    }

    /// Is this status worth retrying?
    pub fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    /// Delay before the next attempt: the configured backoff, raised to the
    /// `Retry-After` value when the server asks for more.
    pub fn delay_for(&self, attempt: usize, retry_after_secs: Option<u64>) -> Duration {
        let configured = self.delays_secs.get(attempt).copied().unwrap_or(0);
        let secs = match retry_after_secs {
            Some(header) => header.max(configured),
            None => configured,
        };
        Duration::from_secs(secs)
    }
}

fn retry_after_secs(response: &Response) -> Option<u64> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse()
        .ok()
}

/// Execute a request with automatic retry on transient failures.
///
/// `build` is called once per attempt (request builders are single-use).
pub async fn retry_request<F>(build: F, policy: &RetryPolicy) -> Result<Response, FetchError>
where
    F: Fn() -> reqwest::RequestBuilder,
{
    let mut last_status: Option<(StatusCode, String)> = None;

    for attempt in 0..policy.attempts() {
        let response = match build().send().await {
            Ok(response) => response,
            Err(e) => {
                // Connect/timeout errors are transient; anything else is not.
                if (e.is_connect() || e.is_timeout()) && attempt < policy.delays_secs.len() {
                    let delay = policy.delay_for(attempt, None);
                    tracing::warn!(
                        error = %e,
                        attempt = attempt + 1,
                        delay_secs = delay.as_secs(),
                        "transport error - retrying"
                    );
                    tokio::time::sleep(delay).await;
                    continue;
                }
                return Err(FetchError::Transport(e));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let url = response.url().to_string();
        if !RetryPolicy::is_retryable(status) {
            return Err(FetchError::Permanent { status, url });
        }
        if attempt >= policy.delays_secs.len() {
            return Err(FetchError::RetriesExhausted {
                status,
                url,
                attempts: policy.attempts(),
            });
        }

        let delay = policy.delay_for(attempt, retry_after_secs(&response));
        tracing::warn!(
            %status,
            url = %url,
            attempt = attempt + 1,
            delay_secs = delay.as_secs(),
            "retryable HTTP status - backing off"
        );
        last_status = Some((status, url));
        tokio::time::sleep(delay).await;
    }

    // Loop bounds make this unreachable in practice.
    let (status, url) = last_status.unwrap_or((StatusCode::INTERNAL_SERVER_ERROR, String::new()));
    Err(FetchError::RetriesExhausted {
        status,
        url,
        attempts: policy.attempts(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_statuses() {
        assert!(RetryPolicy::is_retryable(StatusCode::TOO_MANY_REQUESTS));
        assert!(RetryPolicy::is_retryable(StatusCode::INTERNAL_SERVER_ERROR));
        assert!(RetryPolicy::is_retryable(StatusCode::BAD_GATEWAY));
        assert!(RetryPolicy::is_retryable(StatusCode::SERVICE_UNAVAILABLE));
        assert!(RetryPolicy::is_retryable(StatusCode::GATEWAY_TIMEOUT));
        // Client errors are configuration problems, not transience.
        assert!(!RetryPolicy::is_retryable(StatusCode::UNAUTHORIZED));
        assert!(!RetryPolicy::is_retryable(StatusCode::FORBIDDEN));
        assert!(!RetryPolicy::is_retryable(StatusCode::NOT_FOUND));
        assert!(!RetryPolicy::is_retryable(StatusCode::UNPROCESSABLE_ENTITY));
    }

    #[test]
    fn test_retry_after_wins_when_longer() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(0, Some(30)), Duration::from_secs(30));
        assert_eq!(policy.delay_for(0, Some(1)), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2, None), Duration::from_secs(15));
    }

    #[test]
    fn test_rate_limited_vector() {
        let policy = RetryPolicy::rate_limited();
        assert_eq!(policy.delays_secs, vec![60, 120, 180]);
        assert_eq!(policy.attempts(), 4);
    }
}
