//! Blocking HTTP GET with retry, backoff and circuit breaker handling.
//!
//! Shared by the Yahoo and FRED providers. Status handling:
//! - 403 trips the breaker immediately (IP ban)
//! - 429 and other non-success statuses count as failures and are retried
//! - 401 is returned as `AuthenticationRequired` without retry
//! - 400/404 are returned as `SeriesNotFound` without retry

use super::circuit_breaker::CircuitBreaker;
use super::provider::DataError;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Retry policy for a provider.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Build the blocking client used by the remote providers.
pub fn build_client() -> Result<reqwest::blocking::Client, DataError> {
    reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(30))
        .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
        .build()
        .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))
}

/// GET `url` and decode the JSON body, retrying transient failures.
///
/// `key` only labels errors (ticker or series id).
pub fn get_json_with_retry<T: DeserializeOwned>(
    client: &reqwest::blocking::Client,
    breaker: &CircuitBreaker,
    policy: RetryPolicy,
    url: &str,
    key: &str,
) -> Result<T, DataError> {
    if !breaker.is_allowed() {
        return Err(DataError::CircuitBreakerTripped);
    }

    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.base_delay * 2u32.pow(attempt - 1);
            tracing::debug!(key, attempt, delay_ms = delay.as_millis() as u64, "retrying");
            std::thread::sleep(delay);
        }

        if !breaker.is_allowed() {
            return Err(DataError::CircuitBreakerTripped);
        }

        let resp = match client.get(url).send() {
            Ok(resp) => resp,
            Err(e) if e.is_connect() || e.is_timeout() => {
                last_error = Some(DataError::NetworkUnreachable(e.to_string()));
                continue;
            }
            Err(e) => return Err(DataError::NetworkUnreachable(e.to_string())),
        };

        let status = resp.status();

        if status == reqwest::StatusCode::FORBIDDEN {
            breaker.trip();
            return Err(DataError::CircuitBreakerTripped);
        }

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            breaker.record_failure();
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            last_error = Some(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
            continue;
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(DataError::AuthenticationRequired(format!(
                "provider rejected credentials for {key}"
            )));
        }

        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::BAD_REQUEST {
            return Err(DataError::SeriesNotFound {
                series: key.to_string(),
            });
        }

        if !status.is_success() {
            breaker.record_failure();
            last_error = Some(DataError::Other(format!("HTTP {status} for {key}")));
            continue;
        }

        let body: T = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {key}: {e}"))
        })?;
        breaker.record_success();
        return Ok(body);
    }

    Err(last_error.unwrap_or_else(|| DataError::Other("max retries exceeded".into())))
}
