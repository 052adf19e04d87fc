//! HTTP clients for the three upstream services.

pub mod lastfm;
pub mod lyrics;
pub mod spotify;

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use thiserror::Error;
use tokio::time::sleep;

pub const USER_AGENT: &str = "tastelog/0.1.0 ( listening history sync )";

#[derive(Debug, Error)]
pub enum ApiError {
    /// DNS, connect, timeout or body read failure
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{service} returned HTTP {status}")]
    Status { service: &'static str, status: u16 },

    #[error("could not decode {service} response: {reason}")]
    Decode {
        service: &'static str,
        reason: String,
    },

    /// The access token could not be renewed mid-run
    #[error(transparent)]
    Auth(#[from] spotify::AuthError),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

pub fn http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .map_err(ApiError::from)
}

// ---------------------------------------------------------------------------
// Rate-limit backoff
// ---------------------------------------------------------------------------

/// Retry schedule for 429/503 answers.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_retries: u32,
    pub initial: Duration,
    pub max_wait: Duration,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial: Duration::from_secs(2),
            max_wait: Duration::from_secs(60),
        }
    }
}

impl Backoff {
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    fn wait_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let doubled = self.initial.saturating_mul(2u32.saturating_pow(attempt));
        retry_after.unwrap_or(doubled).min(self.max_wait)
    }
}

fn is_rate_limited(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
}

fn retry_after(resp: &Response) -> Option<Duration> {
    resp.headers()
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Send a request, retrying while the provider answers 429/503.
///
/// Any other status is returned as-is for the caller to classify; once the
/// retries run out the last rate-limited response is returned too.
pub async fn send_with_backoff(
    build: impl Fn() -> RequestBuilder,
    backoff: &Backoff,
) -> Result<Response, ApiError> {
    let mut attempt = 0;
    loop {
        let resp = build().send().await?;
        let status = resp.status();
        if !is_rate_limited(status) || attempt >= backoff.max_retries {
            return Ok(resp);
        }

        let wait = backoff.wait_for(attempt, retry_after(&resp));
        tracing::warn!(
            status = status.as_u16(),
            wait_secs = wait.as_secs_f64(),
            attempt = attempt + 1,
            max = backoff.max_retries,
            "rate limited, backing off"
        );
        sleep(wait).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let backoff = Backoff {
            max_retries: 5,
            initial: Duration::from_secs(2),
            max_wait: Duration::from_secs(10),
        };
        assert_eq!(backoff.wait_for(0, None), Duration::from_secs(2));
        assert_eq!(backoff.wait_for(1, None), Duration::from_secs(4));
        assert_eq!(backoff.wait_for(2, None), Duration::from_secs(8));
        assert_eq!(backoff.wait_for(3, None), Duration::from_secs(10));
    }

    #[test]
    fn retry_after_header_wins() {
        let backoff = Backoff::default();
        assert_eq!(
            backoff.wait_for(0, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
    }

    #[test]
    fn only_429_and_503_are_retried() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_rate_limited(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_rate_limited(StatusCode::NOT_FOUND));
        assert!(!is_rate_limited(StatusCode::INTERNAL_SERVER_ERROR));
    }
}
