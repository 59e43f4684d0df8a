//! Exponential backoff for requests to the bakery's website.

use std::time::Duration;

use reqwest::StatusCode;

/// Upper bound of a single backoff delay.
static MAX_BACKOFF: Duration = Duration::from_secs(120);

/// When and how long to wait before repeating a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// Delay before the first retry, doubled for every following one.
    pub backoff_factor: Duration,
    pub retry_statuses: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 7,
            backoff_factor: Duration::from_secs(1),
            retry_statuses: vec![429, 500, 503, 504],
        }
    }
}

impl RetryPolicy {
    /// A policy which gives up after the first attempt.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    pub fn should_retry_status(&self, status: StatusCode) -> bool {
        self.retry_statuses.contains(&status.as_u16())
    }

    pub fn should_retry_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect()
    }

    /// The delay before retry number `retry` (starting at 1).
    pub fn backoff(&self, retry: u32) -> Duration {
        let shift = retry.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(1u32 << shift)
            .min(MAX_BACKOFF)
    }

    pub(crate) async fn wait(&self, retry: u32) {
        let delay = self.backoff(retry);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}
