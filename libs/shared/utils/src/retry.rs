use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_models::ApiError;

/// Errors that know whether repeating the failed call is worthwhile.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for ApiError {
    fn is_retryable(&self) -> bool {
        self.is_transient()
    }
}

/// Exponential backoff for backend calls that are safe to repeat.
///
/// Attempt `n` (counted from 1 after the first failure) waits
/// `base_delay * 2^n`, capped at [`RetryPolicy::MAX_DELAY`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl RetryPolicy {
    pub const MAX_DELAY: Duration = Duration::from_secs(30);

    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.retry_max_attempts,
            Duration::from_millis(config.retry_base_delay_ms),
        )
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(Self::MAX_DELAY)
    }

    pub async fn run<T, E, F, Fut>(&self, operation: &str, mut call: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Retryable + Display,
    {
        let mut attempt = 0;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!("{} succeeded after {} retries", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    attempt += 1;
                    if attempt >= self.max_attempts || !err.is_retryable() {
                        return Err(err);
                    }

                    let delay = self.delay_for(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}; retrying in {:?}",
                        operation, attempt, self.max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
