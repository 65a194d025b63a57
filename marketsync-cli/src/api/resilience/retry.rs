//! Retry policy for vendor calls

use log::{debug, warn};
use rand::Rng;
use std::fmt;
use std::future::Future;
use std::time::Duration;

/// Retry schedule
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Constant delay between a fixed number of attempts
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            max_delay: delay,
            backoff_multiplier: 1.0,
            jitter: false,
        }
    }

    /// Single attempt, no waiting
    pub fn disabled() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based)
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let millis = self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let mut millis = millis.min(self.max_delay.as_millis() as f64);

        if self.jitter && millis > 0.0 {
            millis *= rand::rng().random_range(0.5..=1.0);
        }

        Duration::from_millis(millis as u64)
    }
}

/// Error raised inside a retried call
#[derive(Debug)]
pub enum RetryableError {
    /// Response body was not the JSON we expected
    Decode(String),
    /// Anything else, never retried
    Fatal(anyhow::Error),
}

impl RetryableError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}

impl fmt::Display for RetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Decode(msg) => write!(f, "failed to decode response: {}", msg),
            Self::Fatal(err) => write!(f, "{:#}", err),
        }
    }
}

impl From<reqwest::Error> for RetryableError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Fatal(err.into())
        }
    }
}

/// Runs an async call until it succeeds, fails fatally, or runs out of attempts
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub async fn execute<T, F, Fut>(&self, operation: &str, mut call: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RetryableError>>,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < max_attempts => {
                    let delay = self.config.delay_for_attempt(attempt);
                    warn!(
                        "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                        operation, attempt, max_attempts, err, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(RetryableError::Fatal(err)) => {
                    return Err(err.context(format!("{} failed", operation)));
                }
                Err(err) => {
                    anyhow::bail!("{} failed after {} attempts: {}", operation, attempt, err);
                }
            }
        }
    }
}
