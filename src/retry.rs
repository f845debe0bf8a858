//! Retry logic with exponential backoff
//!
//! Used by the AWS pricing source to ride out throttling while it loads the
//! initial snapshot. The selection core never retries.

use crate::error::{IsRetryable, Result, SimError};
use std::time::Duration;
use tracing::{info, warn};

/// Retry policy trait
#[allow(async_fn_in_trait)]
pub trait RetryPolicy: Send + Sync {
    /// Execute a function with retry logic
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<T>> + Send;
}

/// Exponential backoff retry policy
pub struct ExponentialBackoffPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    jitter_factor: f64,
}

impl ExponentialBackoffPolicy {
    /// Create a new exponential backoff policy
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(30),
            jitter_factor: 0.1,
        }
    }

    /// Policy for AWS pricing calls (5 attempts)
    pub fn for_cloud_api() -> Self {
        Self::new(5)
    }

    /// Override the first backoff delay
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    fn calculate_backoff(&self, attempt: u32) -> Duration {
        let exponential = self.initial_delay.as_millis() as f64 * 2f64.powi(attempt as i32);
        let delay_ms = exponential.min(self.max_delay.as_millis() as f64);

        let jitter = delay_ms * self.jitter_factor * fastrand::f64();
        Duration::from_millis((delay_ms + jitter) as u64)
    }
}

impl RetryPolicy for ExponentialBackoffPolicy {
    async fn execute_with_retry<F, Fut, T>(&self, f: F) -> Result<T>
    where
        F: Fn() -> Fut + Send + Sync,
        Fut: std::future::Future<Output = Result<T>> + Send,
    {
        let mut attempt = 0;
        loop {
            match f().await {
                Ok(result) => {
                    if attempt > 0 {
                        info!("Operation succeeded after {} retries", attempt);
                    }
                    return Ok(result);
                }
                Err(e) if !e.is_retryable() => {
                    warn!("Non-retryable error, aborting: {}", e);
                    return Err(e);
                }
                Err(e) if attempt + 1 >= self.max_attempts => {
                    warn!("Max retries ({}) reached", self.max_attempts);
                    return Err(SimError::Retryable {
                        attempt: attempt + 1,
                        max_attempts: self.max_attempts,
                        reason: e.to_string(),
                        source: Some(Box::new(e)),
                    });
                }
                Err(e) => {
                    let backoff = self.calculate_backoff(attempt);
                    warn!(
                        "Retryable error (attempt {}/{}), retrying in {:?}: {}",
                        attempt + 1,
                        self.max_attempts,
                        backoff,
                        e
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
            }
        }
    }
}
