//! Retry utilities with exponential backoff.
//!
//! Used for individual part PUTs: a part is retried on its own, without
//! restarting the rest of the upload.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Base delay for exponential backoff (doubles each attempt).
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(8),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Set the maximum number of retries.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Set the base delay for exponential backoff.
    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `attempt + 1` (zero-based).
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Result of a retry operation.
#[derive(Debug)]
pub enum RetryResult<T, E> {
    /// Operation succeeded.
    Success(T),
    /// Operation failed, either with a final error or after all retries.
    Failed { error: E, attempts: u32 },
}

impl<T, E> RetryResult<T, E> {
    /// Returns true if the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(self, RetryResult::Success(_))
    }

    /// Convert into a plain `Result`, dropping the attempt count.
    pub fn into_result(self) -> Result<T, E> {
        match self {
            RetryResult::Success(v) => Ok(v),
            RetryResult::Failed { error, .. } => Err(error),
        }
    }
}

/// Execute an async operation, retrying errors accepted by `should_retry`.
///
/// Errors rejected by `should_retry` end the loop immediately.
///
/// # Example
/// ```ignore
/// let config = RetryConfig::new("put_part_3").with_max_retries(3);
/// let result = retry_async(&config, ControlPlaneError::is_retryable, || async {
///     client.put_part(3, &url, body.clone()).await
/// }).await;
/// ```
pub async fn retry_async<F, Fut, T, E, P>(
    config: &RetryConfig,
    should_retry: P,
    operation: F,
) -> RetryResult<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return RetryResult::Success(value),
            Err(e) if attempt < config.max_retries && should_retry(&e) => {
                // The first retry waits `base_delay`.
                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                debug!(
                    "{} attempt {} failed, retrying in {:?}: {}",
                    config.operation_name, attempt, delay, e
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if attempt > 0 {
                    warn!(
                        "{} failed after {} attempts: {}",
                        config.operation_name,
                        attempt + 1,
                        e
                    );
                }
                return RetryResult::Failed {
                    error: e,
                    attempts: attempt + 1,
                };
            }
        }
    }
}
