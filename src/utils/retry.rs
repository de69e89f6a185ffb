//! Retry utilities with exponential backoff for resilient network calls.

use std::time::Duration;
use tokio::time::{sleep, timeout};

use crate::error::ConvertError;

/// Configuration for retry behavior
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,
    /// Initial delay between retries
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum total time to spend on the operation (including delays)
    pub max_total_time: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            max_total_time: Duration::from_secs(120),
        }
    }
}

/// Preset tuned for metadata API lookups (short, few retries)
pub fn api_retry_config() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(500),
        max_delay: Duration::from_secs(10),
        backoff_multiplier: 2.0,
        max_total_time: Duration::from_secs(45),
    }
}

/// Transient errors that should trigger a retry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransientError {
    /// Network connectivity issues
    Network,
    /// Server error (5xx)
    ServerError,
    /// Too many requests (429)
    TooManyRequests,
    /// Request timeout
    Timeout,
}

impl TransientError {
    /// Check if a reqwest error represents a transient error
    pub fn from_reqwest_error(err: &reqwest::Error) -> Option<Self> {
        if err.is_timeout() {
            return Some(TransientError::Timeout);
        }
        if err.is_connect() {
            return Some(TransientError::Network);
        }

        if let Some(status) = err.status() {
            if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                return Some(TransientError::TooManyRequests);
            }
            if status.is_server_error() {
                return Some(TransientError::ServerError);
            }
        }

        None
    }

    /// Check if a ConvertError represents a transient error
    pub fn from_convert_error(err: &ConvertError) -> Option<Self> {
        match err {
            ConvertError::Fetch(msg) => {
                let msg = msg.to_lowercase();
                if msg.contains("timeout") || msg.contains("timed out") {
                    Some(TransientError::Timeout)
                } else if msg.contains("429") || msg.contains("too many requests") {
                    Some(TransientError::TooManyRequests)
                } else if msg.contains("status: 5") || msg.contains("server error") {
                    Some(TransientError::ServerError)
                } else if msg.contains("status: 4") {
                    // Client errors will not improve on retry
                    None
                } else {
                    Some(TransientError::Network)
                }
            }
            _ => None,
        }
    }

    /// Get the recommended delay for this error
    pub fn recommended_delay(&self) -> Duration {
        match self {
            TransientError::TooManyRequests => Duration::from_secs(10),
            TransientError::ServerError => Duration::from_secs(2),
            TransientError::Timeout => Duration::from_secs(2),
            TransientError::Network => Duration::from_secs(1),
        }
    }
}

/// Execute an async operation with retry logic
///
/// Transient failures (network, timeout, 5xx, 429) are retried with
/// exponential backoff; everything else is returned immediately.
pub async fn with_retry<T, F, Fut>(config: RetryConfig, operation: F) -> Result<T, ConvertError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, ConvertError>>,
{
    let mut attempts = 0;
    let mut total_elapsed = Duration::ZERO;
    let mut operation = operation;

    loop {
        attempts += 1;

        match timeout(config.max_total_time, operation()).await {
            Ok(Ok(result)) => {
                if attempts > 1 {
                    tracing::info!(
                        "Operation succeeded on attempt {} after {} transient failures",
                        attempts,
                        attempts - 1
                    );
                }
                return Ok(result);
            }
            Ok(Err(error)) => {
                let Some(transient) = TransientError::from_convert_error(&error) else {
                    return Err(error);
                };

                let delay = if attempts == 1 {
                    config.initial_delay
                } else {
                    let exp_delay = config.initial_delay.as_secs_f64()
                        * config.backoff_multiplier.powf(attempts as f64 - 1.0);
                    Duration::from_secs_f64(exp_delay.min(config.max_delay.as_secs_f64()))
                };
                let delay = std::cmp::max(delay, transient.recommended_delay());

                total_elapsed += delay;
                if attempts >= config.max_attempts || total_elapsed >= config.max_total_time {
                    tracing::warn!(
                        "Operation failed after {} attempts (total elapsed: {:?}): {}",
                        attempts,
                        total_elapsed,
                        error
                    );
                    return Err(error);
                }

                tracing::debug!(
                    "Transient error on attempt {}: {:?}, retrying in {:?}",
                    attempts,
                    transient,
                    delay
                );
                sleep(delay).await;
            }
            Err(_) => {
                let error = ConvertError::Fetch("operation timed out".to_string());
                if attempts >= config.max_attempts {
                    return Err(error);
                }
                tracing::debug!("Operation timed out, attempt {}/{}", attempts, config.max_attempts);
                sleep(config.initial_delay).await;
            }
        }
    }
}
