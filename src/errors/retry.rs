use std::time::Duration;
use std::future::Future;

use super::classification::ErrorClassification;
use super::types::AuditError;
use tracing::warn;

/// Retry configuration for external fetches.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    /// Base delay for exponential backoff. Zero disables sleeping (tests).
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    pub fn with_max_retries(max_retries: u32, base_delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_millis(base_delay_ms),
            ..Default::default()
        }
    }
}

impl ErrorClassification {
    /// Calculate the retry delay for this error classification based on the
    /// current attempt number (0-indexed).
    ///
    /// - RateLimitError: base * (4 + 2 * attempt), capped at max_delay
    /// - Default: base * 2^attempt + random jitter (0-1 base), capped at max_delay
    pub fn retry_delay(&self, attempt: u32, config: &RetryConfig) -> Duration {
        let base = config.base_delay.as_secs_f64();
        if base == 0.0 {
            return Duration::ZERO;
        }
        let secs = match self.error_type {
            "RateLimitError" => base * (4.0 + 2.0 * attempt as f64),
            _ => {
                let jitter: f64 = rand::random::<f64>();
                base * (2.0_f64.powi(attempt as i32) + jitter)
            }
        };
        Duration::from_secs_f64(secs.min(config.max_delay.as_secs_f64()))
    }
}

/// Execute an async operation with retry logic.
///
/// Retries only if the error is classified as retryable and we haven't
/// exceeded max_retries.
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    config: &RetryConfig,
    mut factory: F,
) -> Result<T, AuditError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AuditError>>,
{
    let max_attempts = config.max_retries + 1;
    let mut last_error = None;

    for attempt in 0..max_attempts {
        match factory().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();

                if !classification.retryable || attempt + 1 >= max_attempts {
                    if !classification.retryable {
                        warn!(
                            operation = operation_name,
                            error_type = classification.error_type,
                            "Non-retryable error, failing immediately"
                        );
                    } else {
                        warn!(
                            operation = operation_name,
                            attempt = attempt + 1,
                            max = max_attempts,
                            "Max retries exhausted"
                        );
                    }
                    return Err(e);
                }

                let delay = classification.retry_delay(attempt, config);
                warn!(
                    operation = operation_name,
                    attempt = attempt + 1,
                    max = max_attempts,
                    error_type = classification.error_type,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying after error"
                );

                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| AuditError::Internal("Retry loop exited unexpectedly".into())))
}
