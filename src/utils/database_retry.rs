//! Retry with exponential backoff for transient database failures
//!
//! SQLite reports write contention as "database is locked" or "database is
//! busy"; those and connection-level failures are retried, everything else
//! is returned on the first attempt.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::errors::{RepositoryError, RepositoryResult};
use crate::utils::jitter::generate_jitter_percent;

#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Add up to 25% random jitter to each delay
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Policy for detection saves: five attempts
    pub fn for_writes() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(3),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Run `operation` until it succeeds, fails with a non-retryable error, or
/// exhausts `config.max_attempts`
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    mut operation: F,
    operation_name: &str,
) -> RepositoryResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = RepositoryResult<T>>,
{
    let mut attempt = 1;
    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "Database operation '{}' succeeded on attempt {}/{}",
                        operation_name, attempt, config.max_attempts
                    );
                }
                return Ok(result);
            }
            Err(err) if !is_retryable_error(&err) => {
                debug!(
                    "Database operation '{}' failed with non-retryable error: {}",
                    operation_name, err
                );
                return Err(err);
            }
            Err(err) if attempt >= config.max_attempts => {
                warn!(
                    "Database operation '{}' failed after {} attempts: {}",
                    operation_name, config.max_attempts, err
                );
                return Err(err);
            }
            Err(err) => {
                let delay = calculate_delay(config, attempt);
                warn!(
                    "Database operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name, attempt, config.max_attempts, delay, err
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn is_transient_message(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("database is locked")
        || message.contains("database is busy")
        || message.contains("connection reset")
        || message.contains("timeout")
        || message.contains("timed out")
        || message.contains("pool closed")
}

fn is_retryable_error(error: &RepositoryError) -> bool {
    match error {
        RepositoryError::Database(db_err) => match db_err {
            sea_orm::DbErr::ConnectionAcquire(_) | sea_orm::DbErr::Conn(_) => true,
            other => is_transient_message(&other.to_string()),
        },
        RepositoryError::ConnectionFailed { .. } => true,
        RepositoryError::QueryFailed { message, .. } => is_transient_message(message),
        _ => false,
    }
}

fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponential_delay = config.initial_delay.as_millis() as f64
        * config.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);
    let delay_ms = exponential_delay.min(config.max_delay.as_millis() as f64) as u64;

    let final_delay = if config.jitter {
        delay_ms + generate_jitter_percent(delay_ms, 25)
    } else {
        delay_ms
    };
    Duration::from_millis(final_delay)
}
