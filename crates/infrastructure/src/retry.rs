//! Retry policy for outbound calls
//!
//! Repeats a fallible async operation straight away while its error reports
//! itself as transient, up to a fixed number of extra attempts.
//!
//! # Example
//!
//! ```rust,ignore
//! use infrastructure::retry::{RetryConfig, retry};
//!
//! let config = RetryConfig::immediate(3);
//! let place = retry(&config, || client.geocode("Paris")).await?;
//! ```

use std::future::Future;

use integration_weather::WeatherError;
use tracing::{debug, warn};

/// Attempt bound for [`retry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: u32,
}

impl RetryConfig {
    /// Retry straight away, at most `max_retries` times
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Upper bound on calls to the operation
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }
}

/// Errors that know whether another attempt could succeed
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for WeatherError {
    fn is_retryable(&self) -> bool {
        Self::is_retryable(self)
    }
}

/// Run `operation`, retrying transient failures per `config`
///
/// Non-retryable errors return immediately. After `max_retries` retries
/// the last error is returned.
pub async fn retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let mut attempts = 0u32;

    loop {
        attempts += 1;

        let err = match operation().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "Operation succeeded after retries");
                }
                return Ok(value);
            },
            Err(err) => err,
        };

        if !err.is_retryable() {
            debug!(attempts, error = %err, "Non-retryable failure");
            return Err(err);
        }
        if attempts >= config.max_attempts() {
            warn!(attempts, error = %err, "Giving up after max retries");
            return Err(err);
        }

        warn!(
            attempt = attempts,
            max_retries = config.max_retries,
            error = %err,
            "Transient failure, retrying"
        );
    }
}
