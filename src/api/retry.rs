//! Retry policy for API requests.

use std::time::Duration;

use super::{ApiError, ErrorKind};

/// Configuration for exponential backoff retry behavior.
///
/// Attempts are numbered from 0 (the initial attempt) to `max_retries`
/// inclusive. Before attempt `n > 0` the executor waits
/// `base_delay * 2^(n - 1)`. There is no jitter and no cap.
///
/// # Defaults
///
/// - `max_retries`: 3
/// - `base_delay`: 1 second
///
/// # Example
///
/// ```
/// use grafana_ask::api::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::new()
///     .with_max_retries(2)
///     .with_base_delay(Duration::from_millis(200));
///
/// assert_eq!(policy.delay_before_attempt(2), Duration::from_millis(400));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of retries after the initial attempt.
    ///
    /// A value of 0 means only the initial attempt is made.
    pub max_retries: u32,

    /// Delay before the first retry; doubled for each later retry.
    pub base_delay: Duration,
}

impl RetryPolicy {
    /// Default maximum retries.
    pub const DEFAULT_MAX_RETRIES: u32 = 3;

    /// Default base delay (1 second).
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

    /// Creates a new retry policy with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: Self::DEFAULT_MAX_RETRIES,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }

    /// A policy that never retries.
    #[must_use]
    pub const fn none() -> Self {
        Self::new().with_max_retries(0)
    }

    /// Sets the maximum number of retries.
    #[must_use]
    pub const fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the base delay.
    ///
    /// Zero delay is supported but creates a tight retry loop.
    #[must_use]
    pub const fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Returns the delay to wait before `attempt`.
    ///
    /// Attempt 0 has no delay. Saturates instead of overflowing.
    #[must_use]
    pub fn delay_before_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor)
    }

    /// Returns true if another attempt should follow the failed `attempt`.
    ///
    /// Never once `attempt >= max_retries`. Otherwise network faults and
    /// timeouts are retried, and HTTP failures are retried when the status
    /// is 5xx or 429. Every other failure is terminal.
    #[must_use]
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        if attempt >= self.max_retries {
            return false;
        }
        is_transient(error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns true if `error` describes a failure that may succeed on retry.
///
/// Independent of [`ErrorKind`] classification for HTTP failures: 429 is
/// classified [`ErrorKind::Unknown`] yet is transient.
#[must_use]
pub fn is_transient(error: &ApiError) -> bool {
    match error.kind() {
        ErrorKind::Network | ErrorKind::Timeout => true,
        _ => {
            let status = error.status();
            status >= 500 || status == http::StatusCode::TOO_MANY_REQUESTS.as_u16()
        }
    }
}
