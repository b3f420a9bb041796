//! Default values for configuration options.
//!
//! Request defaults are defined once by the api layer and re-exported here.

use std::time::Duration;

use crate::api::{RequestConfig, RetryPolicy};

/// Default per-attempt request timeout.
pub const TIMEOUT: Duration = RequestConfig::DEFAULT_TIMEOUT;

/// Default maximum number of retries after the first attempt.
pub const MAX_RETRIES: u32 = RetryPolicy::DEFAULT_MAX_RETRIES;

/// Default base retry delay.
pub const RETRY_DELAY: Duration = RetryPolicy::DEFAULT_BASE_DELAY;

/// Default time-to-live of the cached dashboard list in seconds.
pub const DASHBOARDS_TTL_SECS: u64 = 300;
