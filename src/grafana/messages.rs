//! User-facing failure messages.

use crate::api::{ErrorKind, RequestError};

/// Shown for authentication and authorization failures.
pub const CREDENTIALS_MESSAGE: &str =
    "Could not access Grafana. Please check the configured API key or username and password.";

/// Shown when the requested resource does not exist.
pub const NOT_FOUND_MESSAGE: &str = "The requested Grafana resource was not found.";

/// Shown for server-side failures.
pub const SERVER_MESSAGE: &str = "Grafana is having trouble right now. Please try again later.";

/// Shown for everything else.
pub const GENERIC_MESSAGE: &str = "Failed to get data from Grafana.";

/// Maps a failure to the text shown to the person who asked.
///
/// Only classified failures get a specific message.
#[must_use]
pub fn describe_failure(error: &RequestError) -> &'static str {
    match error.kind() {
        Some(ErrorKind::Authentication | ErrorKind::Authorization) => CREDENTIALS_MESSAGE,
        Some(ErrorKind::NotFound) => NOT_FOUND_MESSAGE,
        Some(ErrorKind::Server) => SERVER_MESSAGE,
        _ => GENERIC_MESSAGE,
    }
}
