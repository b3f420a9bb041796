//! Error types for API requests.
//!
//! Three layers, from the wire up:
//! - [`HttpError`]: what the transport reports for a single call.
//! - [`ApiError`]: the classified, immutable failure of a request, carrying
//!   status code, endpoint, message, [`ErrorKind`], and an optional cause.
//! - [`RequestError`]: everything [`ApiClient::execute`] can return,
//!   including the pre-network failures that never become an [`ApiError`].
//!
//! [`ApiClient::execute`]: super::ApiClient::execute

use std::fmt;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Endpoint marker used for credential failures raised before any request.
pub const AUTHENTICATION_ENDPOINT: &str = "authentication";

/// Error type for a single transport call.
///
/// Describes what went wrong without dictating recovery strategy.
#[derive(Debug, Error)]
pub enum HttpError {
    /// Network connection failed.
    ///
    /// This includes DNS resolution failures, connection refused,
    /// and other network-level errors.
    #[error("Connection error: {0}")]
    Connection(#[source] BoxError),

    /// The transport gave up waiting for the server.
    #[error("Request timed out")]
    Timeout,

    /// The provided URL is invalid.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Any other transport failure.
    #[error("Transport error: {0}")]
    Other(#[source] BoxError),
}

/// Message fragments that identify DNS or connection failures inside
/// otherwise opaque transport errors.
static NETWORK_FAULT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(dns error|failed to lookup address|name or service not known|no such host|connection (refused|reset|closed|aborted)|broken pipe|network is unreachable|host is unreachable|econnrefused|econnreset|enotfound|eai_again|fetch failed|error sending request)",
    )
    .expect("network fault pattern is a valid regex")
});

impl HttpError {
    /// Returns true if this error is a network-layer fault.
    ///
    /// [`HttpError::Connection`] always is. [`HttpError::Other`] is when any
    /// error in its source chain reads like a DNS or connection failure.
    #[must_use]
    pub fn is_network_fault(&self) -> bool {
        match self {
            Self::Connection(_) => true,
            Self::Other(source) => error_chain_text(source.as_ref())
                .iter()
                .any(|text| NETWORK_FAULT.is_match(text)),
            Self::Timeout | Self::InvalidUrl(_) => false,
        }
    }
}

fn error_chain_text(error: &(dyn std::error::Error + 'static)) -> Vec<String> {
    let mut texts = vec![error.to_string()];
    let mut current = error.source();
    while let Some(source) = current {
        texts.push(source.to_string());
        current = source.source();
    }
    texts
}

/// Classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Credentials are missing or were rejected (401).
    Authentication,
    /// Credentials lack permission for the resource (403).
    Authorization,
    /// The resource does not exist (404).
    NotFound,
    /// The request was rejected as malformed (400, 422).
    Validation,
    /// The server failed (5xx).
    Server,
    /// No response was received because of a network fault.
    Network,
    /// No response arrived within the configured timeout.
    Timeout,
    /// Anything else, including 429.
    Unknown,
}

impl ErrorKind {
    /// Classifies an HTTP failure status.
    #[must_use]
    pub fn from_status(status: http::StatusCode) -> Self {
        match status.as_u16() {
            401 => Self::Authentication,
            403 => Self::Authorization,
            404 => Self::NotFound,
            400 | 422 => Self::Validation,
            code if code >= 500 => Self::Server,
            _ => Self::Unknown,
        }
    }

    /// Returns the canonical upper-case name of this kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "AUTHENTICATION",
            Self::Authorization => "AUTHORIZATION",
            Self::NotFound => "NOT_FOUND",
            Self::Validation => "VALIDATION",
            Self::Server => "SERVER",
            Self::Network => "NETWORK",
            Self::Timeout => "TIMEOUT",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified request failure.
///
/// Built once where the failure is recognized and never mutated afterwards.
/// `status` is 0 when no HTTP response was received.
#[derive(Debug, Error)]
#[error("{kind} error from '{endpoint}' (status {status}): {message}")]
pub struct ApiError {
    status: u16,
    endpoint: String,
    message: String,
    kind: ErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl ApiError {
    /// Creates an error with no underlying cause.
    #[must_use]
    pub fn new(
        kind: ErrorKind,
        status: u16,
        endpoint: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            status,
            endpoint: endpoint.into(),
            message: message.into(),
            kind,
            source: None,
        }
    }

    /// Attaches an underlying cause for diagnostic chaining.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Builds an error from a non-success HTTP response.
    #[must_use]
    pub fn from_response(endpoint: &str, status: http::StatusCode, body: &str) -> Self {
        let reason = status.canonical_reason().unwrap_or("Unknown Status");
        let body = body.trim();
        let message = if body.is_empty() {
            format!("API request failed: {} {reason}", status.as_u16())
        } else {
            format!("API request failed: {} {reason}: {body}", status.as_u16())
        };

        Self::new(ErrorKind::from_status(status), status.as_u16(), endpoint, message)
    }

    /// Builds the error for an attempt that exceeded `timeout`.
    #[must_use]
    pub fn timeout(endpoint: &str, timeout: Duration) -> Self {
        Self::new(
            ErrorKind::Timeout,
            http::StatusCode::REQUEST_TIMEOUT.as_u16(),
            endpoint,
            format!("Request timed out after {}ms", timeout.as_millis()),
        )
    }

    /// Wraps a transport failure.
    ///
    /// Transport timeouts become [`ErrorKind::Timeout`] (408), network
    /// faults become [`ErrorKind::Network`] (0), everything else is
    /// [`ErrorKind::Unknown`] (0).
    #[must_use]
    pub fn from_transport(endpoint: &str, error: HttpError, timeout: Duration) -> Self {
        if matches!(error, HttpError::Timeout) {
            return Self::timeout(endpoint, timeout).with_source(error);
        }

        let (kind, prefix) = if error.is_network_fault() {
            (ErrorKind::Network, "Network error")
        } else {
            (ErrorKind::Unknown, "Request failed")
        };

        Self::new(kind, 0, endpoint, format!("{prefix}: {error}")).with_source(error)
    }

    /// The error raised when neither a token nor a username/password pair
    /// is configured.
    #[must_use]
    pub fn missing_credentials() -> Self {
        Self::new(
            ErrorKind::Authentication,
            http::StatusCode::UNAUTHORIZED.as_u16(),
            AUTHENTICATION_ENDPOINT,
            "No credentials configured: set an API key, or both a username and password",
        )
    }

    /// HTTP status code, or 0 when no response was received.
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Endpoint the failing request targeted.
    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Human-readable description.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Classification of the failure.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }
}

/// Error returned by [`ApiClient::execute`].
///
/// Only [`RequestError::Api`] carries a classified failure. The other
/// variants are raised before any network call, or when a successful
/// response cannot be decoded.
///
/// [`ApiClient::execute`]: super::ApiClient::execute
#[derive(Debug, Error)]
pub enum RequestError {
    /// The endpoint argument was empty.
    #[error("Endpoint must be a non-empty path")]
    InvalidEndpoint,

    /// No base URL is configured.
    #[error("Base URL is not configured")]
    MissingBaseUrl,

    /// The base URL, or the URL built from it, does not parse.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL string
        url: String,
        /// Parser message
        reason: String,
    },

    /// A classified request failure.
    #[error(transparent)]
    Api(#[from] ApiError),

    /// A success response whose body could not be decoded.
    #[error("Failed to decode response from '{endpoint}': {source}")]
    Decode {
        /// Endpoint that produced the body
        endpoint: String,
        /// Underlying JSON error
        #[source]
        source: serde_json::Error,
    },
}

impl RequestError {
    /// Returns the classified failure, if this is one.
    #[must_use]
    pub const fn as_api(&self) -> Option<&ApiError> {
        match self {
            Self::Api(e) => Some(e),
            _ => None,
        }
    }

    /// Returns the failure kind, if this is a classified failure.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        self.as_api().map(ApiError::kind)
    }
}
