//! Resilient API request layer.
//!
//! This module provides types and traits for:
//! - Building HTTP requests ([`HttpRequest`]) and handling responses ([`HttpResponse`])
//! - Abstracting HTTP clients ([`HttpClient`]) with a production implementation ([`ReqwestClient`])
//! - Resolving the base URL and credentials ([`ApiSettings`], [`Credentials`])
//! - Executing requests with timeouts and retries ([`ApiClient`], [`RequestOptions`])
//! - Deciding when to retry ([`RetryPolicy`])
//! - Classifying failures ([`ApiError`], [`ErrorKind`])

mod client;
mod credentials;
mod error;
mod executor;
mod response;
mod retry;
mod transport;

#[cfg(test)]
mod executor_tests;

pub use client::ReqwestClient;
pub use credentials::{
    ApiSettings, Credentials, ResolvedTarget, normalize_base_url, normalize_endpoint,
};
pub use error::{ApiError, AUTHENTICATION_ENDPOINT, ErrorKind, HttpError, RequestError};
pub use executor::{ApiClient, REDACTED, RequestConfig, RequestOptions, redacted_headers};
pub use transport::{HttpClient, HttpRequest, HttpResponse};
pub use response::{ResponseBody, is_json_content_type};
pub use retry::{RetryPolicy, is_transient};
