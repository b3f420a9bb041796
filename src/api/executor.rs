//! Request executor: authenticated, timeout-bounded requests with retries.

use std::time::Duration;

use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::time::{Sleeper, TokioSleeper};

use super::credentials::ResolvedTarget;
use super::{
    ApiError, ApiSettings, HttpClient, HttpRequest, HttpResponse, RequestError, ResponseBody,
    RetryPolicy,
};

/// Per-request behavior: timeout, retries, and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestConfig {
    /// Time allowed for each attempt. Not cumulative across retries.
    pub timeout: Duration,
    /// Retry policy
    pub retry: RetryPolicy,
    /// Whether to log each attempt and outcome
    pub log_requests: bool,
}

impl RequestConfig {
    /// Default per-attempt timeout (30 seconds).
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

    /// Creates a config with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryPolicy::new(),
            log_requests: false,
        }
    }

    /// Sets the per-attempt timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Enables or disables request logging.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.log_requests = enabled;
        self
    }
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Describes one logical request.
///
/// `Authorization`, `Content-Type`, and `Accept` are always set by the
/// executor; caller headers with those names are replaced.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// HTTP method (default GET)
    pub method: Method,
    /// Extra headers
    pub headers: HeaderMap,
    /// Pre-serialized body
    pub body: Option<String>,
    /// Timeout, retry, and logging behavior
    pub config: RequestConfig,
}

impl RequestOptions {
    /// Creates a GET request with default config.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the HTTP method.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Adds a header.
    #[must_use]
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Sets the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Replaces the timeout, retry, and logging behavior.
    #[must_use]
    pub const fn with_config(mut self, config: RequestConfig) -> Self {
        self.config = config;
        self
    }
}

/// Resilient API client.
///
/// Resolves credentials, builds the request, and runs a strictly sequential
/// attempt loop with per-attempt timeouts and exponential backoff. Holds no
/// mutable state, so one instance can serve many concurrent calls.
///
/// # Type Parameters
///
/// - `H`: The HTTP client implementation
/// - `S`: The sleeper used for backoff delays (defaults to [`TokioSleeper`])
///
/// # Example
///
/// ```no_run
/// use grafana_ask::api::{ApiClient, ApiSettings, ReqwestClient};
///
/// # async fn example() -> Result<(), grafana_ask::api::RequestError> {
/// let settings = ApiSettings::new("https://grafana.example.com").with_api_key("token");
/// let client = ApiClient::new(ReqwestClient::new(), settings);
/// let health = client.get("/api/health").await?;
/// println!("{health:?}");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ApiClient<H, S = TokioSleeper> {
    client: H,
    sleeper: S,
    settings: ApiSettings,
    defaults: RequestConfig,
}

impl<H> ApiClient<H, TokioSleeper> {
    /// Creates a client with default request config and [`TokioSleeper`].
    #[must_use]
    pub fn new(client: H, settings: ApiSettings) -> Self {
        Self {
            client,
            sleeper: TokioSleeper,
            settings,
            defaults: RequestConfig::default(),
        }
    }
}

impl<H, S> ApiClient<H, S> {
    /// Sets a custom sleeper for backoff delays.
    #[must_use]
    pub fn with_sleeper<S2>(self, sleeper: S2) -> ApiClient<H, S2> {
        ApiClient {
            client: self.client,
            sleeper,
            settings: self.settings,
            defaults: self.defaults,
        }
    }

    /// Sets the config used by [`ApiClient::options`].
    #[must_use]
    pub const fn with_defaults(mut self, defaults: RequestConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Returns the connection settings.
    #[must_use]
    pub const fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    /// Returns the default request config.
    #[must_use]
    pub const fn defaults(&self) -> &RequestConfig {
        &self.defaults
    }

    /// Returns GET options carrying this client's default config.
    #[must_use]
    pub fn options(&self) -> RequestOptions {
        RequestOptions::new().with_config(self.defaults)
    }
}

impl<H: HttpClient, S: Sleeper> ApiClient<H, S> {
    /// Sends a GET request with the default config.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn get(&self, endpoint: &str) -> Result<ResponseBody, RequestError> {
        self.execute(endpoint, self.options()).await
    }

    /// Sends a POST request with a JSON body and the default config.
    ///
    /// # Errors
    ///
    /// See [`ApiClient::execute`].
    pub async fn post_json(
        &self,
        endpoint: &str,
        body: &serde_json::Value,
    ) -> Result<ResponseBody, RequestError> {
        let options = self
            .options()
            .with_method(Method::POST)
            .with_body(body.to_string());
        self.execute(endpoint, options).await
    }

    /// Executes a request against `endpoint`.
    ///
    /// # Errors
    ///
    /// - [`RequestError::InvalidEndpoint`] if `endpoint` is empty or only
    ///   whitespace; nothing else is attempted
    /// - [`RequestError::MissingBaseUrl`] / [`RequestError::InvalidUrl`] for
    ///   bad settings
    /// - [`RequestError::Api`] for missing credentials (before any network
    ///   call), and for the last failure once retries stop
    /// - [`RequestError::Decode`] if a success body is not valid JSON despite
    ///   a JSON content type; this is never retried
    pub async fn execute(
        &self,
        endpoint: &str,
        options: RequestOptions,
    ) -> Result<ResponseBody, RequestError> {
        if endpoint.trim().is_empty() {
            return Err(RequestError::InvalidEndpoint);
        }

        let target = self.settings.resolve()?;
        let request = build_request(&target, endpoint, &options)?;
        let config = options.config;

        let response = self.execute_with_retry(endpoint, &request, &config).await?;
        ResponseBody::decode(endpoint, &response)
    }

    async fn execute_with_retry(
        &self,
        endpoint: &str,
        request: &HttpRequest,
        config: &RequestConfig,
    ) -> Result<HttpResponse, ApiError> {
        let mut attempt = 0;

        loop {
            if attempt > 0 {
                let delay = config.retry.delay_before_attempt(attempt);
                if config.log_requests {
                    tracing::info!(
                        endpoint,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Waiting before retry"
                    );
                }
                self.sleeper.sleep(delay).await;
            }

            if config.log_requests {
                log_attempt(request, attempt);
            }

            let error = match self.execute_attempt(endpoint, request, config.timeout).await {
                Ok(response) => {
                    if config.log_requests {
                        tracing::info!(
                            endpoint,
                            attempt,
                            status = response.status.as_u16(),
                            "API request succeeded"
                        );
                    }
                    return Ok(response);
                }
                Err(e) => e,
            };

            let retrying = config.retry.should_retry(&error, attempt);
            if config.log_requests {
                tracing::warn!(
                    endpoint,
                    attempt,
                    status = error.status(),
                    kind = %error.kind(),
                    retrying,
                    "API request failed: {}",
                    error.message()
                );
            }

            if !retrying {
                return Err(error);
            }
            attempt += 1;
        }
    }

    /// Runs one attempt, bounded by `timeout`.
    ///
    /// When the timeout fires the transport future is dropped, which aborts
    /// the in-flight call.
    async fn execute_attempt(
        &self,
        endpoint: &str,
        request: &HttpRequest,
        timeout: Duration,
    ) -> Result<HttpResponse, ApiError> {
        let response = match tokio::time::timeout(timeout, self.client.request(request.clone()))
            .await
        {
            Err(elapsed) => return Err(ApiError::timeout(endpoint, timeout).with_source(elapsed)),
            Ok(Err(e)) => return Err(ApiError::from_transport(endpoint, e, timeout)),
            Ok(Ok(response)) => response,
        };

        if response.is_success() {
            return Ok(response);
        }

        Err(ApiError::from_response(
            endpoint,
            response.status,
            &response.body_text(),
        ))
    }
}

fn build_request(
    target: &ResolvedTarget,
    endpoint: &str,
    options: &RequestOptions,
) -> Result<HttpRequest, RequestError> {
    let url = target.url_for(endpoint)?;
    let mut request = HttpRequest::new(options.method.clone(), url);
    request.headers = options.headers.clone();

    let request = request
        .with_header(AUTHORIZATION, target.authorization().clone())
        .with_header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .with_header(ACCEPT, HeaderValue::from_static("application/json"));

    Ok(match &options.body {
        Some(body) => request.with_body(body.clone().into_bytes()),
        None => request,
    })
}

fn log_attempt(request: &HttpRequest, attempt: u32) {
    tracing::info!(
        method = %request.method,
        url = %request.url,
        attempt,
        headers = ?redacted_headers(&request.headers),
        "Sending API request"
    );
}

/// Value substituted for the `Authorization` header in logs.
pub const REDACTED: &str = "[REDACTED]";

/// Renders headers for logging with the `Authorization` value redacted.
#[must_use]
pub fn redacted_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let shown = if name.as_str().eq_ignore_ascii_case(AUTHORIZATION.as_str()) {
                REDACTED.to_string()
            } else {
                String::from_utf8_lossy(value.as_bytes()).into_owned()
            };
            (name.as_str().to_string(), shown)
        })
        .collect()
}
