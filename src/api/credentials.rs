//! Credential resolution and URL construction.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use http::HeaderValue;
use url::Url;

use super::{AUTHENTICATION_ENDPOINT, ApiError, ErrorKind, RequestError};

/// Connection settings for the API, sourced once at startup.
///
/// Values are kept raw; [`ApiSettings::resolve`] normalizes and validates
/// them per request. Blank strings are treated as absent.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ApiSettings {
    /// Base URL of the API
    pub base_url: String,
    /// API key or service account token, sent as a Bearer token
    pub api_key: Option<String>,
    /// Username for Basic auth
    pub username: Option<String>,
    /// Password for Basic auth
    pub password: Option<String>,
}

impl fmt::Debug for ApiSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiSettings")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// The authentication scheme chosen for a request.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    /// `Authorization: Bearer <token>`
    Bearer(String),
    /// `Authorization: Basic base64(username:password)`
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Self::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
        }
    }
}

impl Credentials {
    /// Picks a scheme from the configured values.
    ///
    /// A non-blank token wins. Otherwise both username and password must be
    /// non-blank.
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::missing_credentials`] when neither scheme is usable.
    pub fn select(
        api_key: Option<&str>,
        username: Option<&str>,
        password: Option<&str>,
    ) -> Result<Self, ApiError> {
        if let Some(token) = non_blank(api_key) {
            return Ok(Self::Bearer(token.to_string()));
        }

        match (non_blank(username), non_blank(password)) {
            (Some(username), Some(password)) => Ok(Self::Basic {
                username: username.to_string(),
                password: password.to_string(),
            }),
            _ => Err(ApiError::missing_credentials()),
        }
    }

    /// Formats the `Authorization` header value.
    ///
    /// # Errors
    ///
    /// Returns an authentication error if the value contains characters
    /// not allowed in a header.
    pub fn header_value(&self) -> Result<HeaderValue, ApiError> {
        let raw = match self {
            Self::Bearer(token) => format!("Bearer {token}"),
            Self::Basic { username, password } => {
                format!("Basic {}", STANDARD.encode(format!("{username}:{password}")))
            }
        };

        let mut value = HeaderValue::from_str(&raw).map_err(|e| {
            ApiError::new(
                ErrorKind::Authentication,
                http::StatusCode::UNAUTHORIZED.as_u16(),
                AUTHENTICATION_ENDPOINT,
                "Configured credentials contain characters not allowed in a header",
            )
            .with_source(e)
        })?;
        value.set_sensitive(true);
        Ok(value)
    }
}

/// The outcome of resolving [`ApiSettings`]: where to send requests and
/// how to authenticate them.
#[derive(Debug, Clone)]
pub struct ResolvedTarget {
    base_url: String,
    authorization: HeaderValue,
}

impl ResolvedTarget {
    /// The base URL, always ending in exactly one `/`.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// The `Authorization` header value.
    #[must_use]
    pub const fn authorization(&self) -> &HeaderValue {
        &self.authorization
    }

    /// Builds the full URL for `endpoint`.
    ///
    /// Leading slashes on the endpoint are dropped so the result has
    /// exactly one `/` between base and path.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::InvalidUrl`] if the joined string does not parse.
    pub fn url_for(&self, endpoint: &str) -> Result<Url, RequestError> {
        let joined = format!("{}{}", self.base_url, normalize_endpoint(endpoint));
        Url::parse(&joined).map_err(|e| RequestError::InvalidUrl {
            url: joined,
            reason: e.to_string(),
        })
    }
}

impl ApiSettings {
    /// Creates settings for `base_url` with no credentials.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the Basic auth username and password.
    #[must_use]
    pub fn with_basic_auth(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Resolves the base URL and the credentials.
    ///
    /// Side-effect free and cheap enough to call once per request.
    ///
    /// # Errors
    ///
    /// - [`RequestError::MissingBaseUrl`] if the base URL is blank
    /// - [`RequestError::InvalidUrl`] if it does not parse
    /// - [`RequestError::Api`] with [`ErrorKind::Authentication`] if no
    ///   credentials are usable
    pub fn resolve(&self) -> Result<ResolvedTarget, RequestError> {
        let base_url = normalize_base_url(&self.base_url).ok_or(RequestError::MissingBaseUrl)?;
        Url::parse(&base_url).map_err(|e| RequestError::InvalidUrl {
            url: base_url.clone(),
            reason: e.to_string(),
        })?;

        let credentials = Credentials::select(
            self.api_key.as_deref(),
            self.username.as_deref(),
            self.password.as_deref(),
        )?;

        Ok(ResolvedTarget {
            base_url,
            authorization: credentials.header_value()?,
        })
    }
}

/// Trims `raw` and ensures exactly one trailing slash.
///
/// Returns `None` when nothing remains after trimming.
#[must_use]
pub fn normalize_base_url(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return None;
    }
    Some(format!("{trimmed}/"))
}

/// Strips leading slashes from an endpoint path.
#[must_use]
pub fn normalize_endpoint(endpoint: &str) -> &str {
    endpoint.trim_start_matches('/')
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
