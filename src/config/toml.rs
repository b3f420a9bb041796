//! TOML configuration file parsing.
//!
//! Defines the structure of the configuration file with serde.

use std::path::Path;

use serde::Deserialize;

use super::ConfigError;

/// Root configuration structure from TOML file.
///
/// All fields are optional to allow partial configuration
/// that can be merged with CLI arguments.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TomlConfig {
    /// Grafana connection section
    #[serde(default)]
    pub grafana: GrafanaSection,

    /// Request behavior section
    #[serde(default)]
    pub request: RequestSection,

    /// Cache section
    #[serde(default)]
    pub cache: CacheSection,
}

/// Grafana connection section.
#[derive(Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GrafanaSection {
    /// Grafana base URL
    pub url: Option<String>,

    /// API key or service account token
    pub api_key: Option<String>,

    /// Username for Basic auth
    pub username: Option<String>,

    /// Password for Basic auth
    pub password: Option<String>,
}

impl std::fmt::Debug for GrafanaSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrafanaSection")
            .field("url", &self.url)
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Request behavior section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RequestSection {
    /// Per-attempt timeout in milliseconds
    pub timeout_ms: Option<u64>,

    /// Maximum number of retries after the first attempt
    pub max_retries: Option<u32>,

    /// Base retry delay in milliseconds
    pub retry_delay_ms: Option<u64>,

    /// Log every request attempt and its outcome
    #[serde(default)]
    pub log_requests: bool,
}

/// Cache section.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSection {
    /// Time-to-live of the cached dashboard list in seconds
    pub dashboards_ttl_secs: Option<u64>,
}

impl TomlConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        Self::parse(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }
}

/// Generates a default configuration file with comments.
#[must_use]
pub fn default_config_template() -> String {
    r#"# grafana-ask Configuration File

[grafana]
# Grafana base URL (required, can be overridden by --url or GRAFANA_URL)
# url = "https://grafana.example.com"

# API key or service account token, sent as "Authorization: Bearer <key>"
# Takes precedence over username/password when set (GRAFANA_API_KEY)
# api_key = "glsa_..."

# Basic auth credentials, used when no API key is set
# (GRAFANA_USERNAME / GRAFANA_PASSWORD)
# username = "admin"
# password = "admin"

[request]
# Per-attempt timeout in milliseconds (default: 30000)
# timeout_ms = 30000

# Maximum number of retries after the first attempt (default: 3)
# Only network errors, timeouts, 5xx and 429 responses are retried
# max_retries = 3

# Base retry delay in milliseconds, doubled for each retry (default: 1000)
# retry_delay_ms = 1000

# Log every request attempt and its outcome (Authorization is redacted)
# log_requests = false

[cache]
# Time-to-live of the cached dashboard list in seconds (default: 300)
# dashboards_ttl_secs = 300
"#
    .to_string()
}
