//! Validated configuration after merging CLI, environment, and TOML sources.
//!
//! This module contains the final, validated configuration that is used
//! by the application. All validation is performed during construction.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use url::Url;

use crate::api::{ApiSettings, RequestConfig, RetryPolicy, normalize_base_url};

use super::cli::Cli;
use super::defaults;
use super::error::{ConfigError, field};
use super::toml::TomlConfig;

/// Environment variables consulted for connection settings.
pub mod env_var {
    /// Grafana base URL
    pub const URL: &str = "GRAFANA_URL";
    /// API key or service account token
    pub const API_KEY: &str = "GRAFANA_API_KEY";
    /// Basic auth username
    pub const USERNAME: &str = "GRAFANA_USERNAME";
    /// Basic auth password
    pub const PASSWORD: &str = "GRAFANA_PASSWORD";
}

/// Connection settings read from the environment. Blank values count as unset.
struct EnvSettings {
    url: Option<String>,
    api_key: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl EnvSettings {
    fn read(env: impl Fn(&str) -> Option<String>) -> Self {
        let lookup = |name: &str| env(name).filter(|value: &String| !value.trim().is_empty());
        Self {
            url: lookup(env_var::URL),
            api_key: lookup(env_var::API_KEY),
            username: lookup(env_var::USERNAME),
            password: lookup(env_var::PASSWORD),
        }
    }
}

/// Fully validated configuration ready for use by the application.
///
/// # Construction
///
/// Use [`ValidatedConfig::from_raw`] to create from CLI args and optional TOML config,
/// or [`ValidatedConfig::from_sources`] to also take connection settings from
/// an environment lookup.
/// Both validate all inputs and return errors for invalid configurations.
///
/// Credentials are carried as given. Their absence is reported by the
/// request executor as an authentication error, not here.
#[derive(Debug, Clone)]
pub struct ValidatedConfig {
    /// Base URL and credentials
    pub settings: ApiSettings,

    /// Default timeout, retry, and logging behavior for every request
    pub request: RequestConfig,

    /// Time-to-live of the cached dashboard list
    pub dashboards_ttl: Duration,

    /// Verbose logging enabled
    pub verbose: bool,
}

impl fmt::Display for ValidatedConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config {{ url: {}, auth: {}, timeout: {}ms, retry: {}x/{}ms, log_requests: {}, \
             dashboards_ttl: {}s }}",
            self.settings.base_url,
            self.auth_scheme(),
            self.request.timeout.as_millis(),
            self.request.retry.max_retries,
            self.request.retry.base_delay.as_millis(),
            self.request.log_requests,
            self.dashboards_ttl.as_secs(),
        )
    }
}

impl ValidatedConfig {
    /// Creates a validated configuration from CLI arguments and optional TOML config.
    ///
    /// CLI arguments take precedence over TOML config values, which take
    /// precedence over defaults. The environment is not consulted.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The URL is missing, does not parse, or is not http/https
    /// - The timeout or the dashboard TTL is zero
    pub fn from_raw(cli: &Cli, toml: Option<&TomlConfig>) -> Result<Self, ConfigError> {
        Self::from_sources(cli, |_| None, toml)
    }

    /// Creates a validated configuration from CLI arguments, an environment
    /// lookup, and optional TOML config.
    ///
    /// `env` is called with the names in [`env_var`]. Its values rank between
    /// explicit CLI arguments and the TOML file.
    ///
    /// # Errors
    ///
    /// Same as [`ValidatedConfig::from_raw`].
    pub fn from_sources(
        cli: &Cli,
        env: impl Fn(&str) -> Option<String>,
        toml: Option<&TomlConfig>,
    ) -> Result<Self, ConfigError> {
        let env = EnvSettings::read(env);
        let base_url = Self::resolve_url(cli, &env, toml)?;
        let settings = Self::resolve_settings(cli, env, toml, base_url);
        let request = Self::build_request_config(cli, toml)?;
        let dashboards_ttl = Self::resolve_dashboards_ttl(toml)?;

        Ok(Self {
            settings,
            request,
            dashboards_ttl,
            verbose: cli.verbose,
        })
    }

    /// Loads and merges configuration from CLI, the process environment, and
    /// optional config file.
    ///
    /// If `cli.config` is set, loads the TOML file from that path. A leading
    /// `~` is expanded to the home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The config file cannot be read or parsed
    /// - The merged configuration is invalid
    pub fn load(cli: &Cli) -> Result<Self, ConfigError> {
        Self::load_with_env(cli, |name| std::env::var(name).ok())
    }

    /// Like [`ValidatedConfig::load`], with an explicit environment lookup.
    ///
    /// # Errors
    ///
    /// Same as [`ValidatedConfig::load`].
    pub fn load_with_env(
        cli: &Cli,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let toml = if let Some(ref path) = cli.config {
            Some(TomlConfig::load(&expand_tilde(path))?)
        } else {
            None
        };

        Self::from_sources(cli, env, toml.as_ref())
    }

    /// Names the authentication scheme the settings will resolve to.
    #[must_use]
    pub fn auth_scheme(&self) -> &'static str {
        let present = |v: Option<&String>| v.is_some_and(|s| !s.trim().is_empty());
        if present(self.settings.api_key.as_ref()) {
            "bearer"
        } else if present(self.settings.username.as_ref()) && present(self.settings.password.as_ref())
        {
            "basic"
        } else {
            "none"
        }
    }

    fn resolve_url(
        cli: &Cli,
        env: &EnvSettings,
        toml: Option<&TomlConfig>,
    ) -> Result<String, ConfigError> {
        // CLI > env > TOML
        let url_str = cli
            .url
            .as_deref()
            .or(env.url.as_deref())
            .or_else(|| toml.and_then(|t| t.grafana.url.as_deref()))
            .and_then(normalize_base_url)
            .ok_or_else(|| {
                ConfigError::missing(
                    field::URL,
                    "Use --url, set GRAFANA_URL, or set grafana.url in config file",
                )
            })?;

        let url = Url::parse(&url_str).map_err(|e| ConfigError::InvalidUrl {
            url: url_str.clone(),
            reason: e.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidUrl {
                url: url_str,
                reason: format!("unsupported scheme '{}', expected http or https", url.scheme()),
            });
        }

        Ok(url_str)
    }

    fn resolve_settings(
        cli: &Cli,
        env: EnvSettings,
        toml: Option<&TomlConfig>,
        base_url: String,
    ) -> ApiSettings {
        let grafana = toml.map(|t| &t.grafana);

        ApiSettings {
            base_url,
            api_key: cli
                .api_key
                .clone()
                .or(env.api_key)
                .or_else(|| grafana.and_then(|g| g.api_key.clone())),
            username: cli
                .username
                .clone()
                .or(env.username)
                .or_else(|| grafana.and_then(|g| g.username.clone())),
            password: cli
                .password
                .clone()
                .or(env.password)
                .or_else(|| grafana.and_then(|g| g.password.clone())),
        }
    }

    fn build_request_config(
        cli: &Cli,
        toml: Option<&TomlConfig>,
    ) -> Result<RequestConfig, ConfigError> {
        let request = toml.map(|t| &t.request);

        // Priority: CLI explicit > TOML > default
        let timeout = cli
            .timeout_ms
            .or_else(|| request.and_then(|r| r.timeout_ms))
            .map_or(defaults::TIMEOUT, Duration::from_millis);

        if timeout.is_zero() {
            return Err(ConfigError::InvalidDuration {
                field: field::TIMEOUT,
                reason: "must be greater than 0".to_string(),
            });
        }

        let max_retries = cli
            .retry_max
            .or_else(|| request.and_then(|r| r.max_retries))
            .unwrap_or(defaults::MAX_RETRIES);

        let retry_delay = cli
            .retry_delay_ms
            .or_else(|| request.and_then(|r| r.retry_delay_ms))
            .map_or(defaults::RETRY_DELAY, Duration::from_millis);

        let log_requests = cli.log_requests || request.is_some_and(|r| r.log_requests);

        Ok(RequestConfig::new()
            .with_timeout(timeout)
            .with_retry(
                RetryPolicy::new()
                    .with_max_retries(max_retries)
                    .with_base_delay(retry_delay),
            )
            .with_logging(log_requests))
    }

    fn resolve_dashboards_ttl(toml: Option<&TomlConfig>) -> Result<Duration, ConfigError> {
        let seconds = toml
            .and_then(|t| t.cache.dashboards_ttl_secs)
            .unwrap_or(defaults::DASHBOARDS_TTL_SECS);

        if seconds == 0 {
            return Err(ConfigError::InvalidDuration {
                field: field::DASHBOARDS_TTL,
                reason: "must be greater than 0".to_string(),
            });
        }

        Ok(Duration::from_secs(seconds))
    }
}

/// Writes the default configuration template to a file.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    let template = super::toml::default_config_template();
    std::fs::write(path, template).map_err(|e| ConfigError::FileWrite {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Expands a leading `~` to the home directory.
///
/// Paths without a leading `~`, or with no known home directory, are
/// returned unchanged.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Ok(rest) = path.strip_prefix("~") else {
        return path.to_path_buf();
    };

    dirs::home_dir().map_or_else(|| path.to_path_buf(), |home| home.join(rest))
}
