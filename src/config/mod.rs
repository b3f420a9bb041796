//! Configuration layer for grafana-ask.
//!
//! This module provides:
//! - CLI argument parsing ([`Cli`], [`Command`])
//! - TOML configuration file parsing ([`TomlConfig`])
//! - Validated configuration ([`ValidatedConfig`])
//! - Configuration file generation ([`write_default_config`])
//! - Default values ([`defaults`])
//!
//! # Priority
//!
//! Configuration values are resolved with the following priority (highest to lowest):
//!
//! 1. **Explicit CLI arguments** - Values passed on the command line
//! 2. **Environment** - `GRAFANA_URL`, `GRAFANA_API_KEY`, `GRAFANA_USERNAME`,
//!    `GRAFANA_PASSWORD` (see [`env_var`]; read only by [`ValidatedConfig::load`]
//!    and [`ValidatedConfig::from_sources`])
//! 3. **TOML config file** - Values from the configuration file
//! 4. **Built-in defaults** - Hardcoded default values
//!
//! `url` has no default and is required. Credentials are merged field by
//! field, so a key from the environment and a username from the file can
//! coexist; the request executor then prefers the key.
//!
//! # Boolean Flag Semantics
//!
//! `--log-requests` uses OR semantics: if set in either CLI or TOML, the
//! result is `true`.
//!
//! # TOML-Only Options
//!
//! - `cache.dashboards_ttl_secs` (default: 300s)

mod cli;
pub mod defaults;
mod error;
mod toml;
mod validated;


pub use cli::{Cli, Command};
pub use error::{ConfigError, field};
pub use toml::{CacheSection, GrafanaSection, RequestSection, TomlConfig, default_config_template};
pub use validated::{ValidatedConfig, env_var, expand_tilde, write_default_config};
