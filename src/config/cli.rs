//! CLI argument parsing using clap.
//!
//! Defines the command-line interface with all options and subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// grafana-ask: query Grafana dashboards, datasources, and metrics
///
/// Talks to the Grafana HTTP API with retries, per-attempt timeouts, and
/// typed errors, and prints results as JSON.
#[derive(Debug, Parser)]
#[command(name = "grafana-ask")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,

    /// Grafana base URL [env: GRAFANA_URL]
    #[arg(long, global = true)]
    pub url: Option<String>,

    /// API key or service account token, sent as Bearer [env: GRAFANA_API_KEY]
    #[arg(long = "api-key", global = true)]
    pub api_key: Option<String>,

    /// Username for Basic auth, used when no API key is set [env: GRAFANA_USERNAME]
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// Password for Basic auth [env: GRAFANA_PASSWORD]
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Per-attempt timeout in milliseconds
    #[arg(long = "timeout-ms", global = true)]
    pub timeout_ms: Option<u64>,

    /// Maximum number of retries after the first attempt
    #[arg(long = "retry-max", global = true)]
    pub retry_max: Option<u32>,

    /// Base retry delay in milliseconds (doubled for each retry)
    #[arg(long = "retry-delay-ms", global = true)]
    pub retry_delay_ms: Option<u64>,

    /// Log every request attempt and its outcome
    #[arg(long = "log-requests", global = true)]
    pub log_requests: bool,

    /// Path to configuration file
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(long, short, global = true)]
    pub verbose: bool,
}

/// Subcommands for grafana-ask
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Generate a default configuration file
    Init {
        /// Output path for the configuration file
        #[arg(long, short, default_value = "grafana-ask.toml")]
        output: PathBuf,
    },

    /// Check Grafana server health
    Health,

    /// List dashboards, optionally filtered by title
    Dashboards {
        /// Title search query
        #[arg(long, short)]
        query: Option<String>,
    },

    /// Show a dashboard by UID or title
    Dashboard {
        /// Dashboard UID, or a title to look up
        target: String,
    },

    /// List datasources
    Datasources,

    /// Run an expression query against a datasource
    Query {
        /// Datasource UID
        #[arg(long, short)]
        datasource: String,

        /// Query expression, e.g. `PromQL`
        #[arg(long, short)]
        expr: String,

        /// Range start
        #[arg(long, default_value = "now-1h")]
        from: String,

        /// Range end
        #[arg(long, default_value = "now")]
        to: String,
    },

    /// Send a raw request to an API endpoint
    Request {
        /// Endpoint path relative to the base URL, e.g. `api/search`
        endpoint: String,

        /// HTTP method
        #[arg(long, short = 'X', default_value = "GET")]
        method: String,

        /// Request body (sent as JSON)
        #[arg(long, short)]
        body: Option<String>,
    },
}

impl Cli {
    /// Parses CLI arguments from the command line.
    #[must_use]
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Parses CLI arguments from an iterator (useful for testing).
    pub fn parse_from_iter<I, T>(iter: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::parse_from(iter)
    }

    /// Parses CLI arguments from an iterator, returning parse errors.
    ///
    /// # Errors
    ///
    /// Returns the clap error for invalid arguments.
    pub fn try_parse_from_iter<I, T>(iter: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<std::ffi::OsString> + Clone,
    {
        Self::try_parse_from(iter)
    }

    /// Returns true if this is the init command.
    #[must_use]
    pub const fn is_init(&self) -> bool {
        matches!(self.command, Command::Init { .. })
    }
}
