//! Application execution logic.
//!
//! This module builds the Grafana client from validated config, runs one
//! subcommand, and renders its result as JSON.

use http::Method;
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

use grafana_ask::api::{ApiClient, ErrorKind, HttpClient, ReqwestClient, RequestError};
use grafana_ask::config::{Command, ValidatedConfig};
use grafana_ask::grafana::{
    DashboardResponse, DashboardSummary, DataQueryRequest, GrafanaClient, TtlCache,
};
use grafana_ask::time::{Clock, Sleeper};

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;

/// Error type for runtime execution failures.
#[derive(Debug, Error)]
pub enum RunError {
    /// A Grafana request failed.
    #[error(transparent)]
    Request(#[from] RequestError),

    /// No dashboard matched the UID or title.
    #[error("Dashboard '{0}' not found by UID or title")]
    DashboardNotFound(String),

    /// The `request` subcommand got an unusable method.
    #[error("Invalid HTTP method '{0}'")]
    InvalidMethod(String),

    /// The `request` subcommand got a body that is not JSON.
    #[error("Request body is not valid JSON: {0}")]
    InvalidBody(#[source] serde_json::Error),

    /// The result could not be rendered.
    #[error("Failed to render output: {0}")]
    Output(#[source] serde_json::Error),

    /// The subcommand does not talk to Grafana.
    #[error("Command does not run against Grafana")]
    NotRunnable,
}

impl RunError {
    /// Returns the request failure, if that is what this is.
    #[must_use]
    pub const fn request_error(&self) -> Option<&RequestError> {
        match self {
            Self::Request(e) => Some(e),
            _ => None,
        }
    }
}

/// Runs `command` against the configured Grafana and returns pretty JSON.
///
/// # Errors
///
/// Returns an error if the request fails, the lookup finds nothing, or the
/// command arguments are unusable.
///
/// # Coverage Note
///
/// This function is excluded from coverage because it requires a real
/// Grafana server; the dispatch logic is tested separately.
#[cfg(not(tarpaulin_include))]
pub async fn execute(command: &Command, config: ValidatedConfig) -> Result<String, RunError> {
    let api = ApiClient::new(ReqwestClient::new(), config.settings).with_defaults(config.request);
    let grafana = GrafanaClient::new(api);
    let cache = TtlCache::new(config.dashboards_ttl);

    let output = dispatch(&grafana, &cache, command).await?;
    serde_json::to_string_pretty(&output).map_err(RunError::Output)
}

/// Runs one subcommand and returns its result as JSON.
async fn dispatch<H: HttpClient, S: Sleeper>(
    grafana: &GrafanaClient<H, S>,
    cache: &TtlCache<Vec<DashboardSummary>, impl Clock>,
    command: &Command,
) -> Result<Value, RunError> {
    match command {
        Command::Init { .. } => Err(RunError::NotRunnable),
        Command::Health => to_json(&grafana.health().await?),
        Command::Dashboards { query } => {
            to_json(&grafana.search_dashboards(query.as_deref()).await?)
        }
        Command::Dashboard { target } => {
            let response = resolve_dashboard(grafana, cache, target).await?;
            Ok(dashboard_overview(&response))
        }
        Command::Datasources => to_json(&grafana.datasources().await?),
        Command::Query {
            datasource,
            expr,
            from,
            to,
        } => {
            let request = DataQueryRequest::new(from, to).with_expression(datasource, expr);
            Ok(grafana.query(&request).await?)
        }
        Command::Request {
            endpoint,
            method,
            body,
        } => raw_request(grafana, endpoint, method, body.as_deref()).await,
    }
}

/// Fetches a dashboard by UID, falling back to a title lookup when the UID
/// is unknown.
async fn resolve_dashboard<H: HttpClient, S: Sleeper>(
    grafana: &GrafanaClient<H, S>,
    cache: &TtlCache<Vec<DashboardSummary>, impl Clock>,
    target: &str,
) -> Result<DashboardResponse, RunError> {
    match grafana.dashboard(target).await {
        Ok(response) => Ok(response),
        Err(e) if e.kind() == Some(ErrorKind::NotFound) => {
            tracing::debug!("No dashboard with UID '{target}', searching by title");
            let summary = grafana
                .find_dashboard(cache, target)
                .await?
                .ok_or_else(|| RunError::DashboardNotFound(target.to_string()))?;
            Ok(grafana.dashboard(&summary.uid).await?)
        }
        Err(e) => Err(e.into()),
    }
}

fn dashboard_overview(response: &DashboardResponse) -> Value {
    let dashboard = &response.dashboard;
    let panels: Vec<Value> = dashboard
        .all_panels()
        .into_iter()
        .map(|panel| {
            json!({
                "id": panel.id,
                "title": panel.title,
                "type": panel.kind,
                "datasource": panel.datasource_uid(),
                "targets": panel.targets.len(),
            })
        })
        .collect();

    json!({
        "uid": dashboard.uid,
        "title": dashboard.title,
        "tags": dashboard.tags,
        "folder": response.meta.get("folderTitle"),
        "panels": panels,
    })
}

async fn raw_request<H: HttpClient, S: Sleeper>(
    grafana: &GrafanaClient<H, S>,
    endpoint: &str,
    method: &str,
    body: Option<&str>,
) -> Result<Value, RunError> {
    let method = Method::from_bytes(method.trim().to_uppercase().as_bytes())
        .map_err(|_| RunError::InvalidMethod(method.to_string()))?;

    let mut options = grafana.api().options().with_method(method);
    if let Some(body) = body {
        serde_json::from_str::<Value>(body).map_err(RunError::InvalidBody)?;
        options = options.with_body(body);
    }

    let response = grafana.api().execute(endpoint, options).await?;
    Ok(response.into_json())
}

fn to_json(value: &impl Serialize) -> Result<Value, RunError> {
    serde_json::to_value(value).map_err(RunError::Output)
}
