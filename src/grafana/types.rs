//! Grafana API payloads.

use serde::{Deserialize, Serialize};

/// One hit from `api/search`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSummary {
    /// Dashboard UID
    pub uid: String,
    /// Dashboard title
    pub title: String,
    /// Relative URL of the dashboard in the Grafana UI
    #[serde(default)]
    pub url: String,
    /// Title of the containing folder
    #[serde(default)]
    pub folder_title: Option<String>,
    /// Dashboard tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// One entry from `api/datasources`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Datasource {
    /// Datasource UID
    pub uid: String,
    /// Display name
    pub name: String,
    /// Plugin type, e.g. `prometheus`
    #[serde(rename = "type")]
    pub kind: String,
    /// Upstream URL, when exposed
    #[serde(default)]
    pub url: String,
    /// Whether this is the organization default
    #[serde(default)]
    pub is_default: bool,
}

/// Response of `api/dashboards/uid/{uid}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardResponse {
    /// The dashboard model
    pub dashboard: Dashboard,
    /// Grafana metadata (folder, permissions, ...), kept opaque
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// A dashboard model, reduced to what panel selection needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dashboard {
    /// Dashboard UID
    #[serde(default)]
    pub uid: String,
    /// Dashboard title
    #[serde(default)]
    pub title: String,
    /// Dashboard tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Top-level panels
    #[serde(default)]
    pub panels: Vec<Panel>,
}

impl Dashboard {
    /// Returns every panel, including those nested inside collapsed rows.
    ///
    /// Row panels themselves are skipped.
    #[must_use]
    pub fn all_panels(&self) -> Vec<&Panel> {
        let mut out = Vec::new();
        collect_panels(&self.panels, &mut out);
        out
    }
}

fn collect_panels<'a>(panels: &'a [Panel], out: &mut Vec<&'a Panel>) {
    for panel in panels {
        if panel.is_row() {
            collect_panels(&panel.panels, out);
        } else {
            out.push(panel);
        }
    }
}

/// A dashboard panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Panel {
    /// Panel id, unique within the dashboard
    #[serde(default)]
    pub id: Option<u64>,
    /// Panel title
    #[serde(default)]
    pub title: String,
    /// Visualization type, e.g. `timeseries` or `row`
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Datasource reference, either a UID object or a legacy name string
    #[serde(default)]
    pub datasource: Option<serde_json::Value>,
    /// Queries as stored in the dashboard
    #[serde(default)]
    pub targets: Vec<serde_json::Value>,
    /// Children of a collapsed row
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub panels: Vec<Panel>,
}

impl Panel {
    /// Returns true for row panels.
    #[must_use]
    pub fn is_row(&self) -> bool {
        self.kind == "row"
    }

    /// Returns the datasource UID, if the panel references one by UID.
    #[must_use]
    pub fn datasource_uid(&self) -> Option<&str> {
        self.datasource
            .as_ref()
            .and_then(|ds| ds.get("uid"))
            .and_then(serde_json::Value::as_str)
    }
}

/// Response of `api/health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Health {
    /// Database status, `ok` when healthy
    #[serde(default)]
    pub database: String,
    /// Grafana version
    #[serde(default)]
    pub version: String,
    /// Build commit
    #[serde(default)]
    pub commit: String,
}

/// Body of `api/ds/query`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataQueryRequest {
    /// Range start, e.g. `now-1h` or epoch milliseconds
    pub from: String,
    /// Range end, e.g. `now`
    pub to: String,
    /// Datasource queries
    pub queries: Vec<serde_json::Value>,
}

impl DataQueryRequest {
    /// Default range start.
    pub const DEFAULT_FROM: &'static str = "now-1h";
    /// Default range end.
    pub const DEFAULT_TO: &'static str = "now";

    /// Creates an empty request over `from..to`.
    #[must_use]
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
            queries: Vec::new(),
        }
    }

    /// Adds a raw query object.
    #[must_use]
    pub fn with_query(mut self, query: serde_json::Value) -> Self {
        self.queries.push(query);
        self
    }

    /// Adds an expression query (`expr`) against the datasource `uid`.
    ///
    /// Reference ids are assigned `A`, `B`, ... in insertion order.
    #[must_use]
    pub fn with_expression(self, datasource_uid: &str, expr: &str) -> Self {
        let ref_id = ref_id_for(self.queries.len());
        self.with_query(serde_json::json!({
            "refId": ref_id,
            "datasource": { "uid": datasource_uid },
            "expr": expr,
        }))
    }

    /// Adds the targets of `panel`, filling in the panel datasource where a
    /// target has none.
    #[must_use]
    pub fn with_panel_targets(mut self, panel: &Panel) -> Self {
        for target in &panel.targets {
            let mut query = target.clone();
            if let (Some(obj), Some(ds)) = (query.as_object_mut(), panel.datasource.as_ref()) {
                obj.entry("datasource").or_insert_with(|| ds.clone());
            }
            self.queries.push(query);
        }
        self
    }
}

impl Default for DataQueryRequest {
    fn default() -> Self {
        Self::new(Self::DEFAULT_FROM, Self::DEFAULT_TO)
    }
}

fn ref_id_for(index: usize) -> String {
    let letter = b'A' + u8::try_from(index % 26).unwrap_or(0);
    if index < 26 {
        char::from(letter).to_string()
    } else {
        format!("{}{}", char::from(letter), index / 26)
    }
}
