//! Typed Grafana operations over the resilient API client.

use crate::api::{ApiClient, HttpClient, RequestError, ResponseBody};
use crate::time::{Clock, Sleeper, TokioSleeper};

use super::{
    DashboardResponse, DashboardSummary, DataQueryRequest, Datasource, Health, TtlCache,
};

/// Grafana HTTP API endpoints.
pub mod endpoint {
    /// Server health
    pub const HEALTH: &str = "api/health";
    /// Dashboard and folder search
    pub const SEARCH: &str = "api/search";
    /// Dashboard by UID (append the UID)
    pub const DASHBOARD_BY_UID: &str = "api/dashboards/uid/";
    /// Datasource list
    pub const DATASOURCES: &str = "api/datasources";
    /// Unified datasource query
    pub const DS_QUERY: &str = "api/ds/query";
}

/// Grafana client.
///
/// Every call goes through [`ApiClient`], so it inherits credential
/// resolution, timeouts, retries, and typed errors.
#[derive(Debug)]
pub struct GrafanaClient<H, S = TokioSleeper> {
    api: ApiClient<H, S>,
}

impl<H, S> GrafanaClient<H, S> {
    /// Wraps an API client.
    #[must_use]
    pub const fn new(api: ApiClient<H, S>) -> Self {
        Self { api }
    }

    /// Returns the underlying API client.
    #[must_use]
    pub const fn api(&self) -> &ApiClient<H, S> {
        &self.api
    }
}

impl<H: HttpClient, S: Sleeper> GrafanaClient<H, S> {
    /// Checks server health.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the request fails or the body does not decode.
    pub async fn health(&self) -> Result<Health, RequestError> {
        self.get_typed(endpoint::HEALTH).await
    }

    /// Searches dashboards, optionally filtered by a title query.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the request fails or the body does not decode.
    pub async fn search_dashboards(
        &self,
        query: Option<&str>,
    ) -> Result<Vec<DashboardSummary>, RequestError> {
        let mut params = url::form_urlencoded::Serializer::new(String::new());
        params.append_pair("type", "dash-db");
        if let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) {
            params.append_pair("query", query);
        }

        let path = format!("{}?{}", endpoint::SEARCH, params.finish());
        self.get_typed(&path).await
    }

    /// Fetches a dashboard model by UID.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the request fails or the body does not decode.
    pub async fn dashboard(&self, uid: &str) -> Result<DashboardResponse, RequestError> {
        // byte_serialize emits '+' only for spaces, which a path needs as %20
        let encoded = url::form_urlencoded::byte_serialize(uid.trim().as_bytes())
            .collect::<String>()
            .replace('+', "%20");
        let path = format!("{}{encoded}", endpoint::DASHBOARD_BY_UID);
        self.get_typed(&path).await
    }

    /// Lists datasources.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the request fails or the body does not decode.
    pub async fn datasources(&self) -> Result<Vec<Datasource>, RequestError> {
        self.get_typed(endpoint::DATASOURCES).await
    }

    /// Runs datasource queries and returns the raw result frames.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the request fails.
    pub async fn query(
        &self,
        request: &DataQueryRequest,
    ) -> Result<serde_json::Value, RequestError> {
        let body = serde_json::json!({
            "from": request.from,
            "to": request.to,
            "queries": request.queries,
        });

        let response = self.api.post_json(endpoint::DS_QUERY, &body).await?;
        Ok(response.into_json())
    }

    /// Returns the dashboard list, served from `cache` while fresh.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if a refill is needed and fails.
    pub async fn cached_dashboards(
        &self,
        cache: &TtlCache<Vec<DashboardSummary>, impl Clock>,
    ) -> Result<Vec<DashboardSummary>, RequestError> {
        cache
            .get_or_refresh(|| self.search_dashboards(None))
            .await
    }

    /// Finds a dashboard by title in the cached list.
    ///
    /// An exact case-insensitive title match wins; otherwise the first title
    /// containing `title` is returned.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError`] if the cache needs a refill and it fails.
    pub async fn find_dashboard(
        &self,
        cache: &TtlCache<Vec<DashboardSummary>, impl Clock>,
        title: &str,
    ) -> Result<Option<DashboardSummary>, RequestError> {
        let dashboards = self.cached_dashboards(cache).await?;
        Ok(match_title(dashboards, title))
    }

    async fn get_typed<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, RequestError> {
        let body: ResponseBody = self.api.get(path).await?;
        body.into_typed(path)
    }
}

fn match_title(dashboards: Vec<DashboardSummary>, title: &str) -> Option<DashboardSummary> {
    let needle = title.trim().to_lowercase();
    if needle.is_empty() {
        return None;
    }

    let mut partial = None;
    for dashboard in dashboards {
        let haystack = dashboard.title.to_lowercase();
        if haystack == needle {
            return Some(dashboard);
        }
        if partial.is_none() && haystack.contains(&needle) {
            partial = Some(dashboard);
        }
    }
    partial
}
