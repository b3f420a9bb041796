//! Grafana operations used to answer questions about observability data.
//!
//! This module provides:
//! - Typed API payloads ([`DashboardSummary`], [`Datasource`], [`Dashboard`], [`Panel`])
//! - Discovery and query operations ([`GrafanaClient`])
//! - A TTL cache for the dashboard list ([`TtlCache`])
//! - User-facing failure text ([`describe_failure`])

mod cache;
mod client;
mod messages;
mod types;


pub use cache::TtlCache;
pub use client::{GrafanaClient, endpoint};
pub use messages::{
    CREDENTIALS_MESSAGE, GENERIC_MESSAGE, NOT_FOUND_MESSAGE, SERVER_MESSAGE, describe_failure,
};
pub use types::{
    Dashboard, DashboardResponse, DashboardSummary, DataQueryRequest, Datasource, Health, Panel,
};
