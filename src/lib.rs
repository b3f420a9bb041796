//! grafana-ask: resilient access to the Grafana HTTP API
//!
//! A library for sending authenticated, timeout-bounded, retried requests
//! to Grafana and turning failures into typed, user-presentable errors.

pub mod api;
pub mod config;
pub mod grafana;
pub mod time;
