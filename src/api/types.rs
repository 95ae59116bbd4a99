//! JSON response shapes for the REST API.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{CheckResult, DnsQueryType, DnsResult, HttpResult, MonitorKind, PingResult, Status, TcpResult};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyChecks {
    pub config: bool,
    pub monitors: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReadyResponse {
    pub status: &'static str,
    pub checks: ReadyChecks,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonitorsResponse {
    pub monitors: Vec<MonitorStatus>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HistoryResponse {
    pub monitor: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub results: Vec<CheckResult>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct UptimeResponse {
    pub monitor: String,
    pub period: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_checks: u64,
    pub up_checks: u64,
    pub down_checks: u64,
    pub uptime_percent: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupView {
    pub name: String,
    pub monitors: Vec<MonitorStatus>,
    pub total: usize,
    pub up: usize,
    pub down: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<GroupSummary>,
    pub total: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub name: String,
    pub total: usize,
    pub up: usize,
    pub down: usize,
}

/// The REST shape of a single monitor's current configuration and latest
/// result. Optional fields are omitted, not `null`, when unset.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorStatus {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: MonitorKind,
    pub group: String,
    pub enabled: bool,
    pub status: Status,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_check: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_type: Option<DnsQueryType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_result: Option<HttpResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ping_result: Option<PingResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tcp_result: Option<TcpResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_result: Option<DnsResult>,
}
