//! `GET /api/v1/monitors*`.

use std::net::IpAddr;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::error::{ApiError, ApiResult};
use crate::api::state::ApiState;
use crate::api::types::{HistoryResponse, MonitorStatus, MonitorsResponse, UptimeResponse};
use crate::model::{CheckOutcome, CheckResult, Monitor, MonitorSpec};

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct UptimeQuery {
    period: Option<String>,
}

pub async fn list_monitors(State(state): State<ApiState>) -> Json<MonitorsResponse> {
    let mut monitors: Vec<MonitorStatus> = Vec::new();
    for monitor in state.scheduler.monitors() {
        let latest = state.scheduler.get_latest_result(&monitor.name);
        monitors.push(to_monitor_status(monitor, latest.as_ref()).await);
    }
    monitors.sort_by(|a, b| a.name.cmp(&b.name));
    let total = monitors.len();
    Json(MonitorsResponse { monitors, total })
}

pub async fn get_monitor(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult<Json<MonitorStatus>> {
    let monitor = state
        .scheduler
        .monitor(&name)
        .ok_or_else(|| ApiError::NotFound(format!("unknown monitor '{name}'")))?;
    let latest = state.scheduler.get_latest_result(&name);
    Ok(Json(to_monitor_status(monitor, latest.as_ref()).await))
}

pub async fn get_monitor_history(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<HistoryResponse>> {
    if state.scheduler.monitor(&name).is_none() {
        return Err(ApiError::NotFound(format!("unknown monitor '{name}'")));
    }
    let page =
        crate::history::get_history(&*state.scheduler.storage(), &name, query.start, query.end, query.limit)
            .await?;
    let total = page.results.len();
    Ok(Json(HistoryResponse {
        monitor: name,
        start: page.start,
        end: page.end,
        results: page.results,
        total,
    }))
}

pub async fn get_monitor_uptime(
    State(state): State<ApiState>,
    Path(name): Path<String>,
    Query(query): Query<UptimeQuery>,
) -> ApiResult<Json<UptimeResponse>> {
    if state.scheduler.monitor(&name).is_none() {
        return Err(ApiError::NotFound(format!("unknown monitor '{name}'")));
    }
    let period_str = query.period.unwrap_or_else(|| "24h".to_string());
    let period = crate::history::parse_period(&period_str)?;
    let summary = crate::history::get_uptime(&*state.scheduler.storage(), &name, period).await?;
    Ok(Json(UptimeResponse {
        monitor: name,
        period: period_str,
        start: summary.start,
        end: summary.end,
        total_checks: summary.total_checks,
        up_checks: summary.up_checks,
        down_checks: summary.down_checks,
        uptime_percent: summary.uptime_percent,
    }))
}

/// Builds the REST shape for one monitor, deriving `hostname`/`ip_address`
/// from the kind-specific target.
pub(crate) async fn to_monitor_status(monitor: &Monitor, latest: Option<&CheckResult>) -> MonitorStatus {
    let (target, url, query, query_type, port, count, expected_status, expected_response, headers) =
        spec_fields(&monitor.spec);

    let host_candidate = url
        .as_deref()
        .and_then(|u| reqwest::Url::parse(u).ok().and_then(|p| p.host_str().map(str::to_string)))
        .or_else(|| target.clone())
        .map(|h| strip_port(&h));

    let (hostname, ip_address) = match host_candidate {
        Some(host) => resolve_host(&host).await,
        None => (None, None),
    };

    MonitorStatus {
        name: monitor.name.clone(),
        kind: monitor.kind(),
        group: monitor.group.clone(),
        enabled: monitor.enabled,
        status: latest.map(|r| r.status).unwrap_or(crate::model::Status::Unknown),
        last_check: latest.map(|r| r.started_at),
        duration: latest.map(|r| r.duration.as_secs_f64()),
        error: latest.and_then(|r| r.error.clone()),
        metadata: None,
        target,
        url,
        query,
        query_type,
        interval: Some(monitor.interval.as_secs()),
        timeout: Some(monitor.timeout.as_secs()),
        port,
        count,
        expected_status,
        expected_response,
        headers,
        labels: if monitor.labels.is_empty() {
            None
        } else {
            Some(monitor.labels.clone())
        },
        hostname,
        ip_address,
        http_result: latest.and_then(|r| match &r.outcome {
            Some(CheckOutcome::Http(http)) => Some(http.clone()),
            _ => None,
        }),
        ping_result: latest.and_then(|r| match &r.outcome {
            Some(CheckOutcome::Ping(ping)) => Some(ping.clone()),
            _ => None,
        }),
        tcp_result: latest.and_then(|r| match &r.outcome {
            Some(CheckOutcome::Tcp(tcp)) => Some(tcp.clone()),
            _ => None,
        }),
        dns_result: latest.and_then(|r| match &r.outcome {
            Some(CheckOutcome::Dns(dns)) => Some(dns.clone()),
            _ => None,
        }),
    }
}

#[allow(clippy::type_complexity)]
fn spec_fields(
    spec: &MonitorSpec,
) -> (
    Option<String>,
    Option<String>,
    Option<String>,
    Option<crate::model::DnsQueryType>,
    Option<u16>,
    Option<u16>,
    Option<u16>,
    Option<String>,
    Option<std::collections::HashMap<String, String>>,
) {
    match spec {
        MonitorSpec::Http {
            url,
            expected_status,
            headers,
            ..
        } => (
            None,
            Some(url.clone()),
            None,
            None,
            None,
            None,
            Some(*expected_status),
            None,
            if headers.is_empty() { None } else { Some(headers.clone()) },
        ),
        MonitorSpec::Tcp { target } => {
            let port = target.rsplit_once(':').and_then(|(_, p)| p.parse().ok());
            (Some(target.clone()), None, None, None, port, None, None, None, None)
        }
        MonitorSpec::Dns {
            server,
            query_name,
            query_type,
            expected_response,
        } => (
            Some(server.clone()),
            None,
            Some(query_name.clone()),
            Some(*query_type),
            None,
            None,
            None,
            expected_response.clone(),
            None,
        ),
        MonitorSpec::Ping { target, count } => (
            Some(target.clone()),
            None,
            None,
            None,
            None,
            Some(*count),
            None,
            None,
            None,
        ),
    }
}

fn strip_port(host: &str) -> String {
    if let Some(stripped) = host.strip_prefix('[') {
        if let Some(end) = stripped.find(']') {
            return stripped[..end].to_string();
        }
    }
    match host.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) => h.to_string(),
        _ => host.to_string(),
    }
}

/// Best-effort hostname/IP split: IP literals populate
/// `ip_address` only, names get a DNS lookup to populate `ip_address` too,
/// preferring IPv4; lookup failure just leaves `ip_address` unset.
async fn resolve_host(host: &str) -> (Option<String>, Option<String>) {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return (None, Some(ip.to_string()));
    }

    let ip = tokio::net::lookup_host((host, 0))
        .await
        .ok()
        .and_then(|addrs| {
            let mut addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            addrs.sort_by_key(|ip| !ip.is_ipv4());
            addrs.into_iter().next()
        })
        .map(|ip| ip.to_string());

    (Some(host.to_string()), ip)
}
