//! Core data model: monitors and check results.
//!
//! A `Monitor` is an immutable configuration record, a `CheckResult` is the
//! immutable outcome of one probe execution, carrying at most one
//! kind-specific sub-result.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The four supported probe protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MonitorKind {
    Http,
    Tcp,
    Dns,
    Ping,
}

impl std::fmt::Display for MonitorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MonitorKind::Http => "http",
            MonitorKind::Tcp => "tcp",
            MonitorKind::Dns => "dns",
            MonitorKind::Ping => "ping",
        };
        f.write_str(s)
    }
}

/// Overall status of a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Up,
    Down,
    Unknown,
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Status::Up => "up",
            Status::Down => "down",
            Status::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// HTTP method allowed for the HTTP probe's request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
}

/// Kind-specific configuration for a single monitor, resolved from YAML.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MonitorSpec {
    Http {
        url: String,
        #[serde(default = "default_expected_status")]
        expected_status: u16,
        #[serde(default)]
        headers: HashMap<String, String>,
        /// Overrides the resolved default, see `Config::resolve`.
        ssl_warning_days: Option<u32>,
    },
    Tcp {
        /// `host:port`, IPv6 literals in brackets.
        target: String,
    },
    Dns {
        /// `server[:port]`, default port 53.
        server: String,
        query_name: String,
        #[serde(default)]
        query_type: DnsQueryType,
        expected_response: Option<String>,
    },
    Ping {
        target: String,
        #[serde(default)]
        count: u16,
    },
}

fn default_expected_status() -> u16 {
    200
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DnsQueryType {
    #[default]
    A,
    Aaaa,
    Cname,
    Mx,
    Txt,
    Ns,
}

impl std::fmt::Display for DnsQueryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DnsQueryType::A => "A",
            DnsQueryType::Aaaa => "AAAA",
            DnsQueryType::Cname => "CNAME",
            DnsQueryType::Mx => "MX",
            DnsQueryType::Txt => "TXT",
            DnsQueryType::Ns => "NS",
        };
        f.write_str(s)
    }
}

impl MonitorSpec {
    pub fn kind(&self) -> MonitorKind {
        match self {
            MonitorSpec::Http { .. } => MonitorKind::Http,
            MonitorSpec::Tcp { .. } => MonitorKind::Tcp,
            MonitorSpec::Dns { .. } => MonitorKind::Dns,
            MonitorSpec::Ping { .. } => MonitorKind::Ping,
        }
    }
}

/// A fully-resolved, immutable monitor definition.
#[derive(Debug, Clone)]
pub struct Monitor {
    pub name: String,
    pub group: String,
    pub enabled: bool,
    pub interval: Duration,
    pub timeout: Duration,
    pub ssl_warning_days: u32,
    pub labels: HashMap<String, String>,
    pub spec: MonitorSpec,
}

impl Monitor {
    pub fn kind(&self) -> MonitorKind {
        self.spec.kind()
    }
}

/// Sub-result for an HTTP/HTTPS check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpResult {
    pub status_code: u16,
    pub response_time: Duration,
    pub response_size: Option<u64>,
    pub content_type: Option<String>,
    pub server: Option<String>,
    pub cache_control: Option<String>,
    pub ssl_not_after: Option<DateTime<Utc>>,
}

/// Sub-result for a TCP connect check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpResult {
    pub port: u16,
    pub connected: bool,
    pub response_time: Duration,
}

/// Sub-result for a DNS query check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DnsResult {
    pub query_type: DnsQueryType,
    pub response_code: u8,
    pub response_time: Duration,
    pub answers: Vec<String>,
    pub response_size: u64,
}

/// Sub-result for a ping check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResult {
    pub packets_sent: u16,
    pub packets_received: u16,
    pub packet_loss_pct: f64,
    pub min_rtt: Option<Duration>,
    pub max_rtt: Option<Duration>,
    pub avg_rtt: Option<Duration>,
}

/// Kind-specific payload of a `CheckResult`. Absent when the probe failed
/// before making protocol contact (e.g. DNS resolution of the target itself
/// failed before a TCP connect was attempted).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum CheckOutcome {
    Http(HttpResult),
    Tcp(TcpResult),
    Dns(DnsResult),
    Ping(PingResult),
}

/// The immutable outcome of one probe execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub monitor_name: String,
    pub kind: MonitorKind,
    pub group: String,
    pub status: Status,
    pub started_at: DateTime<Utc>,
    pub duration: Duration,
    pub error: Option<String>,
    pub outcome: Option<CheckOutcome>,
}

impl CheckResult {
    pub fn down(monitor: &Monitor, started_at: DateTime<Utc>, duration: Duration, error: impl Into<String>) -> Self {
        Self {
            monitor_name: monitor.name.clone(),
            kind: monitor.kind(),
            group: monitor.group.clone(),
            status: Status::Down,
            started_at,
            duration,
            error: Some(error.into()),
            outcome: None,
        }
    }
}

/// The rollup granularity of a persisted [`Aggregate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BucketKind {
    Hour,
    Day,
}

impl std::fmt::Display for BucketKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BucketKind::Hour => "hour",
            BucketKind::Day => "day",
        };
        f.write_str(s)
    }
}

/// A pre-computed summary over an hour or day window for a single monitor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Aggregate {
    pub monitor_name: String,
    pub bucket_kind: BucketKind,
    pub bucket_start: DateTime<Utc>,
    pub total_checks: u64,
    pub up_checks: u64,
    pub down_checks: u64,
    pub uptime_pct: f64,
    pub avg_duration: Duration,
    pub min_duration: Duration,
    pub max_duration: Duration,
}

impl Aggregate {
    /// Computes an aggregate over a window's results.
    /// `results` must all belong to the same monitor and bucket.
    pub fn from_results(
        monitor_name: &str,
        bucket_kind: BucketKind,
        bucket_start: DateTime<Utc>,
        results: &[CheckResult],
    ) -> Self {
        let total_checks = results.len() as u64;
        let up_checks = results.iter().filter(|r| r.status == Status::Up).count() as u64;
        let down_checks = total_checks - up_checks;
        let uptime_pct = if total_checks == 0 {
            0.0
        } else {
            100.0 * up_checks as f64 / total_checks as f64
        };

        let (avg_duration, min_duration, max_duration) = if results.is_empty() {
            (Duration::ZERO, Duration::ZERO, Duration::ZERO)
        } else {
            let total: Duration = results.iter().map(|r| r.duration).sum();
            let avg = total / results.len() as u32;
            let min = results.iter().map(|r| r.duration).min().unwrap();
            let max = results.iter().map(|r| r.duration).max().unwrap();
            (avg, min, max)
        };

        Self {
            monitor_name: monitor_name.to_string(),
            bucket_kind,
            bucket_start,
            total_checks,
            up_checks,
            down_checks,
            uptime_pct,
            avg_duration,
            min_duration,
            max_duration,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_result_round_trips_through_json() {
        let result = CheckResult {
            monitor_name: "example".into(),
            kind: MonitorKind::Http,
            group: "web".into(),
            status: Status::Up,
            started_at: Utc::now(),
            duration: Duration::from_millis(42),
            error: None,
            outcome: Some(CheckOutcome::Http(HttpResult {
                status_code: 200,
                response_time: Duration::from_millis(42),
                response_size: Some(512),
                content_type: Some("text/html".into()),
                server: None,
                cache_control: None,
                ssl_not_after: None,
            })),
        };

        let json = serde_json::to_string(&result).unwrap();
        let round_tripped: CheckResult = serde_json::from_str(&json).unwrap();

        assert_eq!(round_tripped.monitor_name, result.monitor_name);
        assert_eq!(round_tripped.status, result.status);
        match round_tripped.outcome {
            Some(CheckOutcome::Http(http)) => assert_eq!(http.status_code, 200),
            _ => panic!("expected http outcome"),
        }
    }

    #[test]
    fn ping_invariant_received_le_sent() {
        let result = PingResult {
            packets_sent: 4,
            packets_received: 1,
            packet_loss_pct: 75.0,
            min_rtt: None,
            max_rtt: None,
            avg_rtt: None,
        };
        assert!(result.packets_received <= result.packets_sent);
    }
}
