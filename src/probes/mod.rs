//! Probe protocol state machines.
//!
//! Probes are a closed sum type, not a trait object hierarchy:
//! each kind has its own parameter set and its own check loop body. The
//! fields common to every `CheckResult` are assembled by the free functions
//! below rather than a shared base struct.

pub mod dns;
pub mod http;
pub mod ping;
pub mod tcp;
mod tls;

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::ProbeError;
use crate::model::{CheckOutcome, CheckResult, Monitor, MonitorSpec, Status};

/// Dispatches to the probe matching the monitor's configured kind.
pub async fn check(monitor: &Monitor) -> CheckResult {
    match &monitor.spec {
        MonitorSpec::Http { .. } => http::check(monitor).await,
        MonitorSpec::Tcp { .. } => tcp::check(monitor).await,
        MonitorSpec::Dns { .. } => dns::check(monitor).await,
        MonitorSpec::Ping { .. } => ping::check(monitor).await,
    }
}

pub(crate) fn up_result(
    monitor: &Monitor,
    started_at: DateTime<Utc>,
    duration: Duration,
    outcome: CheckOutcome,
) -> CheckResult {
    CheckResult {
        monitor_name: monitor.name.clone(),
        kind: monitor.kind(),
        group: monitor.group.clone(),
        status: Status::Up,
        started_at,
        duration,
        error: None,
        outcome: Some(outcome),
    }
}

pub(crate) fn down_result(
    monitor: &Monitor,
    started_at: DateTime<Utc>,
    duration: Duration,
    error: impl Into<String>,
    outcome: Option<CheckOutcome>,
) -> CheckResult {
    CheckResult {
        monitor_name: monitor.name.clone(),
        kind: monitor.kind(),
        group: monitor.group.clone(),
        status: Status::Down,
        started_at,
        duration,
        error: Some(error.into()),
        outcome,
    }
}

/// Converts a `tokio::time::timeout` miss into the standard timeout message.
pub(crate) fn timeout_message(timeout: Duration) -> String {
    ProbeError::Timeout(timeout).into_message()
}

/// Standard message for a transport-level connection failure.
pub(crate) fn connection_failed_message(err: impl std::fmt::Display) -> String {
    ProbeError::Connection(err.to_string()).into_message()
}

/// Standard message for a response that doesn't match what the monitor expects.
pub(crate) fn unexpected_response_message(detail: impl std::fmt::Display) -> String {
    ProbeError::UnexpectedResponse(detail.to_string()).into_message()
}
