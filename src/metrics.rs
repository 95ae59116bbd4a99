//! Prometheus-format metrics registry.
//!
//! Metric names, label sets, and histogram buckets are fixed constants;
//! this module only wires the `metrics` facade to a `PrometheusHandle` and
//! offers small recording helpers so callers never spell out label tuples
//! by hand.

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

use crate::model::{CheckOutcome, CheckResult, Monitor, MonitorKind, Status};

const CHECK_DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0,
];
const HTTP_RESPONSE_TIME_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0,
];

/// Installs the global recorder and returns the handle used by the
/// `/metrics` route to render the Prometheus text exposition format.
pub fn install() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full("check_duration_seconds".to_string()), CHECK_DURATION_BUCKETS)
        .expect("valid histogram buckets")
        .set_buckets_for_metric(
            Matcher::Full("http_response_time_seconds".to_string()),
            HTTP_RESPONSE_TIME_BUCKETS,
        )
        .expect("valid histogram buckets")
        .set_buckets_for_metric(Matcher::Full("dns_query_time_seconds".to_string()), CHECK_DURATION_BUCKETS)
        .expect("valid histogram buckets")
        .set_buckets_for_metric(Matcher::Full("tcp_connect_time_seconds".to_string()), CHECK_DURATION_BUCKETS)
        .expect("valid histogram buckets")
        .set_buckets_for_metric(Matcher::Full("ping_rtt_seconds".to_string()), CHECK_DURATION_BUCKETS)
        .expect("valid histogram buckets")
        .install_recorder()
        .expect("failed to install prometheus recorder")
}

fn kind_str(kind: MonitorKind) -> &'static str {
    match kind {
        MonitorKind::Http => "http",
        MonitorKind::Tcp => "tcp",
        MonitorKind::Dns => "dns",
        MonitorKind::Ping => "ping",
    }
}

fn status_str(status: Status) -> &'static str {
    match status {
        Status::Up => "up",
        Status::Down => "down",
        Status::Unknown => "unknown",
    }
}

/// Records everything common to every check, plus the kind-specific
/// metrics derived from its outcome.
pub fn record_result(result: &CheckResult) {
    let kind = kind_str(result.kind);
    let status = status_str(result.status);

    metrics::counter!(
        "checks_total",
        "monitor" => result.monitor_name.clone(),
        "kind" => kind,
        "group" => result.group.clone(),
        "status" => status,
    )
    .increment(1);

    metrics::gauge!(
        "monitor_up",
        "monitor" => result.monitor_name.clone(),
        "kind" => kind,
        "group" => result.group.clone(),
    )
    .set(if result.status == Status::Up { 1.0 } else { 0.0 });

    metrics::histogram!(
        "check_duration_seconds",
        "monitor" => result.monitor_name.clone(),
        "kind" => kind,
        "group" => result.group.clone(),
    )
    .record(result.duration.as_secs_f64());

    if result.status == Status::Down {
        let error_type = result
            .error
            .as_deref()
            .map(classify_error)
            .unwrap_or("unknown");
        metrics::counter!(
            "errors_total",
            "monitor" => result.monitor_name.clone(),
            "kind" => kind,
            "group" => result.group.clone(),
            "error_type" => error_type,
        )
        .increment(1);
    }

    if let Some(outcome) = &result.outcome {
        match outcome {
            CheckOutcome::Http(http) => {
                metrics::histogram!(
                    "http_response_time_seconds",
                    "monitor" => result.monitor_name.clone(),
                    "group" => result.group.clone(),
                    "method" => "GET",
                    "status_code" => http.status_code.to_string(),
                )
                .record(http.response_time.as_secs_f64());

                metrics::counter!(
                    "http_status_codes_total",
                    "monitor" => result.monitor_name.clone(),
                    "group" => result.group.clone(),
                    "status_code" => http.status_code.to_string(),
                    "method" => "GET",
                )
                .increment(1);

                if let Some(not_after) = http.ssl_not_after {
                    metrics::gauge!(
                        "ssl_cert_expiry_seconds",
                        "monitor" => result.monitor_name.clone(),
                        "group" => result.group.clone(),
                        "subject" => result.monitor_name.clone(),
                    )
                    .set(not_after.timestamp() as f64);
                }
            }
            CheckOutcome::Tcp(tcp) => {
                metrics::histogram!(
                    "tcp_connect_time_seconds",
                    "monitor" => result.monitor_name.clone(),
                    "group" => result.group.clone(),
                    "port" => tcp.port.to_string(),
                )
                .record(tcp.response_time.as_secs_f64());
            }
            CheckOutcome::Dns(dns) => {
                metrics::histogram!(
                    "dns_query_time_seconds",
                    "monitor" => result.monitor_name.clone(),
                    "group" => result.group.clone(),
                    "query_type" => dns.query_type.to_string(),
                    "server" => result.monitor_name.clone(),
                )
                .record(dns.response_time.as_secs_f64());

                metrics::counter!(
                    "dns_response_codes_total",
                    "monitor" => result.monitor_name.clone(),
                    "group" => result.group.clone(),
                    "rcode" => dns.response_code.to_string(),
                    "query_type" => dns.query_type.to_string(),
                )
                .increment(1);
            }
            CheckOutcome::Ping(ping) => {
                if let Some(avg) = ping.avg_rtt {
                    metrics::histogram!(
                        "ping_rtt_seconds",
                        "monitor" => result.monitor_name.clone(),
                        "group" => result.group.clone(),
                    )
                    .record(avg.as_secs_f64());
                }
                metrics::gauge!(
                    "ping_packet_loss_percent",
                    "monitor" => result.monitor_name.clone(),
                    "group" => result.group.clone(),
                )
                .set(ping.packet_loss_pct);
            }
        }
    }
}

fn classify_error(message: &str) -> &'static str {
    if message.contains("timed out") || message.contains("timeout") {
        "timeout"
    } else if message.contains("connection") || message.contains("refused") || message.contains("resolve") {
        "connection"
    } else {
        "unexpected_response"
    }
}

pub fn set_monitor_inventory(monitors: &[Monitor]) {
    for kind in [MonitorKind::Http, MonitorKind::Tcp, MonitorKind::Dns, MonitorKind::Ping] {
        let configured = monitors.iter().filter(|m| m.kind() == kind).count();
        let enabled = monitors.iter().filter(|m| m.kind() == kind && m.enabled).count();
        metrics::gauge!("monitors_configured", "kind" => kind_str(kind)).set(configured as f64);
        metrics::gauge!("monitors_enabled", "kind" => kind_str(kind)).set(enabled as f64);
    }
}

pub fn set_monitors_running(count: i64) {
    metrics::gauge!("monitors_running").set(count as f64);
}

pub fn record_store_drop() {
    metrics::counter!("store_drops_total").increment(1);
}
