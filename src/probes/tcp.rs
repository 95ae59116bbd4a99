//! TCP connect probe.

use std::time::Instant;

use chrono::Utc;
use tokio::net::TcpStream;

use crate::model::{CheckOutcome, CheckResult, Monitor, MonitorSpec, TcpResult};

use super::{connection_failed_message, down_result, timeout_message, up_result};

pub async fn check(monitor: &Monitor) -> CheckResult {
    let MonitorSpec::Tcp { target } = &monitor.spec else {
        unreachable!("dispatch guarantees Tcp variant")
    };

    let started_at = Utc::now();
    let start = Instant::now();

    let port = match parse_port(target) {
        Ok(port) => port,
        Err(err) => return down_result(monitor, started_at, start.elapsed(), err, None),
    };

    match tokio::time::timeout(monitor.timeout, TcpStream::connect(target)).await {
        Ok(Ok(stream)) => {
            drop(stream);
            let duration = start.elapsed();
            up_result(
                monitor,
                started_at,
                duration,
                CheckOutcome::Tcp(TcpResult {
                    port,
                    connected: true,
                    response_time: duration,
                }),
            )
        }
        Ok(Err(err)) => {
            let duration = start.elapsed();
            down_result(
                monitor,
                started_at,
                duration,
                connection_failed_message(err),
                Some(CheckOutcome::Tcp(TcpResult {
                    port,
                    connected: false,
                    response_time: duration,
                })),
            )
        }
        Err(_) => {
            let duration = start.elapsed();
            down_result(
                monitor,
                started_at,
                duration,
                timeout_message(monitor.timeout),
                Some(CheckOutcome::Tcp(TcpResult {
                    port,
                    connected: false,
                    response_time: duration,
                })),
            )
        }
    }
}

fn parse_port(target: &str) -> Result<u16, String> {
    let (_, port_str) = target
        .rsplit_once(':')
        .ok_or_else(|| format!("target '{target}' must be host:port"))?;
    let port: u32 = port_str
        .parse()
        .map_err(|_| format!("invalid port in target '{target}'"))?;
    if port == 0 || port > 65535 {
        return Err(format!("port {port} out of range 1..65535"));
    }
    Ok(port as u16)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::time::Duration;

    fn monitor(target: &str) -> Monitor {
        Monitor {
            name: "test".to_string(),
            group: "default".to_string(),
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_millis(500),
            ssl_warning_days: 14,
            labels: HashMap::new(),
            spec: MonitorSpec::Tcp {
                target: target.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn refused_connection_reports_down_quickly() {
        let result = check(&monitor("127.0.0.1:1")).await;
        assert_eq!(result.status, crate::model::Status::Down);
        match result.outcome {
            Some(CheckOutcome::Tcp(tcp)) => assert!(!tcp.connected),
            _ => panic!("expected tcp outcome"),
        }
    }

    #[test]
    fn rejects_targets_without_port() {
        assert!(parse_port("example.com").is_err());
    }
}
