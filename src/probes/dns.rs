//! DNS query probe.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use chrono::Utc;
use trust_dns_resolver::config::{NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::rr::{RData, RecordType};
use trust_dns_resolver::TokioAsyncResolver;

use crate::model::{CheckOutcome, CheckResult, DnsQueryType, DnsResult, Monitor, MonitorSpec};

use super::{down_result, timeout_message, up_result};

pub async fn check(monitor: &Monitor) -> CheckResult {
    let MonitorSpec::Dns {
        server,
        query_name,
        query_type,
        expected_response,
    } = &monitor.spec
    else {
        unreachable!("dispatch guarantees Dns variant")
    };

    let started_at = Utc::now();
    let start = Instant::now();

    let resolver = match build_resolver(server) {
        Ok(resolver) => resolver,
        Err(err) => {
            return down(monitor, started_at, start.elapsed(), *query_type, 2, err);
        }
    };

    let record_type = to_record_type(*query_type);
    let lookup = tokio::time::timeout(monitor.timeout, resolver.lookup(query_name.as_str(), record_type)).await;

    let duration = start.elapsed();

    let records = match lookup {
        Ok(Ok(lookup)) => lookup,
        Ok(Err(err)) => {
            let response_code = match err.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. } if response_code.low() == 3 => 3,
                _ => 2,
            };
            return down(
                monitor,
                started_at,
                duration,
                *query_type,
                response_code,
                err.to_string(),
            );
        }
        Err(_) => {
            return down(
                monitor,
                started_at,
                duration,
                *query_type,
                2,
                timeout_message(monitor.timeout),
            );
        }
    };

    let answers: Vec<String> = records.iter().filter_map(render_answer).collect();
    let response_size = answers.iter().map(|a| a.len() as u64).sum();

    if answers.is_empty() {
        return down(
            monitor,
            started_at,
            duration,
            *query_type,
            3,
            "no answers returned".to_string(),
        );
    }

    if let Some(expected) = expected_response {
        let matched = answers
            .iter()
            .any(|a| a.eq_ignore_ascii_case(expected));
        if !matched {
            let dns_result = DnsResult {
                query_type: *query_type,
                response_code: 0,
                response_time: duration,
                answers: answers.clone(),
                response_size,
            };
            return down_result(
                monitor,
                started_at,
                duration,
                format!("expected answer '{expected}' not found in {answers:?}"),
                Some(CheckOutcome::Dns(dns_result)),
            );
        }
    }

    up_result(
        monitor,
        started_at,
        duration,
        CheckOutcome::Dns(DnsResult {
            query_type: *query_type,
            response_code: 0,
            response_time: duration,
            answers,
            response_size,
        }),
    )
}

fn down(
    monitor: &Monitor,
    started_at: chrono::DateTime<Utc>,
    duration: std::time::Duration,
    query_type: DnsQueryType,
    response_code: u8,
    error: impl Into<String>,
) -> CheckResult {
    down_result(
        monitor,
        started_at,
        duration,
        error,
        Some(CheckOutcome::Dns(DnsResult {
            query_type,
            response_code,
            response_time: duration,
            answers: Vec::new(),
            response_size: 0,
        })),
    )
}

fn build_resolver(server: &str) -> Result<TokioAsyncResolver, String> {
    let (host, port) = match server.rsplit_once(':') {
        Some((host, port_str)) => {
            let port = port_str
                .parse()
                .map_err(|_| format!("invalid DNS server port in '{server}'"))?;
            (host, port)
        }
        None => (server, 53u16),
    };
    let ip: IpAddr = host
        .parse()
        .map_err(|_| format!("DNS server '{host}' is not a valid IP literal"))?;

    let mut config = ResolverConfig::new();
    config.add_name_server(NameServerConfig::new(SocketAddr::new(ip, port), Protocol::Udp));

    TokioAsyncResolver::tokio(config, ResolverOpts::default())
        .map_err(|e| format!("failed to initialize resolver: {e}"))
}

fn to_record_type(kind: DnsQueryType) -> RecordType {
    match kind {
        DnsQueryType::A => RecordType::A,
        DnsQueryType::Aaaa => RecordType::AAAA,
        DnsQueryType::Cname => RecordType::CNAME,
        DnsQueryType::Mx => RecordType::MX,
        DnsQueryType::Txt => RecordType::TXT,
        DnsQueryType::Ns => RecordType::NS,
    }
}

fn render_answer(rdata: &RData) -> Option<String> {
    match rdata {
        RData::A(ip) => Some(ip.to_string()),
        RData::AAAA(ip) => Some(ip.to_string()),
        RData::CNAME(name) => Some(name.to_string()),
        RData::NS(name) => Some(name.to_string()),
        RData::MX(mx) => Some(format!("{} {}", mx.preference(), mx.exchange())),
        RData::TXT(txt) => Some(
            txt.txt_data()
                .iter()
                .map(|segment| String::from_utf8_lossy(segment).into_owned())
                .collect::<Vec<_>>()
                .concat(),
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_map_to_record_types() {
        assert_eq!(to_record_type(DnsQueryType::A), RecordType::A);
        assert_eq!(to_record_type(DnsQueryType::Mx), RecordType::MX);
    }
}
