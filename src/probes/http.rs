//! HTTP/HTTPS probe.

use std::time::{Duration, Instant};

use chrono::Utc;
use reqwest::redirect::Policy;
use tracing::warn;

use crate::model::{CheckOutcome, CheckResult, HttpResult, Monitor, MonitorSpec};

use super::{connection_failed_message, down_result, timeout_message, tls, unexpected_response_message, up_result};

const USER_AGENT: &str = "HallMonitor/1.0";
const MAX_REDIRECTS: usize = 5;

pub async fn check(monitor: &Monitor) -> CheckResult {
    let MonitorSpec::Http {
        url,
        expected_status,
        headers,
        ..
    } = &monitor.spec
    else {
        unreachable!("dispatch guarantees Http variant")
    };

    let started_at = Utc::now();
    let start = Instant::now();

    let client = match build_client(headers) {
        Ok(client) => client,
        Err(err) => {
            return down_result(monitor, started_at, start.elapsed(), err, None);
        }
    };

    let result = tokio::time::timeout(monitor.timeout, client.get(url).send()).await;

    let response = match result {
        Ok(Ok(response)) => response,
        Ok(Err(err)) if err.is_redirect() => {
            return down_result(
                monitor,
                started_at,
                start.elapsed(),
                format!("exceeded {MAX_REDIRECTS} redirects"),
                None,
            );
        }
        Ok(Err(err)) => {
            return down_result(monitor, started_at, start.elapsed(), connection_message(&err), None);
        }
        Err(_) => {
            return down_result(
                monitor,
                started_at,
                start.elapsed(),
                timeout_message(monitor.timeout),
                None,
            );
        }
    };

    let status_code = response.status().as_u16();
    let headers_out = response.headers().clone();
    let response_size = headers_out
        .get(reqwest::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let content_type = header_string(&headers_out, reqwest::header::CONTENT_TYPE);
    let server = header_string(&headers_out, reqwest::header::SERVER);
    let cache_control = header_string(&headers_out, reqwest::header::CACHE_CONTROL);

    let ssl_not_after = if url.starts_with("https://") {
        if let Some((host, port)) = host_port(url) {
            let remaining = monitor.timeout.saturating_sub(start.elapsed());
            tls::leaf_cert_not_after(&host, port, remaining).await
        } else {
            None
        }
    } else {
        None
    };

    if let Some(not_after) = ssl_not_after {
        let warn_by = Utc::now() + chrono::Duration::days(monitor.ssl_warning_days as i64);
        if not_after <= warn_by {
            warn!(monitor = %monitor.name, %not_after, "TLS certificate nears expiry");
        }
    }

    let duration = start.elapsed();
    let http_result = HttpResult {
        status_code,
        response_time: duration,
        response_size,
        content_type,
        server,
        cache_control,
        ssl_not_after,
    };

    if status_code == *expected_status {
        up_result(monitor, started_at, duration, CheckOutcome::Http(http_result))
    } else {
        down_result(
            monitor,
            started_at,
            duration,
            unexpected_response_message(format!("unexpected status code: {status_code} (expected {expected_status})")),
            Some(CheckOutcome::Http(http_result)),
        )
    }
}

fn build_client(headers: &std::collections::HashMap<String, String>) -> Result<reqwest::Client, String> {
    let mut header_map = reqwest::header::HeaderMap::new();
    for (key, value) in headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| format!("invalid header name '{key}': {e}"))?;
        let value = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| format!("invalid header value for '{key}': {e}"))?;
        header_map.insert(name, value);
    }

    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .redirect(Policy::limit(MAX_REDIRECTS))
        .default_headers(header_map)
        .build()
        .map_err(|e| format!("failed to build http client: {e}"))
}

fn header_string(headers: &reqwest::header::HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers.get(name)?.to_str().ok().map(|s| s.to_string())
}

fn connection_message(err: &reqwest::Error) -> String {
    if err.is_connect() {
        connection_failed_message(err)
    } else if err.is_timeout() {
        "request timed out".to_string()
    } else {
        format!("request failed: {err}")
    }
}

fn host_port(url: &str) -> Option<(String, u16)> {
    let parsed = reqwest::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    let port = parsed.port_or_known_default()?;
    Some((host, port))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn monitor(url: String, expected_status: u16) -> Monitor {
        Monitor {
            name: "test".to_string(),
            group: "default".to_string(),
            enabled: true,
            interval: Duration::from_secs(30),
            timeout: Duration::from_secs(2),
            ssl_warning_days: 14,
            labels: HashMap::new(),
            spec: MonitorSpec::Http {
                url,
                expected_status,
                headers: HashMap::new(),
                ssl_warning_days: None,
            },
        }
    }

    #[tokio::test]
    async fn succeeds_on_expected_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let result = check(&monitor(server.uri(), 200)).await;
        assert_eq!(result.status, crate::model::Status::Up);
    }

    #[tokio::test]
    async fn fails_on_mismatched_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let result = check(&monitor(server.uri(), 200)).await;
        assert_eq!(result.status, crate::model::Status::Down);
        assert!(result
            .error
            .as_deref()
            .unwrap()
            .contains("unexpected status code: 500 (expected 200)"));
    }
}
