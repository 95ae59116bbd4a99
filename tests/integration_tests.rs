//! End-to-end tests exercising the full scheduler → storage → API path.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use hallmonitor::api::{spawn_api_server, ApiState};
use hallmonitor::config::{ApiConfig, MetricsConfig};
use hallmonitor::model::{CheckResult, Monitor, MonitorKind, MonitorSpec, Status};
use hallmonitor::scheduler::Scheduler;
use hallmonitor::storage::sled_backend::SledBackend;
use hallmonitor::storage::StorageBackend;
use serde_json::Value;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn tcp_monitor(name: &str, target: &str) -> Monitor {
    Monitor {
        name: name.to_string(),
        group: "default".to_string(),
        enabled: true,
        interval: Duration::from_secs(3600),
        timeout: Duration::from_millis(200),
        ssl_warning_days: 14,
        labels: HashMap::new(),
        spec: MonitorSpec::Tcp {
            target: target.to_string(),
        },
    }
}

async fn spawn_test_api(scheduler: Arc<Scheduler>) -> SocketAddr {
    let prometheus = hallmonitor::metrics::install();
    let state = ApiState::new(scheduler, prometheus);
    let mut config = ApiConfig::default();
    config.bind = "127.0.0.1".to_string();
    config.port = 0;
    spawn_api_server(config, MetricsConfig::default(), state)
        .await
        .unwrap()
}

/// An HTTP monitor against a 200-returning stub settles on `up` within a
/// couple of scheduled intervals, and the API surfaces that same status.
#[tokio::test]
async fn http_monitor_reports_up_end_to_end() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let monitor = Monitor {
        name: "stub".to_string(),
        group: "web".to_string(),
        enabled: true,
        interval: Duration::from_secs(1),
        timeout: Duration::from_secs(2),
        ssl_warning_days: 14,
        labels: HashMap::new(),
        spec: MonitorSpec::Http {
            url: server.uri(),
            expected_status: 200,
            headers: HashMap::new(),
            ssl_warning_days: None,
        },
    };

    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn StorageBackend> = Arc::new(SledBackend::open(dir.path().to_str().unwrap(), 1, false).unwrap());
    let scheduler = Arc::new(Scheduler::start(vec![monitor], storage, None));

    tokio::time::sleep(Duration::from_millis(500)).await;
    let addr = spawn_test_api(scheduler.clone()).await;

    let body: Value = reqwest::get(format!("http://{addr}/api/v1/monitors/stub"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "up");
    assert_eq!(body["http_result"]["status_code"], 200);

    scheduler.stop().await;
}

/// A history query scoped to a narrower time window with `limit=3` returns
/// exactly 3 results, newest first, and an uptime query over the whole
/// window reports every inserted result.
#[tokio::test]
async fn history_endpoint_returns_scoped_window() {
    let dir = tempfile::tempdir().unwrap();
    let storage: Arc<dyn StorageBackend> = Arc::new(SledBackend::open(dir.path().to_str().unwrap(), 30, false).unwrap());

    let base = Utc::now() - chrono::Duration::hours(1);
    let timestamps: Vec<_> = (0..10).map(|i| base + chrono::Duration::minutes(i)).collect();
    for (i, ts) in timestamps.iter().enumerate() {
        let status = if i % 3 == 0 { Status::Down } else { Status::Up };
        storage
            .put_result(&CheckResult {
                monitor_name: "x".to_string(),
                kind: MonitorKind::Tcp,
                group: "default".to_string(),
                status,
                started_at: *ts,
                duration: Duration::from_millis(5),
                error: None,
                outcome: None,
            })
            .await
            .unwrap();
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    let scheduler = Arc::new(Scheduler::start(vec![tcp_monitor("x", "127.0.0.1:1")], storage, None));
    tokio::time::sleep(Duration::from_millis(100)).await;
    let addr = spawn_test_api(scheduler.clone()).await;

    let client = reqwest::Client::new();
    let history: Value = client
        .get(format!(
            "http://{addr}/api/v1/monitors/x/history?start={}&end={}&limit=3",
            timestamps[3].to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            timestamps[7].to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let results = history["results"].as_array().unwrap();
    assert_eq!(results.len(), 3);
    let returned: Vec<_> = results
        .iter()
        .map(|r| chrono::DateTime::parse_from_rfc3339(r["started_at"].as_str().unwrap()).unwrap())
        .collect();
    assert!(returned.windows(2).all(|w| w[0] >= w[1]), "expected newest-first order");

    let uptime: Value = client
        .get(format!(
            "http://{addr}/api/v1/monitors/x/uptime?period={}h",
            // cover the whole inserted window, not just the default 24h default
            2
        ))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(uptime["total_checks"], 10);

    scheduler.stop().await;
}
