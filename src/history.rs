//! History query layer: bound and default the raw REST
//! query parameters, then delegate to the store.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::model::CheckResult;
use crate::storage::{StorageBackend, StorageError};

pub const DEFAULT_HISTORY_LIMIT: usize = 100;
pub const MAX_HISTORY_LIMIT: usize = 10_000;
pub const MAX_UPTIME_SCAN: usize = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("end must not be before start")]
    EndBeforeStart,

    #[error("invalid period '{0}'")]
    InvalidPeriod(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub struct HistoryPage {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub results: Vec<CheckResult>,
}

/// `GetHistory(name, start, end, limit)`.
pub async fn get_history(
    store: &dyn StorageBackend,
    monitor_name: &str,
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    limit: Option<usize>,
) -> Result<HistoryPage, HistoryError> {
    let end = end.unwrap_or_else(Utc::now);
    let start = start.unwrap_or_else(|| end - chrono::Duration::hours(24));
    if end < start {
        return Err(HistoryError::EndBeforeStart);
    }
    let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).min(MAX_HISTORY_LIMIT);

    let results = store.scan_results(monitor_name, start, end, limit).await?;
    Ok(HistoryPage { start, end, results })
}

pub struct UptimeSummary {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub total_checks: u64,
    pub up_checks: u64,
    pub down_checks: u64,
    pub uptime_percent: f64,
}

/// Parses the `Ns|Nm|Nh` period grammar used elsewhere in the config.
pub fn parse_period(input: &str) -> Result<Duration, HistoryError> {
    crate::config::parse_duration(input).map_err(|_| HistoryError::InvalidPeriod(input.to_string()))
}

/// `GetUptime(name, period)`.
pub async fn get_uptime(
    store: &dyn StorageBackend,
    monitor_name: &str,
    period: Duration,
) -> Result<UptimeSummary, HistoryError> {
    let end = Utc::now();
    let start = end
        - chrono::Duration::from_std(period).unwrap_or_else(|_| chrono::Duration::hours(24));

    let results = store
        .scan_for_uptime(monitor_name, start, end, MAX_UPTIME_SCAN)
        .await?;

    let total_checks = results.len() as u64;
    let up_checks = results
        .iter()
        .filter(|r| r.status == crate::model::Status::Up)
        .count() as u64;
    let down_checks = total_checks - up_checks;
    let uptime_percent = if total_checks == 0 {
        0.0
    } else {
        100.0 * up_checks as f64 / total_checks as f64
    };

    Ok(UptimeSummary {
        start,
        end,
        total_checks,
        up_checks,
        down_checks,
        uptime_percent,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MonitorKind, Status};
    use crate::storage::noop::NoopBackend;

    #[tokio::test]
    async fn rejects_end_before_start() {
        let store = NoopBackend;
        let end = Utc::now() - chrono::Duration::hours(1);
        let start = Utc::now();
        let result = get_history(&store, "a", Some(start), Some(end), None).await;
        assert!(matches!(result, Err(HistoryError::EndBeforeStart)));
    }

    #[tokio::test]
    async fn defaults_limit_and_window() {
        let store = NoopBackend;
        let page = get_history(&store, "a", None, None, None).await.unwrap();
        assert!(page.end - page.start >= chrono::Duration::hours(23));
        assert!(page.results.is_empty());
    }

    #[tokio::test]
    async fn uptime_is_zero_with_no_results() {
        let store = NoopBackend;
        let summary = get_uptime(&store, "a", Duration::from_secs(3600)).await.unwrap();
        assert_eq!(summary.uptime_percent, 0.0);
        assert_eq!(summary.total_checks, 0);
        let _ = MonitorKind::Http;
        let _ = Status::Up;
    }
}
