//! Background hourly/daily rollup task.
//!
//! Runs independently of the scheduler: every tick it aggregates the
//! current and previous hour window for each monitor, and once a day rolls
//! the previous 24 hourly buckets into a single day bucket so daily rollup
//! work stays bounded regardless of retention.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Timelike, Utc};
use tracing::warn;

use crate::model::{Aggregate, BucketKind};
use crate::storage::StorageBackend;

const TICK_INTERVAL: StdDuration = StdDuration::from_secs(3600);
const HOURS_PER_DAY: i64 = 24;

pub fn spawn(monitor_names: Vec<String>, storage: Arc<dyn StorageBackend>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        if !storage.capabilities().supports_aggregation {
            return;
        }

        let mut ticker = tokio::time::interval(TICK_INTERVAL);
        loop {
            ticker.tick().await;
            run_hourly_pass(&monitor_names, &storage).await;
            if Utc::now().hour() == 0 {
                run_daily_pass(&monitor_names, &storage).await;
            }
        }
    })
}

async fn run_hourly_pass(monitor_names: &[String], storage: &Arc<dyn StorageBackend>) {
    let now = Utc::now();
    for monitor_name in monitor_names {
        for bucket_start in [floor_hour(now), floor_hour(now) - Duration::hours(1)] {
            if let Err(err) = aggregate_hour(storage, monitor_name, bucket_start).await {
                warn!(monitor = %monitor_name, %bucket_start, error = %err, "failed to compute hourly aggregate");
            }
        }
    }
}

async fn run_daily_pass(monitor_names: &[String], storage: &Arc<dyn StorageBackend>) {
    let today = floor_day(Utc::now());
    let yesterday = today - Duration::days(1);
    for monitor_name in monitor_names {
        if let Err(err) = aggregate_day(storage, monitor_name, yesterday).await {
            warn!(monitor = %monitor_name, bucket_start = %yesterday, error = %err, "failed to compute daily aggregate");
        }
    }
}

async fn aggregate_hour(
    storage: &Arc<dyn StorageBackend>,
    monitor_name: &str,
    bucket_start: DateTime<Utc>,
) -> Result<(), crate::storage::StorageError> {
    let bucket_end = bucket_start + Duration::hours(1);
    let results = storage
        .scan_for_uptime(monitor_name, bucket_start, bucket_end, crate::history::MAX_UPTIME_SCAN)
        .await?;
    let aggregate = Aggregate::from_results(monitor_name, BucketKind::Hour, bucket_start, &results);
    storage.put_aggregate(&aggregate).await
}

/// Derives a day aggregate from the day's 24 hourly aggregates rather than
/// re-scanning raw results, bounding work regardless of retention window.
async fn aggregate_day(
    storage: &Arc<dyn StorageBackend>,
    monitor_name: &str,
    bucket_start: DateTime<Utc>,
) -> Result<(), crate::storage::StorageError> {
    let bucket_end = bucket_start + Duration::hours(HOURS_PER_DAY);
    let hours = storage
        .scan_aggregates(monitor_name, BucketKind::Hour, bucket_start, bucket_end)
        .await?;

    let total_checks: u64 = hours.iter().map(|a| a.total_checks).sum();
    let up_checks: u64 = hours.iter().map(|a| a.up_checks).sum();
    let down_checks = total_checks - up_checks;
    let uptime_pct = if total_checks == 0 {
        0.0
    } else {
        100.0 * up_checks as f64 / total_checks as f64
    };

    let (avg_duration, min_duration, max_duration) = if hours.is_empty() {
        (std::time::Duration::ZERO, std::time::Duration::ZERO, std::time::Duration::ZERO)
    } else {
        let weighted_total: std::time::Duration = hours
            .iter()
            .map(|a| a.avg_duration * a.total_checks.max(1) as u32)
            .sum();
        let avg = weighted_total / total_checks.max(1) as u32;
        let min = hours.iter().map(|a| a.min_duration).min().unwrap();
        let max = hours.iter().map(|a| a.max_duration).max().unwrap();
        (avg, min, max)
    };

    let aggregate = Aggregate {
        monitor_name: monitor_name.to_string(),
        bucket_kind: BucketKind::Day,
        bucket_start,
        total_checks,
        up_checks,
        down_checks,
        uptime_pct,
        avg_duration,
        min_duration,
        max_duration,
    };
    storage.put_aggregate(&aggregate).await
}

fn floor_hour(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive()
        .and_hms_opt(ts.hour(), 0, 0)
        .expect("valid hour")
        .and_utc()
}

fn floor_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.date_naive().and_hms_opt(0, 0, 0).expect("valid midnight").and_utc()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CheckResult, MonitorKind, Status};
    use crate::storage::sled_backend::SledBackend;
    use std::time::Duration;

    fn sample_result(monitor: &str, started_at: DateTime<Utc>, status: Status) -> CheckResult {
        CheckResult {
            monitor_name: monitor.to_string(),
            kind: MonitorKind::Tcp,
            group: "default".to_string(),
            status,
            started_at,
            duration: Duration::from_millis(10),
            error: None,
            outcome: None,
        }
    }

    #[tokio::test]
    async fn hourly_aggregate_counts_up_and_down() {
        let dir = tempfile::tempdir().unwrap();
        let backend: Arc<dyn StorageBackend> =
            Arc::new(SledBackend::open(dir.path().to_str().unwrap(), 30, true).unwrap());
        let hour_start = floor_hour(Utc::now());

        for i in 0..4 {
            let ts = hour_start + Duration::minutes(i);
            let status = if i == 0 { Status::Down } else { Status::Up };
            backend.put_result(&sample_result("a", ts, status)).await.unwrap();
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        aggregate_hour(&backend, "a", hour_start).await.unwrap();
    }

    #[test]
    fn floor_hour_truncates_minutes() {
        let ts = Utc::now();
        let floored = floor_hour(ts);
        assert_eq!(floored.minute(), 0);
        assert_eq!(floored.second(), 0);
    }
}
