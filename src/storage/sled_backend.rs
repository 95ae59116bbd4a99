//! `sled`-backed embedded KV store with manual per-entry TTL.
//!
//! `sled` has no native expiry, so every value is prefixed with an 8-byte
//! big-endian expiry (unix millis; `i64::MAX` for entries that never
//! expire) and a background reaper task periodically drops anything past
//! its expiry. Keys are built so lexicographic order tracks time: the
//! `<unix_nanos>` suffix is big-endian so `sled`'s native key ordering is
//! also chronological order.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Notify;
use tracing::{error, warn};

use crate::model::{Aggregate, BucketKind, CheckResult};

use super::backend::{Capabilities, StorageBackend};
use super::error::StorageError;

const WRITE_QUEUE_CAPACITY: usize = 4096;
const REAPER_INTERVAL: StdDuration = StdDuration::from_secs(3600);

pub struct SledBackend {
    db: sled::Db,
    retention_days: u32,
    enable_aggregation: bool,
    queue: std::sync::Arc<WriteQueue>,
}

/// Bounded, drop-oldest pending-write buffer.
struct WriteQueue {
    pending: Mutex<VecDeque<CheckResult>>,
    notify: Notify,
}

impl WriteQueue {
    fn new() -> Self {
        Self {
            pending: Mutex::new(VecDeque::with_capacity(WRITE_QUEUE_CAPACITY)),
            notify: Notify::new(),
        }
    }

    fn push(&self, result: CheckResult) {
        let mut pending = self.pending.lock().expect("write queue poisoned");
        if pending.len() >= WRITE_QUEUE_CAPACITY {
            pending.pop_front();
            crate::metrics::record_store_drop();
        }
        pending.push_back(result);
        drop(pending);
        self.notify.notify_one();
    }

    fn drain(&self) -> Vec<CheckResult> {
        let mut pending = self.pending.lock().expect("write queue poisoned");
        pending.drain(..).collect()
    }
}

impl SledBackend {
    pub fn open(path: &str, retention_days: u32, enable_aggregation: bool) -> Result<Self, StorageError> {
        let db = sled::open(path).map_err(|source| StorageError::Open {
            path: path.to_string(),
            source,
        })?;

        let queue = std::sync::Arc::new(WriteQueue::new());
        spawn_flush_task(db.clone(), queue.clone(), retention_days);
        spawn_reaper_task(db.clone());

        Ok(Self {
            db,
            retention_days,
            enable_aggregation,
            queue,
        })
    }

    fn write_result_sync(db: &sled::Db, result: &CheckResult, retention_days: u32) -> Result<(), StorageError> {
        let expires_at = result.started_at + chrono::Duration::days(retention_days as i64);
        let value = encode(expires_at, result)?;
        db.insert(result_key(&result.monitor_name, result.started_at), value.clone())?;
        db.insert(latest_key(&result.monitor_name), encode(never_expires(), result)?)?;
        let _ = value;
        Ok(())
    }

    /// Newest-first scan over `[start, end]`, truncated to `cap` entries.
    /// Shared by `scan_results` and `scan_for_uptime`, which differ only in
    /// which cap they pass.
    fn scan_range(
        &self,
        monitor_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        cap: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        let prefix = result_prefix(monitor_name);
        let mut lower = prefix.clone();
        lower.extend_from_slice(&nanos_be(start));
        let mut upper = prefix;
        upper.extend_from_slice(&nanos_be(end));

        let mut items = Vec::new();
        for entry in self.db.range(lower..=upper) {
            let (_, value) = entry?;
            let (_, result): (DateTime<Utc>, CheckResult) = decode(&value)?;
            items.push(result);
        }
        items.reverse();
        items.truncate(cap);
        Ok(items)
    }
}

fn spawn_flush_task(db: sled::Db, queue: std::sync::Arc<WriteQueue>, retention_days: u32) {
    tokio::spawn(async move {
        loop {
            queue.notify.notified().await;
            for result in queue.drain() {
                if let Err(err) = SledBackend::write_result_sync(&db, &result, retention_days) {
                    error!(error = %err, monitor = %result.monitor_name, "failed to persist check result");
                }
            }
        }
    });
}

fn spawn_reaper_task(db: sled::Db) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(REAPER_INTERVAL);
        loop {
            ticker.tick().await;
            let now = Utc::now();
            let mut expired = Vec::new();
            for entry in db.iter() {
                let Ok((key, value)) = entry else { continue };
                if let Some(expires_at) = peek_expiry(&value) {
                    if expires_at < now {
                        expired.push(key);
                    }
                }
            }
            for key in expired {
                if let Err(err) = db.remove(key) {
                    warn!(error = %err, "failed to reap expired storage entry");
                }
            }
        }
    });
}

fn never_expires() -> DateTime<Utc> {
    DateTime::<Utc>::MAX_UTC
}

fn encode<T: Serialize>(expires_at: DateTime<Utc>, value: &T) -> Result<Vec<u8>, StorageError> {
    let millis = expires_at.timestamp_millis();
    let mut buf = millis.to_be_bytes().to_vec();
    buf.extend(serde_json::to_vec(value)?);
    Ok(buf)
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<(DateTime<Utc>, T), StorageError> {
    let millis = i64::from_be_bytes(bytes[..8].try_into().expect("stored value missing expiry header"));
    let expires_at = Utc.timestamp_millis_opt(millis).single().unwrap_or(never_expires());
    let value = serde_json::from_slice(&bytes[8..])?;
    Ok((expires_at, value))
}

fn peek_expiry(bytes: &[u8]) -> Option<DateTime<Utc>> {
    if bytes.len() < 8 {
        return None;
    }
    let millis = i64::from_be_bytes(bytes[..8].try_into().ok()?);
    if millis == never_expires().timestamp_millis() {
        return None;
    }
    Utc.timestamp_millis_opt(millis).single()
}

fn result_key(monitor: &str, started_at: DateTime<Utc>) -> Vec<u8> {
    let mut key = format!("result:{monitor}:").into_bytes();
    key.extend_from_slice(&nanos_be(started_at));
    key
}

fn result_prefix(monitor: &str) -> Vec<u8> {
    format!("result:{monitor}:").into_bytes()
}

fn latest_key(monitor: &str) -> Vec<u8> {
    format!("latest:{monitor}").into_bytes()
}

fn agg_key(kind: BucketKind, monitor: &str, bucket_start: DateTime<Utc>) -> Vec<u8> {
    let mut key = format!("agg:{kind}:{monitor}:").into_bytes();
    key.extend_from_slice(&nanos_be(bucket_start));
    key
}

fn agg_prefix(kind: BucketKind, monitor: &str) -> Vec<u8> {
    format!("agg:{kind}:{monitor}:").into_bytes()
}

fn nanos_be(ts: DateTime<Utc>) -> [u8; 8] {
    (ts.timestamp_nanos_opt().unwrap_or(0) as u64).to_be_bytes()
}

#[async_trait]
impl StorageBackend for SledBackend {
    async fn put_result(&self, result: &CheckResult) -> Result<(), StorageError> {
        self.queue.push(result.clone());
        Ok(())
    }

    async fn get_latest(&self, monitor_name: &str) -> Result<Option<CheckResult>, StorageError> {
        match self.db.get(latest_key(monitor_name))? {
            Some(bytes) => {
                let (_, result) = decode(&bytes)?;
                Ok(Some(result))
            }
            None => Ok(None),
        }
    }

    async fn scan_results(
        &self,
        monitor_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        self.scan_range(monitor_name, start, end, limit.min(10_000))
    }

    async fn scan_for_uptime(
        &self,
        monitor_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        self.scan_range(monitor_name, start, end, limit.min(100_000))
    }

    async fn scan_aggregates(
        &self,
        monitor_name: &str,
        bucket_kind: BucketKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Aggregate>, StorageError> {
        let prefix = agg_prefix(bucket_kind, monitor_name);
        let mut lower = prefix.clone();
        lower.extend_from_slice(&nanos_be(start));
        let mut upper = prefix;
        upper.extend_from_slice(&nanos_be(end));

        let mut items = Vec::new();
        for entry in self.db.range(lower..=upper) {
            let (_, value) = entry?;
            let (_, aggregate): (DateTime<Utc>, Aggregate) = decode(&value)?;
            items.push(aggregate);
        }
        Ok(items)
    }

    async fn put_aggregate(&self, aggregate: &Aggregate) -> Result<(), StorageError> {
        let key = agg_key(aggregate.bucket_kind, &aggregate.monitor_name, aggregate.bucket_start);
        let ttl_days = match aggregate.bucket_kind {
            BucketKind::Hour => 2 * self.retention_days as i64,
            BucketKind::Day => 365,
        };
        let expires_at = aggregate.bucket_start + chrono::Duration::days(ttl_days);
        self.db.insert(key, encode(expires_at, aggregate)?)?;
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_raw_results: true,
            supports_aggregation: self.enable_aggregation,
        }
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.db.flush_async().await.map_err(StorageError::Backend)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MonitorKind, Status};
    use std::time::Duration;

    fn sample_result(monitor: &str, started_at: DateTime<Utc>) -> CheckResult {
        CheckResult {
            monitor_name: monitor.to_string(),
            kind: MonitorKind::Tcp,
            group: "default".to_string(),
            status: Status::Up,
            started_at,
            duration: Duration::from_millis(5),
            error: None,
            outcome: None,
        }
    }

    #[tokio::test]
    async fn put_then_get_latest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path().to_str().unwrap(), 30, true).unwrap();
        let result = sample_result("a", Utc::now());
        backend.put_result(&result).await.unwrap();

        // Give the background flush task a chance to run.
        tokio::time::sleep(Duration::from_millis(50)).await;

        let latest = backend.get_latest("a").await.unwrap();
        assert_eq!(latest.unwrap().monitor_name, "a");
    }

    #[tokio::test]
    async fn scan_results_bounds_by_window_and_orders_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path().to_str().unwrap(), 30, true).unwrap();
        let base = Utc::now() - chrono::Duration::hours(1);
        for i in 0..5 {
            let ts = base + chrono::Duration::minutes(i);
            SledBackend::write_result_sync(&backend.db, &sample_result("a", ts), 30).unwrap();
        }

        let results = backend
            .scan_results("a", base, base + chrono::Duration::minutes(10), 3)
            .await
            .unwrap();
        assert_eq!(results.len(), 3);
        assert!(results[0].started_at > results[1].started_at);
    }
}
