//! Storage backend abstraction.
//!
//! The core never knows which backend it's talking to: a minimal trait plus
//! a no-op implementation for metrics-only mode, so nothing needs a
//! conditional with/without-store split.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Aggregate, BucketKind, CheckResult};

use super::error::StorageError;

/// What a backend can actually do; a no-op backend reports both `false`.
/// The two flags are deliberately independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_raw_results: bool,
    pub supports_aggregation: bool,
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put_result(&self, result: &CheckResult) -> Result<(), StorageError>;

    async fn get_latest(&self, monitor_name: &str) -> Result<Option<CheckResult>, StorageError>;

    /// Newest-first, bounded by `limit` (callers are expected to have
    /// already applied the 10,000-entry hard cap).
    async fn scan_results(
        &self,
        monitor_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError>;

    /// Same window scan as `scan_results`, but bounded by the much larger
    /// 100,000-entry uptime-scan cap instead of the 10,000-entry history-page
    /// cap. Uptime needs every raw result in range, not a REST-page slice.
    async fn scan_for_uptime(
        &self,
        monitor_name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError>;

    async fn scan_aggregates(
        &self,
        monitor_name: &str,
        bucket_kind: BucketKind,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Aggregate>, StorageError>;

    /// Writes an aggregate under its bucket key, overwriting any prior
    /// value for the same (monitor, kind, bucket_start) — the aggregator
    /// relies on this being idempotent.
    async fn put_aggregate(&self, aggregate: &Aggregate) -> Result<(), StorageError>;

    fn capabilities(&self) -> Capabilities;

    async fn close(&self) -> Result<(), StorageError>;
}
