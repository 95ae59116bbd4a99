//! No-op backend for metrics-only mode.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::model::{Aggregate, BucketKind, CheckResult};

use super::backend::{Capabilities, StorageBackend};
use super::error::StorageError;

pub struct NoopBackend;

#[async_trait]
impl StorageBackend for NoopBackend {
    async fn put_result(&self, _result: &CheckResult) -> Result<(), StorageError> {
        Ok(())
    }

    async fn get_latest(&self, _monitor_name: &str) -> Result<Option<CheckResult>, StorageError> {
        Ok(None)
    }

    async fn scan_results(
        &self,
        _monitor_name: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        Ok(Vec::new())
    }

    async fn scan_for_uptime(
        &self,
        _monitor_name: &str,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
        _limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        Ok(Vec::new())
    }

    async fn scan_aggregates(
        &self,
        _monitor_name: &str,
        _bucket_kind: BucketKind,
        _start: DateTime<Utc>,
        _end: DateTime<Utc>,
    ) -> Result<Vec<Aggregate>, StorageError> {
        Ok(Vec::new())
    }

    async fn put_aggregate(&self, _aggregate: &Aggregate) -> Result<(), StorageError> {
        Ok(())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            supports_raw_results: false,
            supports_aggregation: false,
        }
    }

    async fn close(&self) -> Result<(), StorageError> {
        Ok(())
    }
}
