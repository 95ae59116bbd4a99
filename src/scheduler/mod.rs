//! Scheduler: drives concurrent, per-monitor check loops.
//!
//! Each monitor gets its own long-running task communicating via an mpsc
//! command channel in an actor/handle split: a `Handle` type wraps the
//! `Sender` so callers never touch the channel directly. Results are
//! published to a `LatestCache` (a `DashMap`, so one monitor's writes never
//! block another's reads), to the metrics registry, and to the persistent
//! store.

pub mod messages;

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tokio::time::Instant;
use tracing::{instrument, warn};

use crate::model::{CheckResult, Monitor};
use crate::storage::{StorageBackend, StorageError};

use messages::MonitorCommand;

const COMMAND_CHANNEL_CAPACITY: usize = 16;

/// Snapshot of the most recent result for every monitor. Only a monitor's
/// own task ever writes its slot, and each write replaces the whole struct
/// at once, so readers never observe a torn value.
pub type LatestCache = Arc<DashMap<String, CheckResult>>;

/// One monitor's running task plus the handle used to control it.
struct MonitorHandle {
    name: String,
    commands: mpsc::Sender<MonitorCommand>,
    join: tokio::task::JoinHandle<()>,
}

impl MonitorHandle {
    async fn check_now(&self) -> Result<(), String> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(MonitorCommand::CheckNow { respond_to: tx })
            .await
            .map_err(|_| format!("monitor '{}' task is no longer running", self.name))?;
        rx.await
            .map_err(|_| format!("monitor '{}' task dropped the response channel", self.name))
    }

    async fn update_interval(&self, interval: Duration) {
        let _ = self.commands.send(MonitorCommand::UpdateInterval { interval }).await;
    }

    async fn shutdown(self) {
        let _ = self.commands.send(MonitorCommand::Shutdown).await;
        let _ = self.join.await;
    }
}

pub struct Scheduler {
    handles: tokio::sync::Mutex<Option<HashMap<String, MonitorHandle>>>,
    monitors: HashMap<String, Monitor>,
    latest: LatestCache,
    storage: Arc<dyn StorageBackend>,
    max_timeout: Duration,
}

impl Scheduler {
    /// Spawns one task per monitor. `max_concurrency` bounds simultaneously
    /// in-flight checks across all monitors; defaults to the monitor count
    /// when unset.
    pub fn start(
        monitors: Vec<Monitor>,
        storage: Arc<dyn StorageBackend>,
        max_concurrency: Option<usize>,
    ) -> Self {
        let latest: LatestCache = Arc::new(DashMap::new());
        let running = Arc::new(AtomicI64::new(0));
        let semaphore = Arc::new(Semaphore::new(max_concurrency.unwrap_or_else(|| monitors.len().max(1))));
        let max_timeout = monitors
            .iter()
            .map(|m| m.timeout)
            .max()
            .unwrap_or(Duration::from_secs(1));

        let mut handles = HashMap::with_capacity(monitors.len());
        let mut monitor_table = HashMap::with_capacity(monitors.len());
        for monitor in monitors {
            let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
            let join = tokio::spawn(run_monitor_task(
                monitor.clone(),
                rx,
                latest.clone(),
                storage.clone(),
                semaphore.clone(),
                running.clone(),
            ));
            handles.insert(
                monitor.name.clone(),
                MonitorHandle {
                    name: monitor.name.clone(),
                    commands: tx,
                    join,
                },
            );
            monitor_table.insert(monitor.name.clone(), monitor);
        }

        crate::metrics::set_monitors_running(0);

        Self {
            handles: tokio::sync::Mutex::new(Some(handles)),
            monitors: monitor_table,
            latest,
            storage,
            max_timeout,
        }
    }

    pub fn latest_cache(&self) -> LatestCache {
        self.latest.clone()
    }

    pub fn monitors(&self) -> impl Iterator<Item = &Monitor> {
        self.monitors.values()
    }

    pub fn monitor(&self, name: &str) -> Option<&Monitor> {
        self.monitors.get(name)
    }

    pub fn get_latest_result(&self, name: &str) -> Option<CheckResult> {
        self.latest.get(name).map(|entry| entry.clone())
    }

    pub async fn get_historical_results(
        &self,
        name: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<CheckResult>, StorageError> {
        self.storage.scan_results(name, start, end, limit).await
    }

    pub async fn check_now(&self, name: &str) -> Result<(), String> {
        let handles = self.handles.lock().await;
        let handles = handles.as_ref().ok_or("scheduler is shutting down")?;
        let handle = handles.get(name).ok_or_else(|| format!("unknown monitor '{name}'"))?;
        handle.check_now().await
    }

    pub async fn update_interval(&self, name: &str, interval: Duration) -> Result<(), String> {
        let handles = self.handles.lock().await;
        let handles = handles.as_ref().ok_or("scheduler is shutting down")?;
        let handle = handles.get(name).ok_or_else(|| format!("unknown monitor '{name}'"))?;
        handle.update_interval(interval).await;
        Ok(())
    }

    pub fn storage(&self) -> Arc<dyn StorageBackend> {
        self.storage.clone()
    }

    /// Cancels every task and waits for them to finish their in-flight
    /// check, bounded by `2 × max(timeout)`. Idempotent:
    /// a second call is a no-op since the handle table is only taken once.
    pub async fn stop(&self) {
        let Some(handles) = self.handles.lock().await.take() else {
            return;
        };

        let deadline = 2 * self.max_timeout;
        let shutdowns = handles.into_values().map(MonitorHandle::shutdown);
        if tokio::time::timeout(deadline, futures::future::join_all(shutdowns))
            .await
            .is_err()
        {
            warn!(?deadline, "scheduler shutdown exceeded its deadline");
        }
        if let Err(err) = self.storage.close().await {
            warn!(error = %err, "failed to close storage backend cleanly");
        }
    }
}

#[instrument(skip_all, fields(monitor = %monitor.name))]
async fn run_monitor_task(
    mut monitor: Monitor,
    mut commands: mpsc::Receiver<MonitorCommand>,
    latest: LatestCache,
    storage: Arc<dyn StorageBackend>,
    semaphore: Arc<Semaphore>,
    running: Arc<AtomicI64>,
) {
    let mut next_fire = Instant::now();

    loop {
        tokio::select! {
            _ = tokio::time::sleep_until(next_fire) => {
                next_fire += monitor.interval;
                run_one_check(&monitor, &latest, &storage, &semaphore, &running).await;

                let mut skipped = 0u32;
                while next_fire <= Instant::now() {
                    next_fire += monitor.interval;
                    skipped += 1;
                }
                if skipped > 0 {
                    warn!(monitor = %monitor.name, skipped, "check overran its interval; skipping missed ticks");
                }
            }
            Some(cmd) = commands.recv() => {
                match cmd {
                    MonitorCommand::CheckNow { respond_to } => {
                        run_one_check(&monitor, &latest, &storage, &semaphore, &running).await;
                        let _ = respond_to.send(());
                    }
                    MonitorCommand::UpdateInterval { interval } => {
                        monitor.interval = interval;
                    }
                    MonitorCommand::Shutdown => break,
                }
            }
            else => break,
        }
    }
}

async fn run_one_check(
    monitor: &Monitor,
    latest: &LatestCache,
    storage: &Arc<dyn StorageBackend>,
    semaphore: &Semaphore,
    running: &AtomicI64,
) {
    let Ok(_permit) = semaphore.acquire().await else {
        return;
    };

    running.fetch_add(1, Ordering::SeqCst);
    crate::metrics::set_monitors_running(running.load(Ordering::SeqCst));

    let result = crate::probes::check(monitor).await;

    running.fetch_sub(1, Ordering::SeqCst);
    crate::metrics::set_monitors_running(running.load(Ordering::SeqCst));

    latest.insert(monitor.name.clone(), result.clone());
    crate::metrics::record_result(&result);

    if let Err(err) = storage.put_result(&result).await {
        warn!(monitor = %monitor.name, error = %err, "failed to enqueue check result for storage");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{MonitorKind, MonitorSpec, Status};
    use crate::storage::noop::NoopBackend;
    use std::collections::HashMap as StdHashMap;
    use std::time::Instant as StdInstant;

    fn tcp_monitor(name: &str, interval: Duration) -> Monitor {
        Monitor {
            name: name.to_string(),
            group: "default".to_string(),
            enabled: true,
            interval,
            timeout: Duration::from_millis(200),
            ssl_warning_days: 14,
            labels: StdHashMap::new(),
            spec: MonitorSpec::Tcp {
                target: "127.0.0.1:1".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn fires_immediately_and_populates_latest_cache() {
        let storage: Arc<dyn StorageBackend> = Arc::new(NoopBackend);
        let scheduler = Scheduler::start(vec![tcp_monitor("a", Duration::from_secs(60))], storage, None);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let result = scheduler.get_latest_result("a");
        assert!(result.is_some());
        assert_eq!(result.unwrap().kind, MonitorKind::Tcp);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn check_now_triggers_an_out_of_band_check() {
        let storage: Arc<dyn StorageBackend> = Arc::new(NoopBackend);
        let scheduler = Scheduler::start(vec![tcp_monitor("a", Duration::from_secs(3600))], storage, None);
        tokio::time::sleep(Duration::from_millis(100)).await;

        scheduler.check_now("a").await.unwrap();
        assert_eq!(scheduler.get_latest_result("a").unwrap().status, Status::Down);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn stop_returns_within_deadline() {
        let storage: Arc<dyn StorageBackend> = Arc::new(NoopBackend);
        let scheduler = Scheduler::start(vec![tcp_monitor("a", Duration::from_secs(60))], storage, None);
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = StdInstant::now();
        scheduler.stop().await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
