//! Shared state handed to every API handler.

use std::sync::Arc;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::scheduler::Scheduler;

#[derive(Clone)]
pub struct ApiState {
    pub scheduler: Arc<Scheduler>,
    pub prometheus: PrometheusHandle,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

impl ApiState {
    pub fn new(scheduler: Arc<Scheduler>, prometheus: PrometheusHandle) -> Self {
        Self {
            scheduler,
            prometheus,
            started_at: chrono::Utc::now(),
        }
    }
}
