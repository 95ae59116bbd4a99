//! `GET /api/v1/groups*`: aggregated per-group views.

use axum::extract::{Path, State};
use axum::Json;

use crate::api::error::{ApiError, ApiResult};
use crate::api::routes::monitors::to_monitor_status;
use crate::api::state::ApiState;
use crate::api::types::{GroupSummary, GroupView, GroupsResponse};
use crate::model::Status;

pub async fn list_groups(State(state): State<ApiState>) -> Json<GroupsResponse> {
    let mut by_group: std::collections::BTreeMap<String, (usize, usize, usize)> = Default::default();

    for monitor in state.scheduler.monitors() {
        let latest = state.scheduler.get_latest_result(&monitor.name);
        let entry = by_group.entry(monitor.group.clone()).or_insert((0, 0, 0));
        entry.0 += 1;
        match latest.map(|r| r.status) {
            Some(Status::Up) => entry.1 += 1,
            Some(Status::Down) => entry.2 += 1,
            _ => {}
        }
    }

    let groups: Vec<GroupSummary> = by_group
        .into_iter()
        .map(|(name, (total, up, down))| GroupSummary { name, total, up, down })
        .collect();
    let total = groups.len();
    Json(GroupsResponse { groups, total })
}

pub async fn get_group(State(state): State<ApiState>, Path(name): Path<String>) -> ApiResult<Json<GroupView>> {
    let mut monitors = Vec::new();
    for monitor in state.scheduler.monitors().filter(|m| m.group == name) {
        let latest = state.scheduler.get_latest_result(&monitor.name);
        monitors.push(to_monitor_status(monitor, latest.as_ref()).await);
    }

    if monitors.is_empty() {
        return Err(ApiError::NotFound(format!("unknown group '{name}'")));
    }

    monitors.sort_by(|a, b| a.name.cmp(&b.name));
    let total = monitors.len();
    let up = monitors.iter().filter(|m| m.status == Status::Up).count();
    let down = monitors.iter().filter(|m| m.status == Status::Down).count();

    Ok(Json(GroupView {
        name,
        monitors,
        total,
        up,
        down,
    }))
}
