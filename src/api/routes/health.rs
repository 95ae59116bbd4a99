//! `GET /health` and `GET /ready`.

use axum::extract::State;
use axum::Json;

use crate::api::state::ApiState;
use crate::api::types::{HealthResponse, ReadyChecks, ReadyResponse};

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "hallmonitor",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn ready(State(state): State<ApiState>) -> Json<ReadyResponse> {
    let monitors = state.scheduler.monitors().next().is_some();
    Json(ReadyResponse {
        status: "ready",
        checks: ReadyChecks {
            config: true,
            monitors,
        },
    })
}
