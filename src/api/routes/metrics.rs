//! `GET /metrics` — Prometheus text exposition format.

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::state::ApiState;

pub async fn metrics(State(state): State<ApiState>) -> impl IntoResponse {
    let body = state.prometheus.render();
    ([(header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}
