//! REST API for HallMonitor's health, monitor, group, and metrics routes.
//!
//! Axum with Tower middleware; handlers never touch the scheduler or
//! storage directly, only through `ApiState`.

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use state::ApiState;

use axum::{routing::get, Router};
use std::net::SocketAddr;
use tracing::info;

use crate::config::{ApiConfig, MetricsConfig};

/// Spawns the API server as a background task, returning its bound address.
pub async fn spawn_api_server(
    config: ApiConfig,
    metrics: MetricsConfig,
    state: ApiState,
) -> anyhow::Result<SocketAddr> {
    use tower_http::cors::{Any, CorsLayer};
    use tower_http::trace::TraceLayer;

    let mut app = Router::new()
        .route("/health", get(routes::health::health))
        .route("/ready", get(routes::health::ready))
        .route("/api/v1/monitors", get(routes::monitors::list_monitors))
        .route("/api/v1/monitors/:name", get(routes::monitors::get_monitor))
        .route(
            "/api/v1/monitors/:name/history",
            get(routes::monitors::get_monitor_history),
        )
        .route(
            "/api/v1/monitors/:name/uptime",
            get(routes::monitors::get_monitor_uptime),
        )
        .route("/api/v1/groups", get(routes::groups::list_groups))
        .route("/api/v1/groups/:name", get(routes::groups::get_group));

    if metrics.enabled {
        app = app.route("/metrics", get(routes::metrics::metrics));
    }

    let mut app = app.with_state(state).layer(TraceLayer::new_for_http());

    if config.enable_cors {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
        app = app.layer(cors);
    }

    if let Some(token) = config.auth_token.clone() {
        app = app.layer(axum::middleware::from_fn_with_state(
            token,
            middleware::auth::auth_middleware,
        ));
    }

    let bind_addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let addr = listener.local_addr()?;

    info!(%addr, "API server listening");

    tokio::spawn(async move {
        if let Err(err) = axum::serve(listener, app).await {
            tracing::error!(error = %err, "API server error");
        }
    });

    Ok(addr)
}
