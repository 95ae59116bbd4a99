use clap::Parser;
use tracing::{error, info, level_filters::LevelFilter, warn};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

use hallmonitor::{
    aggregator, api,
    config::read_and_resolve,
    manager::load_monitors,
    scheduler::Scheduler,
    storage::build_backend,
};

#[derive(Debug, Clone, Parser)]
struct Args {
    /// Path to the YAML config file.
    #[arg(short, long, default_value = "config.yml")]
    config: String,
}

fn init_logging(level: &str) {
    let level_filter = level.parse().unwrap_or(LevelFilter::INFO);
    let filter = filter::Targets::new().with_targets(vec![("hallmonitor", level_filter)]);
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let resolved = match read_and_resolve(&args.config) {
        Ok(resolved) => resolved,
        Err(err) => {
            eprintln!("failed to load config '{}': {err}", args.config);
            std::process::exit(1);
        }
    };

    init_logging(&resolved.logging.level);
    info!(config = %args.config, "configuration loaded");

    let loaded = match load_monitors(resolved.clone()) {
        Ok(loaded) => loaded,
        Err(err) => {
            error!(error = %err, "failed to load monitors");
            std::process::exit(1);
        }
    };
    for invalid in &loaded.invalid {
        warn!(%invalid, "monitor skipped at startup");
    }
    info!(count = loaded.monitors.len(), "monitors loaded");

    let storage = match build_backend(&resolved) {
        Ok(storage) => storage,
        Err(err) => {
            error!(error = %err, "failed to initialize storage backend");
            std::process::exit(1);
        }
    };

    let monitor_names: Vec<String> = loaded.monitors.iter().map(|m| m.name.clone()).collect();
    let prometheus = hallmonitor::metrics::install();
    hallmonitor::metrics::set_monitor_inventory(&loaded.monitors);

    let scheduler = std::sync::Arc::new(Scheduler::start(loaded.monitors, storage.clone(), None));
    info!("scheduler started");

    let aggregator_handle = if resolved.storage.enable_aggregation {
        Some(aggregator::spawn(monitor_names, storage.clone()))
    } else {
        None
    };

    let api_state = api::ApiState::new(scheduler.clone(), prometheus);
    match api::spawn_api_server(resolved.api.clone(), resolved.metrics.clone(), api_state).await {
        Ok(addr) => info!(%addr, "API server listening"),
        Err(err) => {
            error!(error = %err, "failed to start API server");
            std::process::exit(1);
        }
    }

    info!("press Ctrl+C to shut down gracefully");
    wait_for_shutdown_signal().await;

    info!("shutting down scheduler");
    scheduler.stop().await;

    if let Some(handle) = aggregator_handle {
        handle.abort();
    }

    info!("shutdown complete");
    Ok(())
}

/// Waits for SIGINT or SIGTERM, whichever arrives first.
#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            error!(error = %err, "unable to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(err) = result {
                error!(error = %err, "unable to listen for SIGINT");
            }
        }
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "unable to listen for shutdown signal");
    }
}
