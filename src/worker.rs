use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use scrapebox::api::{self, AppState};
use scrapebox::config::Config;
use scrapebox::dispatcher::{self, ConnectionState};
use scrapebox::handlers::{self, HandlerRegistry};
use scrapebox::observability::Metrics;

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

fn builtin_registry() -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();
    registry.discover(handlers::builtin());
    registry
}

/// `scrapebox consume`: run the dispatcher, plus the operator API when an
/// address is configured, until SIGINT/SIGTERM
pub async fn consume(operator_addr: Option<SocketAddr>) -> Result<(), AnyError> {
    info!("Loading configuration");
    let config = Config::load().map_err(|e| format!("Failed to load config: {}", e))?;

    let registry = builtin_registry();
    if registry.is_empty() {
        warn!("No handlers registered, every job will fail");
    }
    let registry = Arc::new(registry);
    let metrics = Arc::new(Metrics::new());
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);

    let api_task = operator_addr.or(config.server.bind_addr).map(|address| {
        let state = AppState::new(registry.clone(), metrics.clone(), state_rx.clone());
        let mut closed = state_rx.clone();
        tokio::spawn(api::serve(address, state, async move {
            let _ = closed
                .wait_for(|state| *state == ConnectionState::Closed)
                .await;
        }))
    });

    let outcome = dispatcher::run(&config, registry, metrics, state_tx, shutdown_signal()).await;

    if let Some(task) = api_task {
        match task.await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(error = %err, "Operator API failed"),
            Err(err) => error!(error = %err, "Operator API task panicked"),
        }
    }

    outcome?;
    Ok(())
}

/// `scrapebox sites`: print handler descriptions as JSON
pub fn print_sites(site_id: Option<&str>) -> Result<(), AnyError> {
    let registry = builtin_registry();

    let output = match site_id {
        Some(site_id) => {
            let info = registry.describe(site_id)?.ok_or_else(|| {
                format!(
                    "no handler registered for site_id '{site_id}' (available: {})",
                    registry.list_ids().join(", ")
                )
            })?;
            serde_json::to_string_pretty(&info)?
        }
        None => serde_json::to_string_pretty(&registry.describe_all())?,
    };

    println!("{output}");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
