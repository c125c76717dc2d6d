use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tracing::info;

use super::{
    services::{get_site, health, list_sites, metrics},
    state::AppState,
};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/operators/health", get(health))
        .route("/operators/sites", get(list_sites))
        .route("/operators/sites/{site_id}", get(get_site))
        .route("/operators/metrics", get(metrics))
        .with_state(state)
}

/// Serve the operator API until `shutdown` resolves
pub async fn serve<F>(address: SocketAddr, state: AppState, shutdown: F) -> Result<(), AnyError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(address).await?;
    info!(%address, "Operator API listening");

    axum::serve(listener, router(state).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Operator API stopped");
    Ok(())
}
