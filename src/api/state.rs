use std::sync::Arc;
use tokio::sync::watch;

use crate::dispatcher::ConnectionState;
use crate::handlers::HandlerRegistry;
use crate::observability::Metrics;

#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<HandlerRegistry>,
    pub metrics: Arc<Metrics>,
    pub connection: watch::Receiver<ConnectionState>,
}

impl AppState {
    pub fn new(
        registry: Arc<HandlerRegistry>,
        metrics: Arc<Metrics>,
        connection: watch::Receiver<ConnectionState>,
    ) -> Self {
        Self {
            registry,
            metrics,
            connection,
        }
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }
}
