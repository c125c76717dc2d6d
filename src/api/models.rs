//! Response bodies for the operator API

use serde::Serialize;

use crate::dispatcher::ConnectionState;
use crate::handlers::HandlerInfo;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: &'static str,
    pub message: String,
}

/// `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub connection: ConnectionState,
    pub handlers: usize,
    pub version: &'static str,
}

/// `GET /operators/sites`
#[derive(Debug, Serialize)]
pub struct SitesResponse {
    pub sites: Vec<HandlerInfo>,
}
