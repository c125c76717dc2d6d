//! Operator HTTP API
//!
//! Read-only view of a running dispatcher: readiness, registered sites and
//! counters. Jobs are never submitted here; they arrive through RabbitMQ.

mod error;
pub mod models;
mod server;
pub mod services;
pub mod state;

pub use error::ApiError;
pub use server::{router, serve};
pub use state::AppState;
