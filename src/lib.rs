pub mod api;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod messaging;
pub mod observability;
