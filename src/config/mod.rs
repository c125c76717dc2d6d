//! Configuration management for ScrapeBox
//!
//! This module provides a layered configuration system that loads settings from:
//! 1. Default values (embedded in structs)
//! 2. TOML configuration file
//! 3. Environment variables (highest priority)
//!
//! # Usage
//!
//! ```no_run
//! use scrapebox::config::Config;
//!
//! let config = Config::load().expect("Failed to load configuration");
//! println!("Consuming from: {}", config.topology.jobs_queue);
//! ```
//!
//! # Environment Variables
//!
//! Configuration can be overridden using environment variables with the pattern:
//! `SCRAPEBOX__<section>__<key>`
//!
//! Examples:
//! - `SCRAPEBOX__BROKER__CONNECTION_NAME=dispatcher-2`
//! - `SCRAPEBOX__TOPOLOGY__JOBS_QUEUE=jobs.scraping.eu`
//! - `SCRAPEBOX__SERVER__BIND_ADDR=0.0.0.0:9100`
//!
//! `RABBITMQ_URL` overrides `broker.url` when set.
//!
//! # Configuration File
//!
//! By default, the configuration is loaded from `config/scrapebox.toml`.
//! This can be overridden using the `SCRAPEBOX_CONFIG` environment variable.

mod models;
mod sources;
mod validation;

pub use models::{BrokerConfig, Config, ServerConfig, TopologyConfig};
pub use validation::ValidationError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Configuration validation failed: {0}")]
    ValidationError(#[from] ValidationError),
}

impl Config {
    /// Load configuration from all sources (file + environment)
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Configuration file is malformed
    /// - Validation fails (bad broker URL, empty topology names)
    pub fn load() -> Result<Self, ConfigError> {
        let config = sources::load()?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific path
    ///
    /// Useful for testing with custom configuration files.
    pub fn load_from_path(path: std::path::PathBuf) -> Result<Self, ConfigError> {
        let config = sources::load_from_sources(path)?;
        validation::validate(&config)?;
        Ok(config)
    }
}
