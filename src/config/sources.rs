use super::models::Config;
use config::{ConfigError, Environment, File};
use std::env;
use std::path::PathBuf;

const CONFIG_ENV_VAR: &str = "SCRAPEBOX_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/scrapebox.toml";
const ENV_PREFIX: &str = "SCRAPEBOX";
const ENV_SEPARATOR: &str = "__";
const BROKER_URL_ENV_VAR: &str = "RABBITMQ_URL";

/// Load configuration from multiple sources with priority:
/// 1. Defaults (embedded in structs)
/// 2. TOML file (if exists)
/// 3. Environment variables from .env file (via dotenvy)
/// 4. System environment variables
/// 5. `RABBITMQ_URL` (highest priority for the broker URL)
pub fn load() -> Result<Config, ConfigError> {
    // Load .env file if it exists (ignore errors if file doesn't exist)
    let _ = dotenvy::dotenv();

    let config_path = env::var(CONFIG_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = load_from_sources(config_path)?;
    apply_broker_url(&mut config, env::var(BROKER_URL_ENV_VAR).ok());

    Ok(config)
}

/// Broker credentials usually arrive as a single URL variable rather than in the TOML file
fn apply_broker_url(config: &mut Config, url: Option<String>) {
    if let Some(url) = url.filter(|url| !url.trim().is_empty()) {
        config.broker.url = url;
    }
}

/// Load configuration from a specific path and environment
/// Useful for testing with custom config files
pub fn load_from_sources(config_path: PathBuf) -> Result<Config, ConfigError> {
    let mut builder = config::Config::builder();

    if config_path.exists() {
        tracing::info!("Loading configuration from: {}", config_path.display());
        builder = builder.add_source(File::from(config_path).required(false));
    } else {
        tracing::warn!(
            "Configuration file not found at {}, using defaults and environment overrides",
            config_path.display()
        );
    }

    // SCRAPEBOX__BROKER__URL -> broker.url
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .separator(ENV_SEPARATOR)
            .try_parsing(true),
    );

    let config = builder.build()?;
    config.try_deserialize()
}
