pub mod settings;

// Re-export the primary Config struct so callers can use `config::Config`
pub use settings::{parse_ttl_map, Config, SourceFilters};

use crate::error::PollerError;
use std::sync::Arc;

/// Loads and returns the application configuration as an `Arc<Config>`.
/// Reads the process environment; callers load `.env` first. Any error here is
/// a `ConfigError` and the process must not start.
pub fn load_config() -> Result<Arc<Config>, PollerError> {
    let config = Config::from_env()?;

    if config.api_base_url.is_empty() {
        return Err(PollerError::ConfigError("API_BASE_URL cannot be empty".to_string()));
    }
    if config.redis_url.is_empty() {
        return Err(PollerError::ConfigError("REDIS_URL cannot be empty".to_string()));
    }

    config.validate_and_log();

    Ok(Arc::new(config))
}
