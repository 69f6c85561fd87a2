//! Application configuration module
//!
//! This module provides type-safe configuration loading from environment variables
//! using the `config` and `dotenvy` crates. Configuration is loaded with the
//! `LOGHARBOR` prefix and nested values use double underscores as separators.
//!
//! # Example
//!
//! ```no_run
//! use logharbor::config::AppConfig;
//!
//! let config = AppConfig::load().expect("Failed to load configuration");
//! config.validate().expect("Invalid configuration");
//!
//! println!("Viewers connect on port {}", config.server.ws_port);
//! ```

mod error;
mod index;
mod pipeline;
mod queue;
mod server;

pub use error::{ConfigError, ValidationError};
pub use index::IndexConfig;
pub use pipeline::PipelineConfig;
pub use queue::QueueConfig;
pub use server::{Environment, LogFormat, ServerConfig};

use serde::Deserialize;

/// Root application configuration
///
/// Every section has working defaults, so an empty environment yields a
/// configuration pointing at local Redis and Elasticsearch instances.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// Listener and logging configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable queue configuration
    #[serde(default)]
    pub queue: QueueConfig,

    /// Index store configuration
    #[serde(default)]
    pub index: IndexConfig,

    /// Buffer capacities and liveness timings
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// This function:
    /// 1. Loads `.env` file if present (for development)
    /// 2. Reads environment variables with `LOGHARBOR` prefix
    /// 3. Uses `__` (double underscore) to separate nested values
    /// 4. Deserializes into typed configuration structs
    ///
    /// # Environment Variable Format
    ///
    /// - `LOGHARBOR__SERVER__WS_PORT=8080` -> `server.ws_port = 8080`
    /// - `LOGHARBOR__QUEUE__TOPIC=logs` -> `queue.topic = "logs"`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if values cannot be parsed into expected types.
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .prefix("LOGHARBOR")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(config)
    }

    /// Validate all configuration values
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` if any configuration value is invalid.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.server.validate()?;
        self.queue.validate()?;
        self.index.validate()?;
        self.pipeline.validate()?;
        Ok(())
    }

    /// Load then validate, the way the binary starts up.
    pub fn load_validated() -> Result<Self, ConfigError> {
        let config = Self::load()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to ensure tests don't run in parallel (env vars are global)
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    fn clear_env() {
        env::remove_var("LOGHARBOR__SERVER__WS_PORT");
        env::remove_var("LOGHARBOR__QUEUE__TOPIC");
        env::remove_var("LOGHARBOR__QUEUE__GROUP_ID");
        env::remove_var("LOGHARBOR__INDEX__NAME");
        env::remove_var("LOGHARBOR__PIPELINE__SESSION_BUFFER_CAPACITY");
        env::remove_var("LOGHARBOR__PIPELINE__PING_INTERVAL_SECS");
    }

    #[test]
    fn test_load_with_empty_environment_uses_defaults() {
        let _guard = ENV_MUTEX.lock().unwrap();
        clear_env();
        let result = AppConfig::load();

        assert!(result.is_ok(), "Failed to load config: {:?}", result.err());
        let config = result.unwrap();
        assert_eq!(config.queue.topic, "logs");
        assert_eq!(config.index.name, "logs");
        assert_eq!(config.pipeline.broadcast_capacity, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_environment() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LOGHARBOR__QUEUE__TOPIC", "app-logs");
        env::set_var("LOGHARBOR__QUEUE__GROUP_ID", "viewers");
        env::set_var("LOGHARBOR__INDEX__NAME", "logs-2024");
        env::set_var("LOGHARBOR__SERVER__WS_PORT", "3000");
        env::set_var("LOGHARBOR__PIPELINE__SESSION_BUFFER_CAPACITY", "64");
        let result = AppConfig::load();
        clear_env();

        let config = result.unwrap();
        assert_eq!(config.queue.topic, "app-logs");
        assert_eq!(config.queue.group_id, "viewers");
        assert_eq!(config.index.name, "logs-2024");
        assert_eq!(config.server.ws_port, 3000);
        assert_eq!(config.pipeline.session_buffer_capacity, 64);
    }

    #[test]
    fn test_load_validated_rejects_bad_timings() {
        let _guard = ENV_MUTEX.lock().unwrap();
        env::set_var("LOGHARBOR__PIPELINE__PING_INTERVAL_SECS", "120");
        let result = AppConfig::load_validated();
        clear_env();

        assert!(matches!(
            result,
            Err(ConfigError::ValidationFailed(
                ValidationError::PingNotBeforeDeadline
            ))
        ));
    }

    #[test]
    fn test_default_is_valid() {
        assert!(AppConfig::default().validate().is_ok());
    }
}
