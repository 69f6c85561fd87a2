//! Index store (Elasticsearch) configuration

use secrecy::Secret;
use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Searchable index configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Base URL of the index store
    #[serde(default = "default_url")]
    pub url: String,

    /// Index documents are written to
    #[serde(default = "default_name")]
    pub name: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Upper bound on concurrent index writes
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,

    /// Basic-auth user, if the store requires one
    pub username: Option<String>,

    /// Basic-auth password
    pub password: Option<Secret<String>>,
}

impl IndexConfig {
    /// Get timeout as Duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Validate index configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("INDEX__URL"));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(ValidationError::InvalidIndexUrl);
        }
        if self.name.is_empty() {
            return Err(ValidationError::MissingRequired("INDEX__NAME"));
        }
        if self.timeout_secs == 0 || self.timeout_secs > 300 {
            return Err(ValidationError::InvalidTimeout);
        }
        if self.max_concurrent_writes == 0 {
            return Err(ValidationError::ZeroCapacity("index.max_concurrent_writes"));
        }
        Ok(())
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            name: default_name(),
            timeout_secs: default_timeout(),
            max_concurrent_writes: default_max_concurrent_writes(),
            username: None,
            password: None,
        }
    }
}

fn default_url() -> String {
    "http://localhost:9200".to_string()
}

fn default_name() -> String {
    "logs".to_string()
}

fn default_timeout() -> u64 {
    10
}

fn default_max_concurrent_writes() -> usize {
    32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_config_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.name, "logs");
        assert_eq!(config.timeout(), Duration::from_secs(10));
        assert_eq!(config.max_concurrent_writes, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_url() {
        let config = IndexConfig {
            url: "localhost:9200".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidIndexUrl));
    }

    #[test]
    fn test_validation_zero_pool() {
        let config = IndexConfig {
            max_concurrent_writes: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(ValidationError::ZeroCapacity(_))));
    }

    #[test]
    fn test_validation_timeout() {
        let config = IndexConfig {
            timeout_secs: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidTimeout));
    }
}
