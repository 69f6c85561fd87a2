//! Server configuration

use serde::Deserialize;
use std::net::SocketAddr;

use super::error::ValidationError;

/// Listener and logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind both listeners to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port for viewer push-channel upgrades
    #[serde(default = "default_ws_port")]
    pub ws_port: u16,

    /// Port for the health endpoint
    #[serde(default = "default_health_port")]
    pub health_port: u16,

    /// Path viewers connect to
    #[serde(default = "default_ws_path")]
    pub ws_path: String,

    /// Environment name
    #[serde(default)]
    pub environment: Environment,

    /// Rust log filter directive
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log output format
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Application environment
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

/// Log output format
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl ServerConfig {
    /// Socket address for the viewer listener
    pub fn ws_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.ws_port).parse()
    }

    /// Socket address for the health listener
    pub fn health_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.health_port).parse()
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Validate server configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.ws_port == 0 || self.health_port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        if self.ws_port == self.health_port {
            return Err(ValidationError::PortConflict);
        }
        if !self.ws_path.starts_with('/') {
            return Err(ValidationError::InvalidPath);
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            ws_port: default_ws_port(),
            health_port: default_health_port(),
            ws_path: default_ws_path(),
            environment: Environment::default(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_ws_port() -> u16 {
    8080
}

fn default_health_port() -> u16 {
    8081
}

fn default_ws_path() -> String {
    "/ws".to_string()
}

fn default_log_level() -> String {
    "info,logharbor=debug".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_config_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.ws_port, 8080);
        assert_eq!(config.health_port, 8081);
        assert_eq!(config.ws_path, "/ws");
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_socket_addrs() {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            ws_port: 3000,
            health_port: 3001,
            ..Default::default()
        };
        assert_eq!(config.ws_addr().unwrap().to_string(), "127.0.0.1:3000");
        assert_eq!(config.health_addr().unwrap().to_string(), "127.0.0.1:3001");
    }

    #[test]
    fn test_bad_host_is_an_error_not_a_panic() {
        let config = ServerConfig {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(config.ws_addr().is_err());
    }

    #[test]
    fn test_is_production() {
        let mut config = ServerConfig::default();
        assert!(!config.is_production());

        config.environment = Environment::Production;
        assert!(config.is_production());
    }

    #[test]
    fn test_validation_invalid_port() {
        let config = ServerConfig {
            ws_port: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPort));
    }

    #[test]
    fn test_validation_port_conflict() {
        let config = ServerConfig {
            ws_port: 9000,
            health_port: 9000,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::PortConflict));
    }

    #[test]
    fn test_validation_path() {
        let config = ServerConfig {
            ws_path: "ws".to_string(),
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ValidationError::InvalidPath));
    }
}
