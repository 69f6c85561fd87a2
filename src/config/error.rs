//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Viewer and health listeners must use different ports")]
    PortConflict,

    #[error("Viewer path must start with '/'")]
    InvalidPath,

    #[error("Invalid queue URL format")]
    InvalidQueueUrl,

    #[error("Invalid index URL format")]
    InvalidIndexUrl,

    #[error("Invalid request timeout")]
    InvalidTimeout,

    #[error("Poll timeout must be between 1ms and 10s")]
    InvalidPollTimeout,

    #[error("Capacity must be greater than zero: {0}")]
    ZeroCapacity(&'static str),

    #[error("Ping interval must be shorter than the read deadline")]
    PingNotBeforeDeadline,
}
