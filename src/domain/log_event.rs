//! Structured log events as produced upstream and persisted downstream.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::foundation::Timestamp;

/// Raw, immutable message bytes as they came off the queue.
///
/// Shared between the indexer and every viewer buffer without copying.
pub type Payload = Arc<[u8]>;

/// Message placed first in every new viewer's outbound buffer.
pub const WELCOME_MESSAGE: &str = "Connected to LogHarbor WebSocket";

/// Severity of a log event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
    Debug,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
        };
        write!(f, "{}", s)
    }
}

/// One structured log line.
///
/// Created once by the producer and never mutated afterwards. The
/// `timestamp` is kept as the producer's RFC 3339 string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: String,
    pub service: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

impl LogEvent {
    /// Creates an event stamped with the current time.
    pub fn new(level: LogLevel, message: impl Into<String>, service: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Timestamp::now().to_rfc3339(),
            service: service.into(),
            user_id: None,
            request_id: None,
            ip: None,
            duration_ms: None,
        }
    }

    /// The greeting a viewer receives right after connecting.
    pub fn welcome(service: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, WELCOME_MESSAGE, service)
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: i64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    /// Parses a queue payload.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Serializes into a shareable payload.
    pub fn to_payload(&self) -> Result<Payload, serde_json::Error> {
        Ok(Arc::from(serde_json::to_vec(self)?))
    }
}

/// A log event wrapped with the moment it was persisted.
///
/// Written once by the indexer; never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedDocument {
    #[serde(rename = "@timestamp")]
    pub indexed_at: String,
    #[serde(rename = "log_entry")]
    pub log_event: LogEvent,
}

impl IndexedDocument {
    /// Wraps `log_event`, stamping it with the current time.
    pub fn stamp(log_event: LogEvent) -> Self {
        Self::at(log_event, Timestamp::now())
    }

    pub fn at(log_event: LogEvent, indexed_at: Timestamp) -> Self {
        Self {
            indexed_at: indexed_at.to_rfc3339(),
            log_event,
        }
    }
}
