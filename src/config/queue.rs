//! Queue (Redis Streams) configuration

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Durable queue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// Redis connection URL (bootstrap address)
    #[serde(default = "default_url")]
    pub url: String,

    /// Stream the producer appends to
    #[serde(default = "default_topic")]
    pub topic: String,

    /// Consumer group identifier
    #[serde(default = "default_group_id")]
    pub group_id: String,

    /// This instance's name within the group; keep it stable across
    /// restarts so unacknowledged entries are picked up again
    #[serde(default = "default_consumer_name")]
    pub consumer_name: String,

    /// Bounded poll timeout in milliseconds
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
}

impl QueueConfig {
    /// Get poll timeout as Duration
    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    /// Validate queue configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.url.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__URL"));
        }
        if !self.url.starts_with("redis://") && !self.url.starts_with("rediss://") {
            return Err(ValidationError::InvalidQueueUrl);
        }
        if self.topic.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__TOPIC"));
        }
        if self.group_id.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__GROUP_ID"));
        }
        if self.consumer_name.is_empty() {
            return Err(ValidationError::MissingRequired("QUEUE__CONSUMER_NAME"));
        }
        if self.poll_timeout_ms == 0 || self.poll_timeout_ms > 10_000 {
            return Err(ValidationError::InvalidPollTimeout);
        }
        Ok(())
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            topic: default_topic(),
            group_id: default_group_id(),
            consumer_name: default_consumer_name(),
            poll_timeout_ms: default_poll_timeout_ms(),
        }
    }
}

fn default_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_topic() -> String {
    "logs".to_string()
}

fn default_group_id() -> String {
    "log-processor-group".to_string()
}

fn default_consumer_name() -> String {
    "log-processor".to_string()
}

fn default_poll_timeout_ms() -> u64 {
    100
}
