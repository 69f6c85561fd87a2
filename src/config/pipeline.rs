//! Pipeline tuning: buffer capacities and liveness timings

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;

/// Capacities and timings of the processing core
#[derive(Debug, Clone, Deserialize)]
pub struct PipelineConfig {
    /// Capacity of the shared broadcast queue
    #[serde(default = "default_broadcast_capacity")]
    pub broadcast_capacity: usize,

    /// Capacity of each viewer's outbound buffer
    #[serde(default = "default_session_buffer_capacity")]
    pub session_buffer_capacity: usize,

    /// Idle time after which the writer pings the viewer
    #[serde(default = "default_ping_interval")]
    pub ping_interval_secs: u64,

    /// How long the reader waits for any inbound frame
    #[serde(default = "default_read_deadline")]
    pub read_deadline_secs: u64,

    /// How long shutdown waits for in-flight index writes
    #[serde(default = "default_shutdown_grace")]
    pub shutdown_grace_secs: u64,
}

impl PipelineConfig {
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    pub fn read_deadline(&self) -> Duration {
        Duration::from_secs(self.read_deadline_secs)
    }

    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }

    /// Validate pipeline configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.broadcast_capacity == 0 {
            return Err(ValidationError::ZeroCapacity("pipeline.broadcast_capacity"));
        }
        if self.session_buffer_capacity == 0 {
            return Err(ValidationError::ZeroCapacity(
                "pipeline.session_buffer_capacity",
            ));
        }
        if self.ping_interval_secs == 0 || self.ping_interval_secs >= self.read_deadline_secs {
            return Err(ValidationError::PingNotBeforeDeadline);
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            broadcast_capacity: default_broadcast_capacity(),
            session_buffer_capacity: default_session_buffer_capacity(),
            ping_interval_secs: default_ping_interval(),
            read_deadline_secs: default_read_deadline(),
            shutdown_grace_secs: default_shutdown_grace(),
        }
    }
}

fn default_broadcast_capacity() -> usize {
    1000
}

fn default_session_buffer_capacity() -> usize {
    256
}

fn default_ping_interval() -> u64 {
    54
}

fn default_read_deadline() -> u64 {
    60
}

fn default_shutdown_grace() -> u64 {
    5
}
