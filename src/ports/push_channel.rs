//! PushChannel ports - The two halves of one viewer connection.
//!
//! A viewer connection is split so that the writer and reader tasks can
//! block independently: [`PushSink`] carries outbound frames and
//! [`PushStream`] yields inbound ones.

use async_trait::async_trait;
use std::fmt;

/// Errors raised by the push-channel transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Writing a frame failed; the connection is unusable.
    #[error("Transport write failed: {0}")]
    Write(String),

    /// Reading a frame failed; the connection is unusable.
    #[error("Transport read failed: {0}")]
    Read(String),

    /// The connection has already been closed.
    #[error("Transport closed")]
    Closed,
}

/// Inbound frame kinds. Content is never interpreted by the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    Text(String),
    Binary(Vec<u8>),
    Ping,
    Pong,
    Close,
}

/// Why the server is closing a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The outbound buffer was closed after a normal termination.
    Normal,
    /// The server is shutting down.
    Shutdown,
    /// The viewer could not keep up and was evicted.
    SlowConsumer,
}

impl CloseReason {
    /// WebSocket close code (RFC 6455 §7.4.1).
    pub fn code(&self) -> u16 {
        match self {
            CloseReason::Normal => 1000,
            CloseReason::Shutdown => 1001,
            CloseReason::SlowConsumer => 1008,
        }
    }

    /// Human-readable reason carried in the close frame.
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Normal => "normal",
            CloseReason::Shutdown => "server shutting down",
            CloseReason::SlowConsumer => "slow consumer",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound half of a viewer connection.
#[async_trait]
pub trait PushSink: Send {
    /// Write `payload` as one text frame.
    async fn send_text(&mut self, payload: &[u8]) -> Result<(), TransportError>;

    /// Write a liveness ping.
    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Write a close frame and shut the outbound side.
    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError>;
}

/// Inbound half of a viewer connection.
#[async_trait]
pub trait PushStream: Send {
    /// Next inbound frame, `None` once the peer has gone away.
    async fn receive(&mut self) -> Option<Result<InboundFrame, TransportError>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(dead_code)]
    fn assert_sink_object_safe(_: &dyn PushSink) {}

    #[allow(dead_code)]
    fn assert_stream_object_safe(_: &dyn PushStream) {}

    #[test]
    fn close_codes_follow_rfc6455() {
        assert_eq!(CloseReason::Normal.code(), 1000);
        assert_eq!(CloseReason::Shutdown.code(), 1001);
        assert_eq!(CloseReason::SlowConsumer.code(), 1008);
    }

    #[test]
    fn close_reason_display() {
        assert_eq!(CloseReason::SlowConsumer.to_string(), "slow consumer");
    }
}
