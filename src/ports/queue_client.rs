//! QueueClient port - Interface to the durable, partitioned message log.
//!
//! The pipeline only needs two things from the log: a way to append a
//! keyed message and a consumer-group subscription that yields messages
//! one at a time and accepts acknowledgements.

use async_trait::async_trait;
use std::time::Duration;

use crate::domain::Payload;

/// Errors surfaced by a queue client or subscription.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The broker could not be reached or dropped the connection.
    #[error("Queue unavailable: {0}")]
    Unavailable(String),

    /// The broker answered with something the client does not understand.
    #[error("Queue protocol error: {0}")]
    Protocol(String),

    /// The subscription was closed and will yield nothing more.
    #[error("Subscription closed")]
    Closed,
}

/// One message taken from a subscription.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Broker-assigned position, used for acknowledgement.
    pub id: String,
    /// Producer key; ordering is guaranteed per key.
    pub key: Vec<u8>,
    /// The message body, shared without copying.
    pub payload: Payload,
}

/// Port for the producing side and subscription factory.
#[async_trait]
pub trait QueueClient: Send + Sync {
    /// Append a message to `topic` under `key`.
    async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<(), QueueError>;

    /// Join `group` on `topic`.
    ///
    /// Failing to subscribe is a fatal startup error for the pipeline.
    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn QueueSubscription>, QueueError>;
}

/// A single consumer within a consumer group.
///
/// Owned by exactly one task, so all methods take `&mut self`.
#[async_trait]
pub trait QueueSubscription: Send {
    /// Wait up to `timeout` for the next message.
    ///
    /// `Ok(None)` means the timeout elapsed; that is not an error.
    async fn poll(&mut self, timeout: Duration) -> Result<Option<QueueMessage>, QueueError>;

    /// Acknowledge a message previously returned by [`poll`](Self::poll).
    async fn ack(&mut self, message: &QueueMessage) -> Result<(), QueueError>;

    /// Stop consuming. Later polls return [`QueueError::Closed`].
    async fn close(&mut self);
}
