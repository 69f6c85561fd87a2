//! Ports - Interfaces for external collaborators.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the pipeline and the outside world. Adapters implement these ports.
//!
//! - `QueueClient` / `QueueSubscription` - durable message log
//! - `IndexClient` - searchable document store
//! - `PushSink` / `PushStream` - the two halves of a viewer connection

mod index_client;
mod push_channel;
mod queue_client;

pub use index_client::{IndexClient, IndexError};
pub use push_channel::{CloseReason, InboundFrame, PushSink, PushStream, TransportError};
pub use queue_client::{QueueClient, QueueError, QueueMessage, QueueSubscription};
