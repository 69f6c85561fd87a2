//! Adapters - implementations of the ports plus the HTTP surfaces.
//!
//! Each collaborator has a production adapter and an in-memory one for
//! tests.

pub mod http;
pub mod index;
pub mod push;
pub mod queue;

pub use index::{ElasticsearchIndexClient, InMemoryIndex};
pub use queue::{InMemoryQueue, RedisStreamsQueue};
