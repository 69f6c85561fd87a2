//! Queue adapters.
//!
//! - `RedisStreamsQueue` - Redis Streams with consumer groups (production)
//! - `InMemoryQueue` - in-process log for tests

mod in_memory;
mod redis_streams;

pub use in_memory::InMemoryQueue;
pub use redis_streams::RedisStreamsQueue;
