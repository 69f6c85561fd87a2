//! Push channel adapters.
//!
//! - `WsSink` / `WsStream` - the two halves of an axum WebSocket
//! - `in_memory_channel` - scripted viewer connection for tests

mod in_memory;
mod websocket;

pub use in_memory::{in_memory_channel, InMemorySink, InMemoryStream, OutboundFrame, ViewerEndpoint};
pub use websocket::{split_socket, WsSink, WsStream};
