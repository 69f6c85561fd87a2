//! Domain layer - log events and the vocabulary of the pipeline.
//!
//! Nothing here performs I/O; adapters and the pipeline build on these types.

pub mod foundation;
mod log_event;

pub use log_event::{IndexedDocument, LogEvent, LogLevel, Payload, WELCOME_MESSAGE};
