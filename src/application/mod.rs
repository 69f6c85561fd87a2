//! Application layer - the log distribution pipeline.
//!
//! Coordinates the ports: consumes from the queue, writes to the index
//! and pushes to connected viewers.

pub mod pipeline;

pub use pipeline::{Pipeline, RunningPipeline, ShutdownReport, StartupError};
