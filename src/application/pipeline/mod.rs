//! The processing core.
//!
//! ```text
//! Queue ─► IngestLoop ─┬─► Indexer ─► IndexClient
//!                      └─► broadcast queue ─► Broadcaster ─► SessionRegistry
//!                                                               │
//!                                          ViewerSession buffers ◄┘
//! ```

mod broadcaster;
mod indexer;
mod ingest;
mod registry;
mod session;
mod stats;
mod supervisor;

pub use broadcaster::Broadcaster;
pub use indexer::Indexer;
pub use ingest::IngestLoop;
pub use registry::{FanOutReport, RegistryError, SessionControl, SessionRegistry};
pub use session::{ReaderExit, SessionSettings, ViewerSession, SERVICE_NAME};
pub use stats::{Counter, PipelineStats, StatsSnapshot};
pub use supervisor::{Pipeline, RunningPipeline, ShutdownReport, StartupError};
