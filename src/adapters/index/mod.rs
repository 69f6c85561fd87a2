//! Index store adapters.
//!
//! - `ElasticsearchIndexClient` - document API over HTTP (production)
//! - `InMemoryIndex` - captures documents for tests

mod elasticsearch;
mod in_memory;

pub use elasticsearch::ElasticsearchIndexClient;
pub use in_memory::InMemoryIndex;
