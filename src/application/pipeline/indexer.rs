//! Indexer - best-effort persistence of consumed payloads.
//!
//! Each payload is parsed, wrapped in an [`IndexedDocument`] and written
//! on its own task. Writes are capped by a semaphore; when every permit
//! is taken the payload is skipped rather than making ingestion wait.
//! Failures are logged and counted, never retried.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;

use crate::domain::{IndexedDocument, LogEvent, Payload};
use crate::ports::IndexClient;

use super::stats::PipelineStats;

/// Dispatches index writes onto a bounded pool of tasks.
pub struct Indexer {
    client: Arc<dyn IndexClient>,
    collection: Arc<str>,
    permits: Arc<Semaphore>,
    max_writes: u32,
    stats: Arc<PipelineStats>,
}

impl Indexer {
    pub fn new(
        client: Arc<dyn IndexClient>,
        collection: impl Into<String>,
        max_concurrent_writes: usize,
        stats: Arc<PipelineStats>,
    ) -> Self {
        let max_writes = u32::try_from(max_concurrent_writes.max(1)).unwrap_or(u32::MAX);
        Self {
            client,
            collection: Arc::from(collection.into()),
            permits: Arc::new(Semaphore::new(max_writes as usize)),
            max_writes,
            stats,
        }
    }

    /// Start indexing `payload` without waiting for it.
    ///
    /// Returns `false` if the pool was saturated and the payload skipped.
    pub fn dispatch(&self, payload: Payload) -> bool {
        let permit = match self.permits.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                self.stats.index_saturated.incr();
                tracing::warn!(
                    max_concurrent_writes = self.max_writes,
                    "Index pool saturated, skipping payload"
                );
                return false;
            }
        };

        let client = self.client.clone();
        let collection = self.collection.clone();
        let stats = self.stats.clone();
        tokio::spawn(async move {
            index_payload(client.as_ref(), &collection, &payload, &stats).await;
            drop(permit);
        });
        true
    }

    /// Writes currently running.
    pub fn in_flight(&self) -> usize {
        (self.max_writes as usize).saturating_sub(self.permits.available_permits())
    }

    /// Wait up to `grace` for running writes to finish.
    ///
    /// Returns how many were still running when the grace period ran out.
    pub async fn drain(&self, grace: Duration) -> usize {
        match tokio::time::timeout(grace, self.permits.acquire_many(self.max_writes)).await {
            Ok(_) => 0,
            Err(_) => {
                let abandoned = self.in_flight();
                tracing::warn!(abandoned, "Index writes still running after grace period");
                abandoned
            }
        }
    }
}

async fn index_payload(
    client: &dyn IndexClient,
    collection: &str,
    payload: &[u8],
    stats: &PipelineStats,
) {
    let event = match LogEvent::from_slice(payload) {
        Ok(event) => event,
        Err(e) => {
            stats.malformed.incr();
            tracing::warn!(error = %e, bytes = payload.len(), "Discarding malformed log event");
            return;
        }
    };

    let document = match serde_json::to_value(IndexedDocument::stamp(event)) {
        Ok(document) => document,
        Err(e) => {
            stats.malformed.incr();
            tracing::warn!(error = %e, "Failed to encode indexed document");
            return;
        }
    };

    match client.index(collection, document).await {
        Ok(()) => {
            stats.indexed.incr();
            tracing::trace!(collection, "Log event indexed");
        }
        Err(e) => {
            stats.index_failures.incr();
            tracing::error!(collection, error = %e, "Failed to index log event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::index::InMemoryIndex;
    use crate::domain::LogLevel;

    fn event_payload(message: &str) -> Payload {
        LogEvent::new(LogLevel::Error, message, "log-agent")
            .to_payload()
            .unwrap()
    }

    fn indexer(index: &Arc<InMemoryIndex>, max: usize) -> (Indexer, Arc<PipelineStats>) {
        let stats = Arc::new(PipelineStats::new());
        let client: Arc<dyn IndexClient> = index.clone();
        (Indexer::new(client, "logs", max, stats.clone()), stats)
    }

    #[tokio::test]
    async fn indexes_wrapped_document() {
        let index = Arc::new(InMemoryIndex::new());
        let (indexer, stats) = indexer(&index, 4);

        assert!(indexer.dispatch(event_payload("Payment gateway timeout")));
        assert_eq!(indexer.drain(Duration::from_secs(1)).await, 0);

        let docs = index.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, "logs");
        assert_eq!(docs[0].1["log_entry"]["message"], "Payment gateway timeout");
        assert_eq!(docs[0].1["log_entry"]["level"], "ERROR");
        assert!(docs[0].1["@timestamp"].is_string());
        assert_eq!(stats.indexed.get(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_is_counted_not_indexed() {
        let index = Arc::new(InMemoryIndex::new());
        let (indexer, stats) = indexer(&index, 4);

        indexer.dispatch(Arc::from(&b"not json"[..]));
        indexer.drain(Duration::from_secs(1)).await;

        assert_eq!(index.document_count(), 0);
        assert_eq!(stats.malformed.get(), 1);
    }

    #[tokio::test]
    async fn index_failure_is_counted_and_not_retried() {
        let index = Arc::new(InMemoryIndex::new());
        index.fail_next(1);
        let (indexer, stats) = indexer(&index, 4);

        indexer.dispatch(event_payload("first"));
        indexer.drain(Duration::from_secs(1)).await;

        assert_eq!(index.document_count(), 0);
        assert_eq!(stats.index_failures.get(), 1);
        assert_eq!(stats.indexed.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn saturated_pool_skips_without_waiting() {
        let index = Arc::new(InMemoryIndex::new());
        index.set_delay(Duration::from_secs(5));
        let (indexer, stats) = indexer(&index, 2);

        assert!(indexer.dispatch(event_payload("a")));
        assert!(indexer.dispatch(event_payload("b")));
        assert!(!indexer.dispatch(event_payload("c")));

        assert_eq!(indexer.in_flight(), 2);
        assert_eq!(stats.index_saturated.get(), 1);

        assert_eq!(indexer.drain(Duration::from_secs(10)).await, 0);
        assert_eq!(index.document_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_reports_abandoned_writes() {
        let index = Arc::new(InMemoryIndex::new());
        index.set_delay(Duration::from_secs(30));
        let (indexer, _stats) = indexer(&index, 4);

        indexer.dispatch(event_payload("slow"));
        assert_eq!(indexer.drain(Duration::from_secs(1)).await, 1);
    }
}
