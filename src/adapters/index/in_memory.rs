//! In-memory index for testing.
//!
//! Uses `.expect()` on lock operations; not for production use.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::ports::{IndexClient, IndexError};

/// Captures indexed documents for assertions.
///
/// Can be told to fail the next N writes or to delay every write.
#[derive(Default)]
pub struct InMemoryIndex {
    documents: Mutex<Vec<(String, serde_json::Value)>>,
    failing_writes: AtomicUsize,
    delay: Mutex<Option<Duration>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `n` writes fail as if the store were unreachable.
    pub fn fail_next(&self, n: usize) {
        self.failing_writes.store(n, Ordering::SeqCst);
    }

    /// Hold every write for `delay` before completing it.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().expect("InMemoryIndex: delay lock poisoned") = Some(delay);
    }

    /// `(collection, document)` pairs written so far, in completion order.
    pub fn documents(&self) -> Vec<(String, serde_json::Value)> {
        self.documents
            .lock()
            .expect("InMemoryIndex: documents lock poisoned")
            .clone()
    }

    pub fn document_count(&self) -> usize {
        self.documents
            .lock()
            .expect("InMemoryIndex: documents lock poisoned")
            .len()
    }
}

#[async_trait]
impl IndexClient for InMemoryIndex {
    async fn index(
        &self,
        collection: &str,
        document: serde_json::Value,
    ) -> Result<(), IndexError> {
        let delay = *self.delay.lock().expect("InMemoryIndex: delay lock poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let failed = self
            .failing_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(IndexError::Unavailable("injected index failure".to_string()));
        }

        self.documents
            .lock()
            .expect("InMemoryIndex: documents lock poisoned")
            .push((collection.to_string(), document));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn records_documents() {
        let index = InMemoryIndex::new();
        index.index("logs", json!({"a": 1})).await.unwrap();

        let docs = index.documents();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].0, "logs");
        assert_eq!(docs[0].1["a"], 1);
    }

    #[tokio::test]
    async fn injected_failures_run_out() {
        let index = InMemoryIndex::new();
        index.fail_next(1);

        assert!(index.index("logs", json!({})).await.is_err());
        assert!(index.index("logs", json!({})).await.is_ok());
        assert_eq!(index.document_count(), 1);
    }
}
