//! In-memory queue implementation for testing.
//!
//! # Security Note
//!
//! This adapter is for **testing only**. It uses `.expect()` on lock
//! operations which will panic if locks are poisoned.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;

use crate::ports::{QueueClient, QueueError, QueueMessage, QueueSubscription};

#[derive(Default)]
struct Shared {
    /// topic → append-only log
    topics: Mutex<HashMap<String, Vec<QueueMessage>>>,
    /// (topic, group) → next offset to deliver
    cursors: Mutex<HashMap<(String, String), usize>>,
    /// (topic, group) → delivered but not yet acknowledged
    pending: Mutex<HashMap<(String, String), Vec<QueueMessage>>>,
    acked: Mutex<Vec<String>>,
    failing_polls: AtomicUsize,
    notify: Notify,
}

/// In-memory queue for tests.
///
/// Features:
/// - Per-topic append-only log with per-group delivery cursors
/// - Unacknowledged messages redelivered to the group's next subscription
/// - Blocking polls that honour the timeout (and tokio's paused clock)
/// - Injectable poll failures
/// - Capture of acknowledgements for assertions
///
/// # Example
///
/// ```ignore
/// let queue = Arc::new(InMemoryQueue::new());
/// let mut sub = queue.subscribe("logs", "group").await?;
/// queue.publish("logs", b"svc", b"{...}").await?;
/// let msg = sub.poll(Duration::from_millis(100)).await?;
/// ```
#[derive(Clone, Default)]
pub struct InMemoryQueue {
    shared: Arc<Shared>,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    // === Test Helpers ===

    /// Make the next `n` polls on any subscription fail.
    pub fn fail_next_polls(&self, n: usize) {
        self.shared.failing_polls.store(n, Ordering::SeqCst);
    }

    /// Everything published to `topic` so far.
    pub fn published(&self, topic: &str) -> Vec<QueueMessage> {
        self.shared
            .topics
            .lock()
            .expect("InMemoryQueue: topics lock poisoned")
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// IDs acknowledged by any subscription, in acknowledgement order.
    pub fn acked(&self) -> Vec<String> {
        self.shared
            .acked
            .lock()
            .expect("InMemoryQueue: acked lock poisoned")
            .clone()
    }
}

#[async_trait]
impl QueueClient for InMemoryQueue {
    async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<(), QueueError> {
        {
            let mut topics = self
                .shared
                .topics
                .lock()
                .expect("InMemoryQueue: topics lock poisoned");
            let log = topics.entry(topic.to_string()).or_default();
            let id = format!("{}-0", log.len());
            log.push(QueueMessage {
                id,
                key: key.to_vec(),
                payload: Arc::from(payload),
            });
        }
        self.shared.notify.notify_waiters();
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn QueueSubscription>, QueueError> {
        let key = (topic.to_string(), group.to_string());
        self.shared
            .cursors
            .lock()
            .expect("InMemoryQueue: cursors lock poisoned")
            .entry(key.clone())
            .or_insert(0);
        let replay: VecDeque<QueueMessage> = self
            .shared
            .pending
            .lock()
            .expect("InMemoryQueue: pending lock poisoned")
            .get(&key)
            .cloned()
            .unwrap_or_default()
            .into();

        Ok(Box::new(InMemorySubscription {
            shared: self.shared.clone(),
            topic: topic.to_string(),
            group: group.to_string(),
            replay,
            closed: false,
        }))
    }
}

struct InMemorySubscription {
    shared: Arc<Shared>,
    topic: String,
    group: String,
    replay: VecDeque<QueueMessage>,
    closed: bool,
}

impl InMemorySubscription {
    fn key(&self) -> (String, String) {
        (self.topic.clone(), self.group.clone())
    }

    fn take_next(&mut self) -> Option<QueueMessage> {
        if let Some(message) = self.replay.pop_front() {
            return Some(message);
        }

        let topics = self
            .shared
            .topics
            .lock()
            .expect("InMemoryQueue: topics lock poisoned");
        let mut cursors = self
            .shared
            .cursors
            .lock()
            .expect("InMemoryQueue: cursors lock poisoned");

        let cursor = cursors.entry(self.key()).or_insert(0);
        let message = topics.get(&self.topic)?.get(*cursor)?.clone();
        *cursor += 1;

        self.shared
            .pending
            .lock()
            .expect("InMemoryQueue: pending lock poisoned")
            .entry(self.key())
            .or_default()
            .push(message.clone());
        Some(message)
    }

    fn consume_injected_failure(&self) -> bool {
        self.shared
            .failing_polls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QueueSubscription for InMemorySubscription {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        if self.closed {
            return Err(QueueError::Closed);
        }
        if self.consume_injected_failure() {
            return Err(QueueError::Unavailable("injected poll failure".to_string()));
        }

        let shared = self.shared.clone();
        let deadline = Instant::now() + timeout;
        loop {
            // Register interest before checking so a concurrent publish is not missed.
            let notified = shared.notify.notified();
            if let Some(message) = self.take_next() {
                return Ok(Some(message));
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    async fn ack(&mut self, message: &QueueMessage) -> Result<(), QueueError> {
        if self.closed {
            return Err(QueueError::Closed);
        }
        if let Some(pending) = self
            .shared
            .pending
            .lock()
            .expect("InMemoryQueue: pending lock poisoned")
            .get_mut(&self.key())
        {
            pending.retain(|m| m.id != message.id);
        }
        self.shared
            .acked
            .lock()
            .expect("InMemoryQueue: acked lock poisoned")
            .push(message.id.clone());
        Ok(())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPIC: &str = "logs";
    const GROUP: &str = "log-processor-group";

    #[tokio::test]
    async fn poll_returns_messages_in_publish_order() {
        let queue = InMemoryQueue::new();
        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();

        queue.publish(TOPIC, b"k", b"first").await.unwrap();
        queue.publish(TOPIC, b"k", b"second").await.unwrap();

        let first = sub.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        let second = sub.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(&*first.payload, b"first");
        assert_eq!(&*second.payload, b"second");
    }

    #[tokio::test(start_paused = true)]
    async fn poll_times_out_with_none() {
        let queue = InMemoryQueue::new();
        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();

        let result = sub.poll(Duration::from_millis(100)).await.unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn poll_wakes_on_publish() {
        let queue = InMemoryQueue::new();
        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();

        let publisher = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            publisher.publish(TOPIC, b"k", b"late").await.unwrap();
        });

        let message = sub.poll(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(&*message.payload, b"late");
    }

    #[tokio::test]
    async fn messages_published_before_subscribe_are_delivered() {
        let queue = InMemoryQueue::new();
        queue.publish(TOPIC, b"k", b"early").await.unwrap();

        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();
        let message = sub.poll(Duration::from_millis(10)).await.unwrap();
        assert!(message.is_some());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed_one_per_poll() {
        let queue = InMemoryQueue::new();
        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();
        queue.fail_next_polls(2);

        assert!(sub.poll(Duration::from_millis(1)).await.is_err());
        assert!(sub.poll(Duration::from_millis(1)).await.is_err());
        assert!(sub.poll(Duration::from_millis(1)).await.is_ok());
    }

    #[tokio::test]
    async fn closed_subscription_rejects_polls() {
        let queue = InMemoryQueue::new();
        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();
        sub.close().await;

        assert!(matches!(
            sub.poll(Duration::from_millis(1)).await,
            Err(QueueError::Closed)
        ));
    }

    #[tokio::test]
    async fn unacknowledged_messages_are_redelivered_to_next_subscription() {
        let queue = InMemoryQueue::new();
        let mut first = queue.subscribe(TOPIC, GROUP).await.unwrap();
        queue.publish(TOPIC, b"k", b"acked").await.unwrap();
        queue.publish(TOPIC, b"k", b"dropped").await.unwrap();
        queue.publish(TOPIC, b"k", b"unread").await.unwrap();

        let acked = first.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        first.ack(&acked).await.unwrap();
        let dropped = first.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        first.close().await;

        let mut second = queue.subscribe(TOPIC, GROUP).await.unwrap();
        let redelivered = second.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(redelivered.id, dropped.id);
        assert_eq!(&*redelivered.payload, b"dropped");
        second.ack(&redelivered).await.unwrap();

        let next = second.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        assert_eq!(&*next.payload, b"unread");
        second.ack(&next).await.unwrap();
        second.close().await;

        let mut third = queue.subscribe(TOPIC, GROUP).await.unwrap();
        assert!(third.poll(Duration::from_millis(10)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn acks_are_recorded() {
        let queue = InMemoryQueue::new();
        let mut sub = queue.subscribe(TOPIC, GROUP).await.unwrap();
        queue.publish(TOPIC, b"k", b"m").await.unwrap();

        let message = sub.poll(Duration::from_millis(10)).await.unwrap().unwrap();
        sub.ack(&message).await.unwrap();

        assert_eq!(queue.acked(), vec![message.id]);
    }
}
