//! Redis Streams queue for production deployments.
//!
//! A stream is the durable log; a consumer group gives each processor
//! instance its share of it:
//! 1. `XADD` appends `{key, payload}` entries
//! 2. `XGROUP CREATE ... MKSTREAM` joins (or creates) the group
//! 3. `XREADGROUP ... COUNT 1 BLOCK <ms>` pulls one entry at a time
//! 4. `XACK` acknowledges it once the pipeline has offered it downstream
//!
//! The consumer name is stable across restarts. A new subscription first
//! re-reads entries this consumer was handed but never acknowledged
//! (`XREADGROUP ... STREAMS <topic> <last-id>` from `0`), then switches to
//! new entries (`>`).

use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::streams::{StreamId, StreamReadOptions, StreamReadReply};
use redis::{AsyncCommands, RedisError};
use std::sync::Arc;
use std::time::Duration;

use crate::ports::{QueueClient, QueueError, QueueMessage, QueueSubscription};

const KEY_FIELD: &str = "key";
const PAYLOAD_FIELD: &str = "payload";

/// Consumer name used when none is configured.
pub const DEFAULT_CONSUMER: &str = "log-processor";

/// Redis Streams implementation of the queue port.
#[derive(Clone)]
pub struct RedisStreamsQueue {
    client: redis::Client,
    conn: MultiplexedConnection,
    consumer: String,
}

impl RedisStreamsQueue {
    /// Connect and verify the server answers `PING`.
    ///
    /// An unreachable server is a fatal startup error.
    pub async fn connect(url: &str) -> Result<Self, QueueError> {
        let client = redis::Client::open(url).map_err(map_redis_error)?;
        let mut conn = client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(map_redis_error)?;

        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(map_redis_error)?;

        Ok(Self {
            client,
            conn,
            consumer: DEFAULT_CONSUMER.to_string(),
        })
    }

    /// Name this instance within its consumer groups.
    ///
    /// Instances sharing a group need distinct names; a restarted instance
    /// must keep its name to pick up its unacknowledged entries.
    pub fn with_consumer(mut self, consumer: impl Into<String>) -> Self {
        self.consumer = consumer.into();
        self
    }
}

#[async_trait]
impl QueueClient for RedisStreamsQueue {
    async fn publish(&self, topic: &str, key: &[u8], payload: &[u8]) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: String = conn
            .xadd(topic, "*", &[(KEY_FIELD.as_bytes(), key), (PAYLOAD_FIELD.as_bytes(), payload)])
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        group: &str,
    ) -> Result<Box<dyn QueueSubscription>, QueueError> {
        // Blocking reads get their own connection so they never stall publishers.
        let mut conn = self
            .client
            .get_multiplexed_tokio_connection()
            .await
            .map_err(map_redis_error)?;

        let created: Result<(), RedisError> = conn.xgroup_create_mkstream(topic, group, "0").await;
        match created {
            Ok(()) => tracing::info!(topic, group, "Created consumer group"),
            Err(e) if e.code() == Some("BUSYGROUP") => {
                tracing::debug!(topic, group, "Consumer group already exists")
            }
            Err(e) => return Err(map_redis_error(e)),
        }

        tracing::info!(topic, group, consumer = %self.consumer, "Subscribed to stream");

        Ok(Box::new(RedisStreamsSubscription {
            conn,
            topic: topic.to_string(),
            group: group.to_string(),
            consumer: self.consumer.clone(),
            position: ReadPosition::start(),
            closed: false,
        }))
    }
}

impl std::fmt::Debug for RedisStreamsQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStreamsQueue")
            .field("consumer", &self.consumer)
            .finish_non_exhaustive()
    }
}

/// Where the next `XREADGROUP` reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ReadPosition {
    /// Replaying this consumer's pending entries after the given id.
    Pending(String),
    /// Reading entries never delivered to the group.
    New,
}

impl ReadPosition {
    fn start() -> Self {
        ReadPosition::Pending("0".to_string())
    }

    fn stream_id(&self) -> &str {
        match self {
            ReadPosition::Pending(after) => after,
            ReadPosition::New => ">",
        }
    }

    /// Advance past a delivered entry, or leave the pending backlog once
    /// a replay read comes back empty.
    fn advance(&mut self, delivered: Option<&str>) {
        if self.is_replaying() {
            *self = match delivered {
                Some(id) => ReadPosition::Pending(id.to_string()),
                None => ReadPosition::New,
            };
        }
    }

    fn is_replaying(&self) -> bool {
        matches!(self, ReadPosition::Pending(_))
    }
}

struct RedisStreamsSubscription {
    conn: MultiplexedConnection,
    topic: String,
    group: String,
    consumer: String,
    position: ReadPosition,
    closed: bool,
}

#[async_trait]
impl QueueSubscription for RedisStreamsSubscription {
    async fn poll(&mut self, timeout: Duration) -> Result<Option<QueueMessage>, QueueError> {
        if self.closed {
            return Err(QueueError::Closed);
        }

        loop {
            let replaying = self.position.is_replaying();
            let options = StreamReadOptions::default()
                .group(&self.group, &self.consumer)
                .count(1)
                .block(timeout.as_millis().max(1) as usize);

            let reply: Option<StreamReadReply> = self
                .conn
                .xread_options(&[&self.topic], &[self.position.stream_id()], &options)
                .await
                .map_err(map_redis_error)?;

            let entry = reply
                .into_iter()
                .flat_map(|r| r.keys)
                .flat_map(|k| k.ids)
                .next();
            self.position.advance(entry.as_ref().map(|e| e.id.as_str()));

            match entry {
                Some(entry) => {
                    if replaying {
                        tracing::info!(id = %entry.id, "Redelivering unacknowledged entry");
                    }
                    return decode_entry(entry).map(Some);
                }
                // Backlog exhausted; the next read blocks for new entries.
                None if replaying => continue,
                None => return Ok(None),
            }
        }
    }

    async fn ack(&mut self, message: &QueueMessage) -> Result<(), QueueError> {
        if self.closed {
            return Err(QueueError::Closed);
        }
        let _: i64 = self
            .conn
            .xack(&self.topic, &self.group, &[&message.id])
            .await
            .map_err(map_redis_error)?;
        Ok(())
    }

    async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            tracing::info!(
                topic = %self.topic,
                consumer = %self.consumer,
                "Stream subscription closed"
            );
        }
    }
}

fn decode_entry(entry: StreamId) -> Result<QueueMessage, QueueError> {
    let payload: Vec<u8> = entry.get(PAYLOAD_FIELD).ok_or_else(|| {
        QueueError::Protocol(format!("stream entry {} has no payload field", entry.id))
    })?;
    let key: Vec<u8> = entry.get(KEY_FIELD).unwrap_or_default();

    Ok(QueueMessage {
        id: entry.id,
        key,
        payload: Arc::from(payload),
    })
}

fn map_redis_error(e: RedisError) -> QueueError {
    if e.is_io_error() || e.is_connection_refusal() || e.is_connection_dropped() || e.is_timeout()
    {
        QueueError::Unavailable(e.to_string())
    } else {
        QueueError::Protocol(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    // Note: Redis integration tests require a running Redis instance
    // and are run separately from unit tests.

    use super::*;

    #[tokio::test]
    async fn connect_to_invalid_url_fails() {
        let result = RedisStreamsQueue::connect("not-a-redis-url").await;
        assert!(result.is_err());
    }

    #[test]
    fn parse_errors_are_protocol_errors() {
        let err = RedisError::from((redis::ErrorKind::TypeError, "unexpected reply"));
        assert!(matches!(map_redis_error(err), QueueError::Protocol(_)));
    }

    #[test]
    fn replay_starts_at_the_pending_backlog() {
        let position = ReadPosition::start();
        assert!(position.is_replaying());
        assert_eq!(position.stream_id(), "0");
    }

    #[test]
    fn replay_walks_past_each_redelivered_entry() {
        let mut position = ReadPosition::start();
        position.advance(Some("1700000000000-0"));
        assert_eq!(position.stream_id(), "1700000000000-0");
        position.advance(Some("1700000000001-3"));
        assert_eq!(position.stream_id(), "1700000000001-3");
        assert!(position.is_replaying());
    }

    #[test]
    fn empty_replay_switches_to_new_entries() {
        let mut position = ReadPosition::start();
        position.advance(Some("5-0"));
        position.advance(None);
        assert_eq!(position, ReadPosition::New);
        assert_eq!(position.stream_id(), ">");

        position.advance(Some("6-0"));
        assert_eq!(position, ReadPosition::New);
    }

    #[test]
    fn entries_without_payload_are_protocol_errors() {
        let entry = StreamId {
            id: "1-0".to_string(),
            map: std::collections::HashMap::new(),
        };
        assert!(matches!(decode_entry(entry), Err(QueueError::Protocol(_))));
    }

    #[test]
    fn entries_decode_key_and_payload() {
        let mut map = std::collections::HashMap::new();
        map.insert(KEY_FIELD.to_string(), redis::Value::Data(b"svc".to_vec()));
        map.insert(PAYLOAD_FIELD.to_string(), redis::Value::Data(b"{}".to_vec()));
        let message = decode_entry(StreamId {
            id: "2-0".to_string(),
            map,
        })
        .unwrap();

        assert_eq!(message.id, "2-0");
        assert_eq!(message.key, b"svc");
        assert_eq!(&*message.payload, b"{}");
    }

    #[test]
    fn io_errors_are_unavailable() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = RedisError::from(io);
        assert!(matches!(map_redis_error(err), QueueError::Unavailable(_)));
    }
}
