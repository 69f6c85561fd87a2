//! Ingest loop - the single consumer of the queue subscription.
//!
//! Messages are processed strictly in arrival order. Every consumed
//! payload is offered to the indexer and then to the broadcast queue
//! before the next poll; neither offer ever blocks.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;

use crate::domain::Payload;
use crate::ports::{QueueError, QueueMessage, QueueSubscription};

use super::indexer::Indexer;
use super::stats::PipelineStats;

/// Pulls messages off the queue until cancelled.
pub struct IngestLoop {
    subscription: Box<dyn QueueSubscription>,
    indexer: Arc<Indexer>,
    broadcast: mpsc::Sender<Payload>,
    poll_timeout: Duration,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
}

impl IngestLoop {
    pub fn new(
        subscription: Box<dyn QueueSubscription>,
        indexer: Arc<Indexer>,
        broadcast: mpsc::Sender<Payload>,
        poll_timeout: Duration,
        stats: Arc<PipelineStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            subscription,
            indexer,
            broadcast,
            poll_timeout,
            stats,
            cancel,
        }
    }

    /// Run until cancelled or the subscription is closed.
    ///
    /// Consumes the loop, dropping its broadcast sender, and hands the
    /// subscription back so the caller can close it.
    pub async fn run(mut self) -> Box<dyn QueueSubscription> {
        tracing::info!(poll_timeout_ms = self.poll_timeout.as_millis() as u64, "Ingest loop started");

        loop {
            let polled = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                polled = self.subscription.poll(self.poll_timeout) => polled,
            };

            match polled {
                Ok(None) => continue,
                Ok(Some(message)) => self.handle(message).await,
                Err(QueueError::Closed) => {
                    tracing::warn!("Subscription closed, ingest loop stopping");
                    break;
                }
                Err(e) => {
                    self.stats.poll_errors.incr();
                    tracing::warn!(error = %e, "Queue poll failed");
                    // Keep a dead broker from turning the loop into a spin.
                    tokio::select! {
                        biased;
                        _ = self.cancel.cancelled() => break,
                        _ = tokio::time::sleep(self.poll_timeout) => {}
                    }
                }
            }
        }

        tracing::info!(consumed = self.stats.consumed.get(), "Ingest loop stopped");
        drop(self.broadcast);
        self.subscription
    }

    async fn handle(&mut self, message: QueueMessage) {
        self.stats.consumed.incr();

        self.indexer.dispatch(message.payload.clone());

        match self.broadcast.try_send(message.payload.clone()) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                self.stats.broadcast_overflow.incr();
                tracing::warn!(message_id = %message.id, "Broadcast queue full, dropping message");
            }
            Err(TrySendError::Closed(_)) => {
                tracing::warn!(message_id = %message.id, "Broadcast queue closed, dropping message");
            }
        }

        if let Err(e) = self.subscription.ack(&message).await {
            self.stats.ack_errors.incr();
            tracing::warn!(message_id = %message.id, error = %e, "Failed to acknowledge message");
        }
    }
}
