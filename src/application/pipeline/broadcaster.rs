//! Broadcaster - the single consumer of the broadcast queue.
//!
//! Each payload is offered to every registered session in one pass.
//! The loop ends when the queue is closed (every sender dropped) or when
//! the pipeline is cancelled.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::domain::Payload;

use super::registry::SessionRegistry;
use super::stats::PipelineStats;

pub struct Broadcaster {
    queue: mpsc::Receiver<Payload>,
    registry: Arc<SessionRegistry>,
    stats: Arc<PipelineStats>,
    cancel: CancellationToken,
}

impl Broadcaster {
    pub fn new(
        queue: mpsc::Receiver<Payload>,
        registry: Arc<SessionRegistry>,
        stats: Arc<PipelineStats>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            queue,
            registry,
            stats,
            cancel,
        }
    }

    /// Fan payloads out until the queue closes. Returns how many were broadcast.
    pub async fn run(mut self) -> u64 {
        let mut broadcasts = 0u64;

        loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = self.queue.recv() => next,
            };
            let Some(payload) = next else {
                break;
            };

            let report = self.registry.fan_out(&payload).await;
            broadcasts += 1;
            if report.evicted > 0 {
                self.stats.sessions_evicted.add(report.evicted as u64);
            }
            tracing::trace!(
                delivered = report.delivered,
                evicted = report.evicted,
                "Broadcast payload"
            );
        }

        self.queue.close();
        tracing::info!(broadcasts, "Broadcaster stopped");
        broadcasts
    }
}
