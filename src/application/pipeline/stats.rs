//! Pipeline counters.
//!
//! Every counter only ever grows. The health surface and shutdown report
//! read them through [`PipelineStats::snapshot`].

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// A monotonically increasing event count.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    pub fn incr(&self) {
        self.add(1);
    }

    pub fn add(&self, n: u64) {
        self.0.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// Shared counters updated by every pipeline task.
#[derive(Debug, Default)]
pub struct PipelineStats {
    /// Messages taken off the queue.
    pub consumed: Counter,
    /// Failed queue polls.
    pub poll_errors: Counter,
    /// Failed acknowledgements.
    pub ack_errors: Counter,
    /// Messages dropped because the broadcast queue was full.
    pub broadcast_overflow: Counter,
    /// Documents written to the index store.
    pub indexed: Counter,
    /// Index writes that failed.
    pub index_failures: Counter,
    /// Payloads that were not valid log events.
    pub malformed: Counter,
    /// Payloads skipped because every index worker was busy.
    pub index_saturated: Counter,
    pub sessions_opened: Counter,
    pub sessions_closed: Counter,
    /// Sessions closed because their outbound buffer was full.
    pub sessions_evicted: Counter,
}

impl PipelineStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            consumed: self.consumed.get(),
            poll_errors: self.poll_errors.get(),
            ack_errors: self.ack_errors.get(),
            broadcast_overflow: self.broadcast_overflow.get(),
            indexed: self.indexed.get(),
            index_failures: self.index_failures.get(),
            malformed: self.malformed.get(),
            index_saturated: self.index_saturated.get(),
            sessions_opened: self.sessions_opened.get(),
            sessions_closed: self.sessions_closed.get(),
            sessions_evicted: self.sessions_evicted.get(),
        }
    }
}

/// Point-in-time copy of [`PipelineStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub consumed: u64,
    pub poll_errors: u64,
    pub ack_errors: u64,
    pub broadcast_overflow: u64,
    pub indexed: u64,
    pub index_failures: u64,
    pub malformed: u64,
    pub index_saturated: u64,
    pub sessions_opened: u64,
    pub sessions_closed: u64,
    pub sessions_evicted: u64,
}
