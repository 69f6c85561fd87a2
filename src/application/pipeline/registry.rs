//! The shared set of live viewer sessions.
//!
//! The registry is the only owner of the set. Callers go through a fixed
//! set of operations (register, deregister, evict, fan out, close all)
//! and never touch the map directly.
//!
//! # Thread Safety
//!
//! Uses `RwLock`: fan-out takes the read lock so lookups during a
//! broadcast pass run concurrently, while registration and removal take
//! the write lock.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::RwLock;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::domain::foundation::{Timestamp, ViewerId};
use crate::domain::Payload;
use crate::ports::CloseReason;

/// Errors from registry operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The pipeline is shutting down and accepts no new sessions.
    #[error("Session registry is closed")]
    Closed,

    #[error("Viewer {0} is already registered")]
    Duplicate(ViewerId),
}

/// Close signal and liveness shared by a session's tasks and the registry.
#[derive(Debug)]
pub struct SessionControl {
    cancel: CancellationToken,
    close_reason: OnceCell<CloseReason>,
    last_liveness_ms: AtomicI64,
}

impl SessionControl {
    pub fn new() -> Self {
        Self {
            cancel: CancellationToken::new(),
            close_reason: OnceCell::new(),
            last_liveness_ms: AtomicI64::new(Timestamp::now().as_unix_millis()),
        }
    }

    /// Ask the session to close. The first reason given wins.
    pub fn close(&self, reason: CloseReason) {
        let _ = self.close_reason.set(reason);
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once [`close`](Self::close) has been called.
    pub fn closed(&self) -> WaitForCancellationFuture<'_> {
        self.cancel.cancelled()
    }

    /// Reason to put in the close frame.
    pub fn close_reason(&self) -> CloseReason {
        self.close_reason.get().copied().unwrap_or(CloseReason::Normal)
    }

    /// Record that the viewer was heard from just now.
    pub fn touch(&self) {
        self.last_liveness_ms
            .store(Timestamp::now().as_unix_millis(), Ordering::Relaxed);
    }

    pub fn last_liveness(&self) -> Timestamp {
        Timestamp::from_unix_millis(self.last_liveness_ms.load(Ordering::Relaxed))
    }
}

impl Default for SessionControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry entry: the producer end of the session's outbound buffer.
///
/// Dropping the entry drops the only sender, which closes the buffer.
struct SessionHandle {
    outbound: mpsc::Sender<Payload>,
    control: Arc<SessionControl>,
}

struct Inner {
    sessions: HashMap<ViewerId, SessionHandle>,
    closed: bool,
}

/// Outcome of one broadcast pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Sessions whose buffer accepted the payload.
    pub delivered: usize,
    /// Sessions removed because their buffer was full.
    pub evicted: usize,
}

/// The shared session set.
pub struct SessionRegistry {
    inner: RwLock<Inner>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                sessions: HashMap::new(),
                closed: false,
            }),
        }
    }

    /// Add a session. Fails once [`close_all`](Self::close_all) has run.
    pub async fn register(
        &self,
        id: ViewerId,
        outbound: mpsc::Sender<Payload>,
        control: Arc<SessionControl>,
    ) -> Result<(), RegistryError> {
        let mut inner = self.inner.write().await;
        if inner.closed {
            return Err(RegistryError::Closed);
        }
        if inner.sessions.contains_key(&id) {
            return Err(RegistryError::Duplicate(id));
        }
        inner.sessions.insert(id, SessionHandle { outbound, control });
        tracing::debug!(viewer_id = %id, sessions = inner.sessions.len(), "Session registered");
        Ok(())
    }

    /// Remove a session, closing its outbound buffer.
    ///
    /// Idempotent: returns `false` when the session was already gone.
    pub async fn deregister(&self, id: &ViewerId) -> bool {
        let removed = self.inner.write().await.sessions.remove(id);
        match removed {
            Some(_) => {
                tracing::debug!(viewer_id = %id, "Session deregistered");
                true
            }
            None => false,
        }
    }

    /// Close a session with `reason` and remove it.
    ///
    /// Idempotent like [`deregister`](Self::deregister).
    pub async fn evict(&self, id: &ViewerId, reason: CloseReason) -> bool {
        let removed = self.inner.write().await.sessions.remove(id);
        match removed {
            Some(handle) => {
                handle.control.close(reason);
                tracing::warn!(viewer_id = %id, reason = %reason, "Session evicted");
                true
            }
            None => false,
        }
    }

    /// Offer `payload` to every session without waiting.
    ///
    /// Sessions whose buffer is full are evicted as slow consumers once
    /// the pass over the set is complete; the rest still get the payload.
    pub async fn fan_out(&self, payload: &Payload) -> FanOutReport {
        let mut report = FanOutReport::default();
        let mut full = Vec::new();

        {
            let inner = self.inner.read().await;
            for (id, handle) in inner.sessions.iter() {
                match handle.outbound.try_send(payload.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => full.push(*id),
                    // Writer already gone; its driver deregisters it.
                    Err(TrySendError::Closed(_)) => {}
                }
            }
        }

        for id in full {
            if self.evict(&id, CloseReason::SlowConsumer).await {
                report.evicted += 1;
            }
        }
        report
    }

    /// Close every session with `reason`, empty the set and refuse
    /// further registrations. Returns how many sessions were closed.
    pub async fn close_all(&self, reason: CloseReason) -> usize {
        let mut inner = self.inner.write().await;
        inner.closed = true;
        let count = inner.sessions.len();
        for (_, handle) in inner.sessions.drain() {
            handle.control.close(reason);
        }
        if count > 0 {
            tracing::info!(sessions = count, reason = %reason, "Closed all sessions");
        }
        count
    }

    /// Number of registered sessions.
    pub async fn session_count(&self) -> usize {
        self.inner.read().await.sessions.len()
    }

    pub async fn contains(&self, id: &ViewerId) -> bool {
        self.inner.read().await.sessions.contains_key(id)
    }

    /// When the viewer behind `id` was last heard from.
    pub async fn last_liveness(&self, id: &ViewerId) -> Option<Timestamp> {
        self.inner
            .read()
            .await
            .sessions
            .get(id)
            .map(|handle| handle.control.last_liveness())
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.read().await.closed
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
