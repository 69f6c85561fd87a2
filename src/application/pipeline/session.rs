//! Viewer session lifecycle.
//!
//! One [`ViewerSession`] drives one connection through
//! `Connecting → Active → Draining → Closed`:
//!
//! 1. A bounded outbound buffer is created and the welcome event queued
//! 2. The session is registered (the buffer's sender goes to the registry)
//! 3. A writer task drains the buffer to the sink and pings on a fixed beat
//! 4. The driver reads inbound frames until the viewer goes quiet or away
//! 5. The session is deregistered, the writer closes the sink and exits
//!
//! The registry may evict or close the session at any time; both paths
//! converge on [`SessionControl::close`] and the same teardown.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::domain::foundation::{SessionState, StateMachine, ViewerId};
use crate::domain::{LogEvent, Payload};
use crate::ports::{CloseReason, InboundFrame, PushSink, PushStream};

use super::registry::{SessionControl, SessionRegistry};
use super::stats::PipelineStats;

/// Service name carried by the welcome event.
pub const SERVICE_NAME: &str = "log-processor";

/// Upper bound on writing a close frame to a viewer that stopped reading.
const CLOSE_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Per-session tuning.
#[derive(Debug, Clone, Copy)]
pub struct SessionSettings {
    pub buffer_capacity: usize,
    pub ping_interval: Duration,
    pub read_deadline: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: 256,
            ping_interval: Duration::from_secs(54),
            read_deadline: Duration::from_secs(60),
        }
    }
}

/// Why the reader stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderExit {
    /// No inbound frame within the read deadline.
    DeadlineExpired,
    /// The viewer hung up or sent a close frame.
    Disconnected,
    ReadError(String),
    /// The session was closed from outside (eviction or shutdown).
    Closed,
}

/// One viewer connection.
pub struct ViewerSession {
    id: ViewerId,
    state: SessionState,
    registry: Arc<SessionRegistry>,
    stats: Arc<PipelineStats>,
    settings: SessionSettings,
}

impl ViewerSession {
    pub fn new(
        registry: Arc<SessionRegistry>,
        stats: Arc<PipelineStats>,
        settings: SessionSettings,
    ) -> Self {
        Self {
            id: ViewerId::new(),
            state: SessionState::Connecting,
            registry,
            stats,
            settings,
        }
    }

    pub fn id(&self) -> ViewerId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Drive the session until it is closed. Returns the final state.
    pub async fn run<S, R>(mut self, mut sink: S, stream: R) -> SessionState
    where
        S: PushSink + 'static,
        R: PushStream + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(self.settings.buffer_capacity);
        let control = Arc::new(SessionControl::new());

        // Queued before registration so it precedes every broadcast.
        match LogEvent::welcome(SERVICE_NAME).to_payload() {
            Ok(welcome) => {
                if let Err(e) = outbound_tx.try_send(welcome) {
                    tracing::debug!(viewer_id = %self.id, error = %e, "Welcome not queued");
                }
            }
            Err(e) => tracing::warn!(viewer_id = %self.id, error = %e, "Failed to encode welcome"),
        }

        if let Err(e) = self
            .registry
            .register(self.id, outbound_tx, control.clone())
            .await
        {
            tracing::info!(viewer_id = %self.id, error = %e, "Session refused");
            let _ = time::timeout(CLOSE_WRITE_TIMEOUT, sink.close(CloseReason::Shutdown)).await;
            self.transition(SessionState::Closed);
            return self.state;
        }

        self.transition(SessionState::Active);
        self.stats.sessions_opened.incr();

        let writer = tokio::spawn(run_writer(
            self.id,
            sink,
            outbound_rx,
            control.clone(),
            self.settings.ping_interval,
        ));

        let exit = run_reader(stream, &control, self.settings.read_deadline).await;
        tracing::debug!(viewer_id = %self.id, exit = ?exit, "Reader stopped");

        self.transition(SessionState::Draining);
        self.registry.deregister(&self.id).await;
        control.close(CloseReason::Normal);

        if let Err(e) = writer.await {
            tracing::error!(viewer_id = %self.id, error = %e, "Writer task failed");
        }

        self.transition(SessionState::Closed);
        self.stats.sessions_closed.incr();
        tracing::info!(
            viewer_id = %self.id,
            reason = %control.close_reason(),
            "Viewer disconnected"
        );
        self.state
    }

    fn transition(&mut self, target: SessionState) {
        match self.state.transition_to(target) {
            Ok(next) => {
                tracing::debug!(viewer_id = %self.id, from = %self.state, to = %next, "Session state");
                self.state = next;
            }
            Err(e) => tracing::error!(viewer_id = %self.id, error = %e, "Invalid session transition"),
        }
    }
}

enum WriterEvent {
    Closed,
    Payload(Payload),
    BufferClosed,
    PingDue,
}

/// Drain the outbound buffer to the sink, pinging every `ping_interval`
/// whether or not data was written in between.
///
/// Every write races the session's closure, so a stalled viewer never
/// pins the writer. Always cancels the session's control on exit so the
/// reader stops too.
async fn run_writer<S: PushSink>(
    id: ViewerId,
    mut sink: S,
    mut outbound: mpsc::Receiver<Payload>,
    control: Arc<SessionControl>,
    ping_interval: Duration,
) {
    let mut ping = time::interval_at(Instant::now() + ping_interval, ping_interval);
    ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let event = tokio::select! {
            biased;
            _ = control.closed() => WriterEvent::Closed,
            next = outbound.recv() => match next {
                Some(payload) => WriterEvent::Payload(payload),
                None => WriterEvent::BufferClosed,
            },
            _ = ping.tick() => WriterEvent::PingDue,
        };

        match event {
            WriterEvent::Closed | WriterEvent::BufferClosed => {
                close_sink(id, &mut sink, control.close_reason()).await;
                break;
            }
            WriterEvent::Payload(payload) => {
                let written = tokio::select! {
                    biased;
                    _ = control.closed() => None,
                    result = sink.send_text(&payload) => Some(result),
                };
                match written {
                    None => {
                        close_sink(id, &mut sink, control.close_reason()).await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(viewer_id = %id, error = %e, "Write failed");
                        break;
                    }
                    Some(Ok(())) => {}
                }
            }
            WriterEvent::PingDue => {
                let pinged = tokio::select! {
                    biased;
                    _ = control.closed() => None,
                    result = sink.ping() => Some(result),
                };
                match pinged {
                    None => {
                        close_sink(id, &mut sink, control.close_reason()).await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::debug!(viewer_id = %id, error = %e, "Ping failed");
                        break;
                    }
                    Some(Ok(())) => {}
                }
            }
        }
    }

    control.close(CloseReason::Normal);
}

async fn close_sink<S: PushSink>(id: ViewerId, sink: &mut S, reason: CloseReason) {
    match time::timeout(CLOSE_WRITE_TIMEOUT, sink.close(reason)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::debug!(viewer_id = %id, error = %e, "Close frame not delivered"),
        Err(_) => tracing::debug!(viewer_id = %id, "Close frame timed out"),
    }
}

/// Read until the viewer disconnects, errors, goes quiet past the
/// deadline, or the session is closed. Inbound content is ignored.
async fn run_reader<R: PushStream>(
    mut stream: R,
    control: &SessionControl,
    read_deadline: Duration,
) -> ReaderExit {
    loop {
        let received = tokio::select! {
            biased;
            _ = control.closed() => return ReaderExit::Closed,
            received = time::timeout(read_deadline, stream.receive()) => received,
        };

        match received {
            Err(_) => return ReaderExit::DeadlineExpired,
            Ok(None) => return ReaderExit::Disconnected,
            Ok(Some(Err(e))) => return ReaderExit::ReadError(e.to_string()),
            Ok(Some(Ok(InboundFrame::Close))) => {
                control.touch();
                return ReaderExit::Disconnected;
            }
            Ok(Some(Ok(_))) => control.touch(),
        }
    }
}
