//! In-memory push channel for testing.
//!
//! [`in_memory_channel`] returns the server-side halves plus a
//! [`ViewerEndpoint`] that plays the remote viewer: it observes every
//! outbound frame and can send frames, stall, break, or hang up.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};

use crate::ports::{CloseReason, InboundFrame, PushSink, PushStream, TransportError};

/// A frame as observed by the remote viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundFrame {
    Text(String),
    Ping,
    Close(CloseReason),
}

impl OutboundFrame {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            OutboundFrame::Text(text) => Some(text),
            _ => None,
        }
    }
}

/// Build a connected sink/stream pair and the viewer that drives it.
pub fn in_memory_channel() -> (InMemorySink, InMemoryStream, ViewerEndpoint) {
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (paused_tx, paused_rx) = watch::channel(false);
    let broken = Arc::new(AtomicBool::new(false));

    let sink = InMemorySink {
        outbound: out_tx,
        paused: paused_rx,
        broken: broken.clone(),
        closed: false,
    };
    let stream = InMemoryStream { inbound: in_rx };
    let endpoint = ViewerEndpoint {
        outbound: out_rx,
        inbound: Some(in_tx),
        paused: paused_tx,
        broken,
    };
    (sink, stream, endpoint)
}

/// Server-side outbound half.
pub struct InMemorySink {
    outbound: mpsc::UnboundedSender<OutboundFrame>,
    paused: watch::Receiver<bool>,
    broken: Arc<AtomicBool>,
    closed: bool,
}

impl InMemorySink {
    async fn write(&mut self, frame: OutboundFrame) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::Closed);
        }
        // A stalled viewer blocks the write until resumed.
        let _ = self.paused.wait_for(|paused| !*paused).await;
        if self.broken.load(Ordering::SeqCst) {
            return Err(TransportError::Write("connection reset".to_string()));
        }
        self.outbound
            .send(frame)
            .map_err(|_| TransportError::Write("viewer gone".to_string()))
    }
}

#[async_trait]
impl PushSink for InMemorySink {
    async fn send_text(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        let text = String::from_utf8_lossy(payload).into_owned();
        self.write(OutboundFrame::Text(text)).await
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.write(OutboundFrame::Ping).await
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let result = self.write(OutboundFrame::Close(reason)).await;
        self.closed = true;
        result
    }
}

/// Server-side inbound half.
pub struct InMemoryStream {
    inbound: mpsc::UnboundedReceiver<Result<InboundFrame, TransportError>>,
}

#[async_trait]
impl PushStream for InMemoryStream {
    async fn receive(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        self.inbound.recv().await
    }
}

/// The remote end of an in-memory viewer connection.
pub struct ViewerEndpoint {
    outbound: mpsc::UnboundedReceiver<OutboundFrame>,
    inbound: Option<mpsc::UnboundedSender<Result<InboundFrame, TransportError>>>,
    paused: watch::Sender<bool>,
    broken: Arc<AtomicBool>,
}

impl ViewerEndpoint {
    /// Next frame written by the server; `None` once the sink is dropped.
    pub async fn next_frame(&mut self) -> Option<OutboundFrame> {
        self.outbound.recv().await
    }

    /// A frame already written, without waiting.
    pub fn try_next_frame(&mut self) -> Option<OutboundFrame> {
        self.outbound.try_recv().ok()
    }

    /// Read frames until the server side is dropped.
    pub async fn collect_until_closed(&mut self) -> Vec<OutboundFrame> {
        let mut frames = Vec::new();
        while let Some(frame) = self.outbound.recv().await {
            frames.push(frame);
        }
        frames
    }

    /// Send a frame to the server, as a viewer pong or stray message would.
    pub fn send(&self, frame: InboundFrame) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Ok(frame));
        }
    }

    /// Inject a read failure.
    pub fn send_error(&self, error: TransportError) {
        if let Some(tx) = &self.inbound {
            let _ = tx.send(Err(error));
        }
    }

    /// Hang up: the server's stream ends.
    pub fn disconnect(&mut self) {
        self.inbound = None;
    }

    /// Stop reading: server writes block until [`resume`](Self::resume).
    pub fn stall(&self) {
        let _ = self.paused.send(true);
    }

    pub fn resume(&self) {
        let _ = self.paused.send(false);
    }

    /// Make every following server write fail.
    pub fn break_writes(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn frames_flow_both_ways() {
        let (mut sink, mut stream, mut viewer) = in_memory_channel();

        sink.send_text(b"hello").await.unwrap();
        sink.ping().await.unwrap();
        assert_eq!(viewer.next_frame().await, Some(OutboundFrame::Text("hello".into())));
        assert_eq!(viewer.next_frame().await, Some(OutboundFrame::Ping));

        viewer.send(InboundFrame::Pong);
        assert_eq!(stream.receive().await, Some(Ok(InboundFrame::Pong)));

        viewer.disconnect();
        assert_eq!(stream.receive().await, None);
    }

    #[tokio::test]
    async fn close_ends_further_writes() {
        let (mut sink, _stream, mut viewer) = in_memory_channel();

        sink.close(CloseReason::Shutdown).await.unwrap();
        assert_eq!(
            viewer.next_frame().await,
            Some(OutboundFrame::Close(CloseReason::Shutdown))
        );
        assert_eq!(sink.ping().await, Err(TransportError::Closed));
    }

    #[tokio::test]
    async fn broken_writes_fail() {
        let (mut sink, _stream, viewer) = in_memory_channel();
        viewer.break_writes();
        assert!(matches!(sink.send_text(b"x").await, Err(TransportError::Write(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_viewer_blocks_writes() {
        let (mut sink, _stream, mut viewer) = in_memory_channel();
        viewer.stall();

        let blocked = tokio::time::timeout(Duration::from_secs(1), sink.send_text(b"x")).await;
        assert!(blocked.is_err());
        assert!(viewer.try_next_frame().is_none());

        viewer.resume();
        sink.send_text(b"y").await.unwrap();
        assert_eq!(viewer.next_frame().await, Some(OutboundFrame::Text("y".into())));
    }
}
