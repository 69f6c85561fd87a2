//! WebSocket implementation of the push channel ports.

use std::borrow::Cow;

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};

use crate::ports::{CloseReason, InboundFrame, PushSink, PushStream, TransportError};

/// Split an upgraded socket into its outbound and inbound halves.
pub fn split_socket(socket: WebSocket) -> (WsSink, WsStream) {
    let (sender, receiver) = socket.split();
    (WsSink { inner: sender }, WsStream { inner: receiver })
}

/// Outbound half of an upgraded WebSocket.
pub struct WsSink {
    inner: SplitSink<WebSocket, Message>,
}

#[async_trait]
impl PushSink for WsSink {
    async fn send_text(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        // Payloads are forwarded verbatim; producers publish UTF-8 JSON.
        let text = String::from_utf8_lossy(payload).into_owned();
        self.inner
            .send(Message::Text(text))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.inner
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }

    async fn close(&mut self, reason: CloseReason) -> Result<(), TransportError> {
        let frame = CloseFrame {
            code: reason.code(),
            reason: Cow::Borrowed(reason.as_str()),
        };
        self.inner
            .send(Message::Close(Some(frame)))
            .await
            .map_err(|e| TransportError::Write(e.to_string()))?;
        self.inner
            .close()
            .await
            .map_err(|e| TransportError::Write(e.to_string()))
    }
}

/// Inbound half of an upgraded WebSocket.
pub struct WsStream {
    inner: SplitStream<WebSocket>,
}

#[async_trait]
impl PushStream for WsStream {
    async fn receive(&mut self) -> Option<Result<InboundFrame, TransportError>> {
        let message = self.inner.next().await?;
        Some(
            message
                .map(|msg| match msg {
                    Message::Text(text) => InboundFrame::Text(text),
                    Message::Binary(bytes) => InboundFrame::Binary(bytes),
                    Message::Ping(_) => InboundFrame::Ping,
                    Message::Pong(_) => InboundFrame::Pong,
                    Message::Close(_) => InboundFrame::Close,
                })
                .map_err(|e| TransportError::Read(e.to_string())),
        )
    }
}
