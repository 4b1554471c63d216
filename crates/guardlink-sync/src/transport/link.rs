//! Link abstraction over the relay connection.
//!
//! [`RelayLink`] is one established duplex connection carrying wire frames;
//! [`LinkConnector`] dials the relay and produces links. The production
//! implementation speaks WebSocket via `tokio-tungstenite`; tests inject
//! scripted connectors to simulate drops and reconnects deterministically.

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use guardlink_core::TransportError;

use crate::wire::WireFrame;

/// One established duplex connection to the relay.
#[async_trait]
pub trait RelayLink: Send {
    /// Transmits a frame.
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError>;

    /// Receives the next frame.
    ///
    /// Returns `None` when the peer closed the connection cleanly, and
    /// `Some(Err(_))` on a receive failure. Control frames are handled
    /// below this interface and never surface here.
    async fn next_frame(&mut self) -> Option<Result<WireFrame, TransportError>>;

    /// Closes the connection. Errors during close are ignored; the link is
    /// unusable afterwards either way.
    async fn close(&mut self);
}

/// Dials the relay endpoint and yields an established link.
#[async_trait]
pub trait LinkConnector: Send + Sync {
    /// Opens a connection to the endpoint.
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn RelayLink>, TransportError>;
}

/// WebSocket connector backed by `tokio-tungstenite`.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketConnector;

#[async_trait]
impl LinkConnector for WebSocketConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn RelayLink>, TransportError> {
        let (stream, response) = connect_async(endpoint.as_str())
            .await
            .map_err(|e| TransportError::connect_failed(endpoint.as_str(), e))?;

        tracing::debug!(
            endpoint = %endpoint,
            status = %response.status(),
            "WebSocket connection established"
        );

        Ok(Box::new(WebSocketLink { stream }))
    }
}

/// A live WebSocket connection.
pub struct WebSocketLink {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl RelayLink for WebSocketLink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        let message = match frame {
            WireFrame::Text(text) => Message::Text(text),
            WireFrame::Binary(bytes) => Message::Binary(bytes),
        };
        self.stream
            .send(message)
            .await
            .map_err(|e| TransportError::send_failed(e))
    }

    async fn next_frame(&mut self) -> Option<Result<WireFrame, TransportError>> {
        loop {
            return match self.stream.next().await? {
                Ok(Message::Text(text)) => Some(Ok(WireFrame::Text(text))),
                Ok(Message::Binary(bytes)) => Some(Ok(WireFrame::Binary(bytes))),
                Ok(Message::Ping(data)) => {
                    // Pong is queued automatically by tungstenite on read.
                    tracing::trace!(len = data.len(), "Received ping");
                    continue;
                }
                Ok(Message::Pong(_)) => {
                    tracing::trace!("Received pong");
                    continue;
                }
                Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => None,
                Err(e) => Some(Err(TransportError::receive_failed(e))),
            };
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.stream.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
    }
}
