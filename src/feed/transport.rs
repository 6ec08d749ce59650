// src/feed/transport.rs

//! The transport seam between the subscription state machine and the wire.
//!
//! The state machine is written against [`Transport`] and [`Connector`] so
//! the same logic runs over a real WebSocket in production and over a
//! channel-backed fake in tests. [`WsConnector`] is the production
//! implementation, addressing the per-instrument endpoints the backend
//! exposes.

use crate::feed::types::{InstrumentId, SensorId};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

/// Errors surfaced by a transport. Carried as strings so the trait does not
/// leak any specific wire library's error type.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The handshake never completed.
    #[error("connect failed: {0}")]
    Connect(String),
    /// An outbound send failed on an established transport.
    #[error("send failed: {0}")]
    Send(String),
    /// The established transport errored while receiving.
    #[error("receive failed: {0}")]
    Recv(String),
}

/// One established, bidirectional text-message connection.
#[async_trait]
pub trait Transport: Send {
    /// Send one text message to the peer.
    async fn send(&mut self, text: String) -> Result<(), TransportError>;

    /// Receive the next text message.
    ///
    /// `None` means the peer closed the connection; `Some(Err(_))` means the
    /// transport failed. Either way the transport is done and the caller
    /// decides whether to reconnect.
    async fn recv(&mut self) -> Option<Result<String, TransportError>>;

    /// Close the transport gracefully. Best effort; errors are ignored.
    async fn close(&mut self);
}

/// Factory for [`Transport`]s. A subscription holds one connector and calls
/// it again on every reconnect, so the connector must be reusable.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// The transport type this connector produces.
    type Transport: Transport;

    /// Perform the handshake and return an established transport.
    async fn connect(&self) -> Result<Self::Transport, TransportError>;
}

// ---------------------------------------------------------------------------
// WebSocket implementation
// ---------------------------------------------------------------------------

/// [`Connector`] for the backend's WebSocket endpoints.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Connector for an arbitrary WebSocket URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The acquisition feed for one instrument (`/ws/data/{id}/`). This is
    /// the feed that accepts the disconnect command.
    pub fn data_feed(host: &str, instrument_id: InstrumentId) -> Self {
        Self::new(format!("ws://{host}/ws/data/{instrument_id}/"))
    }

    /// The read-only listener feed for every sensor of one instrument
    /// (`/ws/listener/{id}/`).
    pub fn listener_feed(host: &str, instrument_id: InstrumentId) -> Self {
        Self::new(format!("ws://{host}/ws/listener/{instrument_id}/"))
    }

    /// The read-only listener feed for a single sensor
    /// (`/ws/listener/{id}/sensor/{sensor_id}/`).
    pub fn sensor_feed(host: &str, instrument_id: InstrumentId, sensor_id: SensorId) -> Self {
        Self::new(format!(
            "ws://{host}/ws/listener/{instrument_id}/sensor/{sensor_id}/"
        ))
    }

    /// The endpoint this connector dials.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    type Transport = WsTransport;

    async fn connect(&self) -> Result<WsTransport, TransportError> {
        debug!(url = %self.url, "Opening WebSocket connection");
        let (stream, _response) = connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(WsTransport { inner: stream })
    }
}

/// [`Transport`] over a tungstenite WebSocket stream.
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), TransportError> {
        self.inner
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| TransportError::Send(e.to_string()))
    }

    async fn recv(&mut self) -> Option<Result<String, TransportError>> {
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => return None,
                // Control and binary frames are not part of the telemetry
                // protocol; skip them and keep reading.
                Ok(_) => continue,
                Err(e) => return Some(Err(TransportError::Recv(e.to_string()))),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}

// ---------------------------------------------------------------------------
// Channel-backed fake for tests
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls() {
        assert_eq!(
            WsConnector::data_feed("dash.local", 3).url(),
            "ws://dash.local/ws/data/3/"
        );
        assert_eq!(
            WsConnector::listener_feed("dash.local", 3).url(),
            "ws://dash.local/ws/listener/3/"
        );
        assert_eq!(
            WsConnector::sensor_feed("dash.local", 3, 12).url(),
            "ws://dash.local/ws/listener/3/sensor/12/"
        );
    }
}
