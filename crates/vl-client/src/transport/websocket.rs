//! Websocket connector
//!
//! Opens the persistent connection to the tracking server and runs one pump
//! task per connection that moves frames between the socket and the session.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::SEC_WEBSOCKET_PROTOCOL;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use vl_core::error::TransportError;
use vl_core::traits::{Connector, Link};
use vl_core::{Endpoint, SessionEvent};
use vl_protocol::InboundFrame;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Channel capacity for events from the socket pump.
///
/// The tracking server pushes at most one state frame per polled render
/// frame, so a few seconds of 72 Hz traffic fit comfortably.
const SOCKET_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Connects sessions over `tokio-tungstenite`
#[derive(Debug, Clone)]
pub struct WsConnector {
    event_capacity: usize,
}

impl WsConnector {
    /// Create a connector with the default event buffer
    pub fn new() -> Self {
        Self {
            event_capacity: SOCKET_EVENT_CHANNEL_CAPACITY,
        }
    }
}

impl Default for WsConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(
        &self,
        endpoint: &Endpoint,
        subprotocols: &[String],
    ) -> Result<Link, TransportError> {
        let url = endpoint.url();
        let mut request =
            url.as_str()
                .into_client_request()
                .map_err(|e| TransportError::InvalidEndpoint {
                    endpoint: url.clone(),
                    reason: e.to_string(),
                })?;

        if !subprotocols.is_empty() {
            let offered = HeaderValue::from_str(&subprotocols.join(", ")).map_err(|e| {
                TransportError::InvalidEndpoint {
                    endpoint: url.clone(),
                    reason: format!("invalid subprotocol list: {}", e),
                }
            })?;
            request.headers_mut().insert(SEC_WEBSOCKET_PROTOCOL, offered);
        }

        tracing::debug!("Connecting to {}", url);
        let (ws, response) = connect_async(request).await.map_err(map_connect_error)?;

        let negotiated = response
            .headers()
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");
        tracing::debug!("Handshake with {} complete (subprotocol: {})", url, negotiated);

        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(self.event_capacity);
        tokio::spawn(pump_socket(ws, outbound_rx, event_tx));

        Ok(Link::new(outbound_tx, event_rx))
    }
}

fn map_connect_error(error: tungstenite::Error) -> TransportError {
    match error {
        tungstenite::Error::Io(e) => TransportError::Connect(e.to_string()),
        tungstenite::Error::Http(response) => {
            TransportError::Handshake(format!("server answered HTTP {}", response.status()))
        }
        tungstenite::Error::Url(e) => TransportError::Handshake(e.to_string()),
        other => TransportError::Handshake(other.to_string()),
    }
}

/// Move frames between the socket and the session until either side stops.
///
/// Always finishes by reporting exactly one `Closed` event.
async fn pump_socket(
    ws: WsStream,
    mut outbound: mpsc::UnboundedReceiver<String>,
    events: mpsc::Sender<SessionEvent>,
) {
    let (mut sink, mut stream) = ws.split();

    let reason = loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(text) => {
                    if let Err(e) = sink.send(Message::text(text)).await {
                        let _ = events.send(SessionEvent::Error(e.to_string())).await;
                        break None;
                    }
                }
                None => {
                    // Session dropped its writer: close from our side
                    tracing::debug!("Outbound channel closed, closing socket");
                    let _ = sink.close().await;
                    break Some("closed by client".to_string());
                }
            },

            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let event = SessionEvent::Frame(InboundFrame::Text(text.as_str().to_owned()));
                    if events.send(event).await.is_err() {
                        break None;
                    }
                }
                Some(Ok(Message::Binary(data))) => {
                    let event = SessionEvent::Frame(InboundFrame::Binary(data));
                    if events.send(event).await.is_err() {
                        break None;
                    }
                }
                Some(Ok(Message::Close(frame))) => {
                    break frame.map(|f| f.reason.as_str().to_owned());
                }
                Some(Ok(_)) => {
                    // Ping/pong are answered by tungstenite
                }
                Some(Err(e)) => {
                    let _ = events.send(SessionEvent::Error(e.to_string())).await;
                    break None;
                }
                None => break None,
            },
        }
    };

    let _ = events.send(SessionEvent::Closed { reason }).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_refused_is_transport_error() {
        // Bind then drop to get a port nobody listens on
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let connector = WsConnector::new();
        let endpoint = Endpoint::new("ws", "127.0.0.1", port);
        let result = connector.connect(&endpoint, &[]).await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_unsupported_scheme_is_rejected() {
        let connector = WsConnector::new();
        let endpoint = Endpoint::new("ftp", "127.0.0.1", 21);
        let result = connector.connect(&endpoint, &[]).await;
        assert!(result.is_err());
    }
}
