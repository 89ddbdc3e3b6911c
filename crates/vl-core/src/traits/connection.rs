//! Connection traits

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::types::{Endpoint, SessionEvent};

/// Opens transport-level connections for a session.
///
/// A successful `connect` means the handshake completed; the session treats
/// the returned [`Link`] as open.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open one connection to `endpoint`, offering `subprotocols` in order
    async fn connect(
        &self,
        endpoint: &Endpoint,
        subprotocols: &[String],
    ) -> Result<Link, TransportError>;
}

/// One live connection, split into its two directions.
///
/// Dropping `outbound` asks the transport to close the connection. The
/// transport reports `Frame` and `Error` events on `events` and always ends
/// the stream with a single `Closed`.
#[derive(Debug)]
pub struct Link {
    /// Text frames to write
    pub outbound: mpsc::UnboundedSender<String>,
    /// Inbound lifecycle events
    pub events: mpsc::Receiver<SessionEvent>,
}

impl Link {
    /// Bundle the two halves of a connection
    pub fn new(
        outbound: mpsc::UnboundedSender<String>,
        events: mpsc::Receiver<SessionEvent>,
    ) -> Self {
        Self { outbound, events }
    }
}
