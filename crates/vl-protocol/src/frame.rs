//! Raw inbound frames as delivered by the transport

use bytes::Bytes;

use crate::error::ProtocolError;
use crate::message::ServerMessage;

/// One frame received from the server
#[derive(Debug, Clone, PartialEq)]
pub enum InboundFrame {
    /// Opaque binary block; only its length is observed
    Binary(Bytes),
    /// Text body, expected to be a JSON object
    Text(String),
}

impl InboundFrame {
    /// Size of the frame body in bytes
    pub fn len(&self) -> usize {
        match self {
            InboundFrame::Binary(data) => data.len(),
            InboundFrame::Text(text) => text.len(),
        }
    }

    /// Whether the frame body is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Text body, if this is a text frame
    pub fn as_text(&self) -> Option<&str> {
        match self {
            InboundFrame::Binary(_) => None,
            InboundFrame::Text(text) => Some(text),
        }
    }

    /// Decode a text frame
    ///
    /// Returns `None` for binary frames, which carry no JSON.
    pub fn decode(&self) -> Option<Result<ServerMessage, ProtocolError>> {
        match self {
            InboundFrame::Binary(_) => None,
            InboundFrame::Text(text) => Some(ServerMessage::parse(text)),
        }
    }
}

impl From<String> for InboundFrame {
    fn from(text: String) -> Self {
        InboundFrame::Text(text)
    }
}

impl From<&str> for InboundFrame {
    fn from(text: &str) -> Self {
        InboundFrame::Text(text.to_string())
    }
}

impl From<Bytes> for InboundFrame {
    fn from(data: Bytes) -> Self {
        InboundFrame::Binary(data)
    }
}

impl From<Vec<u8>> for InboundFrame {
    fn from(data: Vec<u8>) -> Self {
        InboundFrame::Binary(Bytes::from(data))
    }
}
