//! Message types for the vrlink session protocol
//!
//! Inbound text frames are JSON objects discriminated by a `cmd` field:
//!
//! ```text
//! { "cmd": "newData",      "state": <opaque object> }
//! { "cmd": "trackingData", "state": { "hmd": {pos, quat}, "trackers": [...] } }
//! ```
//!
//! Any other `cmd` (or none at all) is passed through as
//! [`ServerMessage::Unrecognized`] so newer servers can add commands without
//! breaking older clients.
//!
//! Outbound frames have no envelope: bare command strings such as
//! `"getData"`, or arbitrary JSON values serialized to text.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::tracking::TrackingState;

/// `cmd` value of an opaque application state push
pub const CMD_NEW_DATA: &str = "newData";

/// `cmd` value of a headset/tracker pose push
pub const CMD_TRACKING_DATA: &str = "trackingData";

/// A decoded server-to-client text frame
#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    /// Application-defined state, stored verbatim
    NewData {
        /// Opaque state object
        state: Value,
    },

    /// Headset and tracker poses
    TrackingData {
        /// Typed view of the poses
        poses: TrackingState,
        /// The `state` object exactly as received
        raw: Value,
    },

    /// Any frame whose `cmd` is unknown or absent
    Unrecognized {
        /// The `cmd` value, if the frame had a string one
        cmd: Option<String>,
        /// The full decoded frame
        raw: Value,
    },
}

impl ServerMessage {
    /// Decode a text frame body
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text).map_err(ProtocolError::MalformedFrame)?;
        Self::from_value(value)
    }

    /// Classify an already-decoded JSON value by its `cmd` field
    pub fn from_value(mut value: Value) -> Result<Self, ProtocolError> {
        let object = value.as_object_mut().ok_or(ProtocolError::NotAnObject)?;
        let cmd = object.get("cmd").and_then(Value::as_str).map(str::to_owned);

        if cmd.as_deref() == Some(CMD_NEW_DATA) {
            let state = object.remove("state").ok_or(ProtocolError::MissingState {
                cmd: CMD_NEW_DATA,
            })?;
            return Ok(ServerMessage::NewData { state });
        }

        if cmd.as_deref() == Some(CMD_TRACKING_DATA) {
            let state = object.remove("state").ok_or(ProtocolError::MissingState {
                cmd: CMD_TRACKING_DATA,
            })?;
            let poses =
                TrackingState::deserialize(&state).map_err(ProtocolError::InvalidTracking)?;
            return Ok(ServerMessage::TrackingData { poses, raw: state });
        }

        tracing::trace!("Unrecognized cmd {:?}", cmd);
        Ok(ServerMessage::Unrecognized { cmd, raw: value })
    }

    /// The `cmd` discriminator of this message
    pub fn cmd(&self) -> Option<&str> {
        match self {
            ServerMessage::NewData { .. } => Some(CMD_NEW_DATA),
            ServerMessage::TrackingData { .. } => Some(CMD_TRACKING_DATA),
            ServerMessage::Unrecognized { cmd, .. } => cmd.as_deref(),
        }
    }

    /// Convert a state-carrying message into a snapshot
    ///
    /// Returns `None` for unrecognized messages.
    pub fn into_snapshot(self) -> Option<StateSnapshot> {
        match self {
            ServerMessage::NewData { state } => Some(StateSnapshot::Data(state)),
            ServerMessage::TrackingData { poses, raw } => {
                Some(StateSnapshot::Tracking { poses, raw })
            }
            ServerMessage::Unrecognized { .. } => None,
        }
    }
}

/// The most recent server-pushed application state
///
/// Both variants keep the `state` object verbatim; tracking snapshots also
/// carry a typed view of the poses.
#[derive(Debug, Clone, PartialEq)]
pub enum StateSnapshot {
    /// Opaque payload of a `newData` frame
    Data(Value),
    /// Payload of a `trackingData` frame
    Tracking {
        /// Typed headset and tracker poses
        poses: TrackingState,
        /// The full `state` object, including fields the typed view ignores
        raw: Value,
    },
}

impl StateSnapshot {
    /// Typed poses, if this snapshot came from `trackingData`
    pub fn tracking(&self) -> Option<&TrackingState> {
        match self {
            StateSnapshot::Tracking { poses, .. } => Some(poses),
            StateSnapshot::Data(_) => None,
        }
    }

    /// Opaque payload, if this snapshot came from `newData`
    pub fn data(&self) -> Option<&Value> {
        match self {
            StateSnapshot::Data(value) => Some(value),
            StateSnapshot::Tracking { .. } => None,
        }
    }

    /// The `state` object as the server sent it
    pub fn raw(&self) -> &Value {
        match self {
            StateSnapshot::Data(value) => value,
            StateSnapshot::Tracking { raw, .. } => raw,
        }
    }
}

/// Bare command strings understood by the tracking server
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Poll for the latest state (sent once per rendered frame)
    GetData,
    /// Fire the front haptic actuators
    SendHaptics,
    /// Fire the back haptic actuators
    SendHapticsBack,
}

impl Command {
    /// Wire representation of the command
    pub fn as_str(&self) -> &'static str {
        match self {
            Command::GetData => "getData",
            Command::SendHaptics => "sendHaptics",
            Command::SendHapticsBack => "sendHaptics_back",
        }
    }

    /// Parse a wire command string
    pub fn from_wire(value: &str) -> Option<Self> {
        match value {
            "getData" => Some(Self::GetData),
            "sendHaptics" => Some(Self::SendHaptics),
            "sendHaptics_back" => Some(Self::SendHapticsBack),
            _ => None,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A client-to-server message before it is put on the wire
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// Sent verbatim as a text frame
    Text(String),
    /// Serialized to JSON text before sending
    Json(Value),
}

impl Outbound {
    /// Build an outbound JSON message from any serializable value
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ProtocolError> {
        serde_json::to_value(value)
            .map(Outbound::from)
            .map_err(ProtocolError::Serialization)
    }

    /// Text that goes on the wire
    pub fn into_wire(self) -> String {
        match self {
            Outbound::Text(text) => text,
            // Value's Display impl is its compact JSON encoding
            Outbound::Json(value) => value.to_string(),
        }
    }
}

impl From<&str> for Outbound {
    fn from(text: &str) -> Self {
        Outbound::Text(text.to_string())
    }
}

impl From<String> for Outbound {
    fn from(text: String) -> Self {
        Outbound::Text(text)
    }
}

impl From<Command> for Outbound {
    fn from(command: Command) -> Self {
        Outbound::Text(command.as_str().to_string())
    }
}

impl From<Value> for Outbound {
    fn from(value: Value) -> Self {
        match value {
            Value::String(text) => Outbound::Text(text),
            other => Outbound::Json(other),
        }
    }
}
