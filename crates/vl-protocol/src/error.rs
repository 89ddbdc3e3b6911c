//! Protocol error types

use thiserror::Error;

/// Errors that can occur while decoding or encoding session frames
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// Text frame was not valid JSON
    #[error("Malformed frame: {0}")]
    MalformedFrame(#[source] serde_json::Error),

    /// Text frame was valid JSON but not an object
    #[error("Frame is not a JSON object")]
    NotAnObject,

    /// A state-carrying command arrived without a `state` field
    #[error("Command '{cmd}' is missing its state payload")]
    MissingState { cmd: &'static str },

    /// `trackingData` payload did not match the pose layout
    #[error("Invalid tracking payload: {0}")]
    InvalidTracking(#[source] serde_json::Error),

    /// Outbound value could not be serialized
    #[error("Serialization error: {0}")]
    Serialization(#[source] serde_json::Error),
}
