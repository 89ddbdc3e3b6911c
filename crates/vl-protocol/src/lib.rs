//! vl-protocol: Wire protocol for the vrlink tracking/haptics session
//!
//! This crate defines the JSON text frames exchanged between the VR client
//! and the tracking server, and the typed pose payloads they carry.

pub mod error;
pub mod frame;
pub mod message;
pub mod tracking;

pub use error::ProtocolError;
pub use frame::InboundFrame;
pub use message::{
    Command, Outbound, ServerMessage, StateSnapshot, CMD_NEW_DATA, CMD_TRACKING_DATA,
};
pub use tracking::{Pose, TrackingState};
