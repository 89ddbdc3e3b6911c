//! Transport management for connecting to the tracking server

mod reconnect;
mod websocket;

pub use reconnect::ReconnectSchedule;
pub use websocket::WsConnector;
