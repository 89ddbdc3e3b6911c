//! Core domain types

use serde::{Deserialize, Serialize};
use std::fmt;

use vl_protocol::InboundFrame;

/// Server address a session connects to.
///
/// Rendered as `transport://hostname:port` and fixed for the lifetime of the
/// session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    /// URL scheme (`ws` or `wss`)
    pub transport: String,
    /// Host name or IP address
    pub hostname: String,
    /// TCP port
    pub port: u16,
}

impl Endpoint {
    /// Create a new endpoint
    pub fn new(transport: impl Into<String>, hostname: impl Into<String>, port: u16) -> Self {
        Self {
            transport: transport.into(),
            hostname: hostname.into(),
            port,
        }
    }

    /// Address string used to open the connection
    pub fn url(&self) -> String {
        self.to_string()
    }

    /// Whether the endpoint uses TLS
    pub fn is_secure(&self) -> bool {
        self.transport.eq_ignore_ascii_case("wss")
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.transport, self.hostname, self.port)
    }
}

/// What the session does once a connection closes and the retry delay elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestartPolicy {
    /// Open a fresh connection in place
    Reconnect,
    /// Tear down and restart the whole hosting process
    #[default]
    RestartProcess,
}

impl RestartPolicy {
    /// Policy for the `reload_on_disconnect` switch
    pub fn from_reload_flag(reload_on_disconnect: bool) -> Self {
        if reload_on_disconnect {
            RestartPolicy::RestartProcess
        } else {
            RestartPolicy::Reconnect
        }
    }
}

impl fmt::Display for RestartPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestartPolicy::Reconnect => write!(f, "reconnect"),
            RestartPolicy::RestartProcess => write!(f, "restart-process"),
        }
    }
}

/// Ready-state of a live connection instance.
///
/// A closed connection is dropped from the session rather than kept around,
/// so the next attempt always starts from a fresh `Connecting` instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Handshake in progress
    Connecting,
    /// Ready for frames in both directions
    Open,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Open => write!(f, "open"),
        }
    }
}

/// Lifecycle events of one connection, independent of the transport library
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Handshake completed
    Opened,
    /// A frame arrived
    Frame(InboundFrame),
    /// Low-level failure; always followed by `Closed`
    Error(String),
    /// Connection ended
    Closed {
        /// Close reason, if the peer sent one
        reason: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_display() {
        let endpoint = Endpoint::new("ws", "localhost", 8080);
        assert_eq!(endpoint.url(), "ws://localhost:8080");
        assert!(!endpoint.is_secure());
        assert!(Endpoint::new("WSS", "tracker.local", 443).is_secure());
    }

    #[test]
    fn test_restart_policy_from_flag() {
        assert_eq!(
            RestartPolicy::from_reload_flag(true),
            RestartPolicy::RestartProcess
        );
        assert_eq!(RestartPolicy::from_reload_flag(false), RestartPolicy::Reconnect);
    }

    #[test]
    fn test_restart_policy_defaults_to_process_restart() {
        assert_eq!(RestartPolicy::default(), RestartPolicy::RestartProcess);
    }

    #[test]
    fn test_restart_policy_serde() {
        let json = serde_json::to_string(&RestartPolicy::RestartProcess).unwrap();
        assert_eq!(json, r#""restart_process""#);
        let policy: RestartPolicy = serde_json::from_str(r#""reconnect""#).unwrap();
        assert_eq!(policy, RestartPolicy::Reconnect);
    }

    #[test]
    fn test_connection_state_display() {
        assert_eq!(format!("{}", ConnectionState::Open), "open");
        assert_eq!(format!("{}", ConnectionState::Connecting), "connecting");
    }
}
