//! Core error types for vrlink

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Transport-level failures.
///
/// The session never surfaces these to callers; every one of them ends the
/// current connection and is handled as a close.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Endpoint could not be turned into a request
    #[error("Invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    /// TCP connect failed or was refused
    #[error("Connection refused: {0}")]
    Connect(String),

    /// Opening handshake failed
    #[error("Handshake failed: {0}")]
    Handshake(String),

    /// Handshake did not finish in time
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    /// Connection is gone
    #[error("Connection closed")]
    Closed,
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file not found
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    /// Invalid configuration
    #[error("Invalid config: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
}
