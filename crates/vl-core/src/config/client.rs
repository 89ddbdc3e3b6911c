//! Client session configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::serde_utils::duration_millis;
use crate::error::ConfigError;
use crate::types::{Endpoint, RestartPolicy};

/// Configuration for the VR client's server session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// URL scheme (`ws` or `wss`)
    pub transport: String,

    /// Tracking server host
    pub hostname: String,

    /// Tracking server port
    pub port: u16,

    /// Websocket subprotocols offered during the handshake, in order
    pub subprotocols: Vec<String>,

    /// Delay schedule between a close and the next attempt
    pub reconnect: BackoffConfig,

    /// What to do once the reconnect delay has elapsed
    pub restart_policy: RestartPolicy,

    /// Upper bound on the opening handshake (None = wait for the transport)
    #[serde(
        with = "duration_millis::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub connect_timeout: Option<Duration>,

    /// Poll/render cadence in frames per second
    pub frame_rate: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            transport: "ws".to_string(),
            hostname: "localhost".to_string(),
            port: 8080,
            subprotocols: vec![],
            reconnect: BackoffConfig::default(),
            restart_policy: RestartPolicy::default(),
            connect_timeout: Some(Duration::from_secs(30)),
            frame_rate: 72,
        }
    }
}

impl ClientConfig {
    /// Endpoint assembled from transport, hostname and port
    pub fn endpoint(&self) -> Endpoint {
        Endpoint::new(&self.transport, &self.hostname, self.port)
    }

    /// Base delay before a reconnect attempt
    pub fn reconnect_delay(&self) -> Duration {
        self.reconnect.initial
    }

    /// Interval between two polled frames
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate.max(1)))
    }

    /// Check for values the session cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.transport.to_ascii_lowercase().as_str(), "ws" | "wss") {
            return Err(ConfigError::Invalid(format!(
                "unsupported transport '{}' (expected ws or wss)",
                self.transport
            )));
        }
        if self.hostname.trim().is_empty() {
            return Err(ConfigError::Invalid("hostname is empty".to_string()));
        }
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if self.frame_rate == 0 {
            return Err(ConfigError::Invalid("frame_rate must be positive".to_string()));
        }
        self.reconnect.validate()
    }
}

/// Reconnect delay schedule.
///
/// The default is a fixed one-second interval: `multiplier = 1.0` and no
/// jitter. Raising the multiplier turns it into an exponential backoff capped
/// at `max`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt
    #[serde(with = "duration_millis")]
    pub initial: Duration,

    /// Maximum delay
    #[serde(with = "duration_millis")]
    pub max: Duration,

    /// Multiplier for each retry
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0)
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(1000),
            max: Duration::from_secs(30),
            multiplier: 1.0,
            jitter: 0.0,
        }
    }
}

impl BackoffConfig {
    /// Fixed-interval schedule
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial: delay,
            max: delay,
            multiplier: 1.0,
            jitter: 0.0,
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.multiplier < 1.0 || !self.multiplier.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "reconnect.multiplier must be >= 1.0, got {}",
                self.multiplier
            )));
        }
        if !(0.0..=1.0).contains(&self.jitter) {
            return Err(ConfigError::Invalid(format!(
                "reconnect.jitter must be within 0.0..=1.0, got {}",
                self.jitter
            )));
        }
        if self.max < self.initial {
            return Err(ConfigError::Invalid(
                "reconnect.max must not be below reconnect.initial".to_string(),
            ));
        }
        Ok(())
    }
}
