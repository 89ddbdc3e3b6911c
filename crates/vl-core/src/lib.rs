//! vl-core: Core abstractions and configuration for vrlink
//!
//! This crate provides shared types, traits, and configuration structures
//! used by the session manager and the client binary.

pub mod config;
pub mod error;
pub mod log;
pub mod state;
pub mod traits;
pub mod types;

pub use error::{ConfigError, TransportError};
pub use state::{SharedState, StateReader};
pub use types::{ConnectionState, Endpoint, RestartPolicy, SessionEvent};
