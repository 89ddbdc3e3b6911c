//! Core trait definitions

mod connection;

pub use connection::{Connector, Link};
