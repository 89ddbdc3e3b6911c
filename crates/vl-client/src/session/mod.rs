//! Persistent session to the tracking server

mod state_machine;
mod manager;

pub use self::state_machine::{RetryDecision, SendOutcome, SessionCore, SessionError, Transition};
pub use self::manager::{SessionExit, SessionHandle, SessionManager, SessionOptions};
