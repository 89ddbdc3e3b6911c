//! Session driver
//!
//! Runs the connect / pump / wait / reconnect cycle around a [`SessionCore`]
//! on its own task and hands out cheap [`SessionHandle`]s to the rest of the
//! client.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vl_core::config::{BackoffConfig, ClientConfig};
use vl_core::error::TransportError;
use vl_core::log::LogSink;
use vl_core::traits::{Connector, Link};
use vl_core::{ConnectionState, Endpoint, RestartPolicy, SessionEvent, StateReader};
use vl_protocol::{Outbound, StateSnapshot};

use super::state_machine::{RetryDecision, SendOutcome, SessionCore, SessionError, Transition};
use crate::transport::ReconnectSchedule;

/// Everything fixed at session construction
#[derive(Debug, Clone, PartialEq)]
pub struct SessionOptions {
    /// Server address
    pub endpoint: Endpoint,
    /// Subprotocols offered at connect time, in order
    pub subprotocols: Vec<String>,
    /// Reconnect delay schedule
    pub reconnect: BackoffConfig,
    /// Reconnect in place or restart the process
    pub restart_policy: RestartPolicy,
    /// Optional bound on the opening handshake
    pub connect_timeout: Option<Duration>,
}

impl SessionOptions {
    /// Session options taken from client configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            endpoint: config.endpoint(),
            subprotocols: config.subprotocols.clone(),
            reconnect: config.reconnect.clone(),
            restart_policy: config.restart_policy,
            connect_timeout: config.connect_timeout,
        }
    }

    /// Use a fixed reconnect delay
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect = BackoffConfig::fixed(delay);
        self
    }

    /// Set the restart policy
    pub fn with_restart_policy(mut self, policy: RestartPolicy) -> Self {
        self.restart_policy = policy;
        self
    }

    /// Set the subprotocols offered at connect time
    pub fn with_subprotocols(mut self, subprotocols: Vec<String>) -> Self {
        self.subprotocols = subprotocols;
        self
    }

    /// Set or clear the handshake timeout
    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Why the driver stopped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionExit {
    /// The cancellation token fired
    Cancelled,
    /// Restart policy asks the hosting process to restart
    RestartRequested,
    /// The state machine refused a transition
    Aborted(SessionError),
}

fn lock_core(core: &Mutex<SessionCore>) -> MutexGuard<'_, SessionCore> {
    core.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Cloneable front end of a running session
#[derive(Clone)]
pub struct SessionHandle {
    core: Arc<Mutex<SessionCore>>,
    reader: StateReader,
    endpoint: Endpoint,
}

impl SessionHandle {
    /// Fire-and-forget send.
    ///
    /// Strings go out verbatim; anything else is serialized to JSON. Nothing
    /// is queued while the connection is down.
    pub fn send(&self, message: impl Into<Outbound>) -> SendOutcome {
        let message = message.into();
        lock_core(&self.core).send(message)
    }

    /// Latest snapshot pushed by the server, if any
    pub fn latest_state(&self) -> Option<Arc<StateSnapshot>> {
        self.reader.latest()
    }

    /// A reader that can also wait for changes
    pub fn state_reader(&self) -> StateReader {
        self.reader.clone()
    }

    /// State of the live connection, if any
    pub fn connection_state(&self) -> Option<ConnectionState> {
        lock_core(&self.core).connection_state()
    }

    /// Endpoint of this session
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

/// Owns one session and the connector it dials with
pub struct SessionManager<C> {
    connector: C,
    options: SessionOptions,
    core: Arc<Mutex<SessionCore>>,
}

impl<C: Connector> SessionManager<C> {
    /// Create a session; nothing is dialed until [`run`](Self::run)
    pub fn new(options: SessionOptions, connector: C, log: Arc<dyn LogSink>) -> Self {
        let core = SessionCore::new(
            options.endpoint.clone(),
            options.restart_policy,
            ReconnectSchedule::from_config(&options.reconnect),
            log,
        );
        Self {
            connector,
            options,
            core: Arc::new(Mutex::new(core)),
        }
    }

    /// Handle for sending and reading state
    pub fn handle(&self) -> SessionHandle {
        let reader = lock_core(&self.core).state_reader();
        SessionHandle {
            core: Arc::clone(&self.core),
            reader,
            endpoint: self.options.endpoint.clone(),
        }
    }

    /// Run the session until it is cancelled or asks for a process restart
    pub async fn run(self, cancel: CancellationToken) -> SessionExit {
        loop {
            let started = lock_core(&self.core).begin_connect();
            if let Err(e) = started {
                tracing::error!("Refusing to open a second connection: {}", e);
                return SessionExit::Aborted(e);
            }

            let attempt = tokio::select! {
                _ = cancel.cancelled() => {
                    lock_core(&self.core).abandon();
                    return SessionExit::Cancelled;
                }
                attempt = self.open_link() => attempt,
            };

            let mut events = match attempt {
                Ok(link) => {
                    let mut core = lock_core(&self.core);
                    core.attach_writer(link.outbound);
                    core.handle(SessionEvent::Opened);
                    link.events
                }
                Err(e) => {
                    tracing::debug!("Connect to {} failed: {}", self.options.endpoint, e);
                    failed_attempt_events(e)
                }
            };

            let retry_in = loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => {
                        lock_core(&self.core).abandon();
                        return SessionExit::Cancelled;
                    }
                    event = events.recv() => event.unwrap_or(SessionEvent::Closed { reason: None }),
                };
                let transition = lock_core(&self.core).handle(event);
                if let Transition::Disconnected { retry_in } = transition {
                    break retry_in;
                }
            };
            drop(events);

            tokio::select! {
                _ = cancel.cancelled() => return SessionExit::Cancelled,
                _ = tokio::time::sleep(retry_in) => {}
            }

            let decision = lock_core(&self.core).on_retry_elapsed();
            if decision == RetryDecision::RestartProcess {
                return SessionExit::RestartRequested;
            }
        }
    }

    async fn open_link(&self) -> Result<Link, TransportError> {
        let connect = self
            .connector
            .connect(&self.options.endpoint, &self.options.subprotocols);

        match self.options.connect_timeout {
            Some(limit) => tokio::time::timeout(limit, connect)
                .await
                .map_err(|_| TransportError::Timeout(limit))?,
            None => connect.await,
        }
    }
}

impl<C: Connector + 'static> SessionManager<C> {
    /// Start the session on its own task
    pub fn spawn(self, cancel: CancellationToken) -> (SessionHandle, JoinHandle<SessionExit>) {
        let handle = self.handle();
        let task = tokio::spawn(self.run(cancel));
        (handle, task)
    }
}

/// Event stream of an attempt that never opened: an error, then the close
fn failed_attempt_events(error: TransportError) -> mpsc::Receiver<SessionEvent> {
    let (tx, rx) = mpsc::channel(2);
    let _ = tx.try_send(SessionEvent::Error(error.to_string()));
    let _ = tx.try_send(SessionEvent::Closed { reason: None });
    rx
}
