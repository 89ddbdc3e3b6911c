//! Session state machine
//!
//! [`SessionCore`] owns the connection slot, the latest-state cell and the
//! reconnect schedule. It consumes [`SessionEvent`]s one at a time and tells
//! the driver what to do next; it never touches a socket or a timer, so every
//! transition can be exercised without a live connection.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;

use vl_core::log::LogSink;
use vl_core::{ConnectionState, Endpoint, RestartPolicy, SessionEvent, SharedState, StateReader};
use vl_protocol::{InboundFrame, Outbound, StateSnapshot};

use crate::transport::ReconnectSchedule;

/// Errors raised by the state machine itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    /// A new connection was requested while one is still live
    #[error("A connection is already live ({0})")]
    AlreadyConnected(ConnectionState),
}

/// What the driver should do after an event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep pumping events from the current connection
    Continue,
    /// Connection is gone; wait `retry_in` then call `on_retry_elapsed`
    Disconnected { retry_in: Duration },
}

/// What happens once the reconnect delay has elapsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Open a fresh connection in place
    Reconnect,
    /// Hand control back so the hosting process can restart
    RestartProcess,
}

/// Result of a `send` call. Never an error: a dropped message is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the transport
    Sent,
    /// No connection exists
    NotConnected,
    /// A connection exists but is not open yet
    NotReady,
    /// The transport had already gone away
    Failed,
}

/// The single connection a session may hold
#[derive(Debug)]
struct Connection {
    state: ConnectionState,
    writer: Option<mpsc::UnboundedSender<String>>,
}

/// Transport-independent session state
pub struct SessionCore {
    endpoint: Endpoint,
    restart_policy: RestartPolicy,
    schedule: ReconnectSchedule,
    connection: Option<Connection>,
    state: SharedState,
    log: Arc<dyn LogSink>,
    attempts: u64,
    /// Sends refused since the connection slot last changed state
    refused_sends: AtomicU64,
}

impl SessionCore {
    /// Create a disconnected session
    pub fn new(
        endpoint: Endpoint,
        restart_policy: RestartPolicy,
        schedule: ReconnectSchedule,
        log: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            endpoint,
            restart_policy,
            schedule,
            connection: None,
            state: SharedState::new(),
            log,
            attempts: 0,
            refused_sends: AtomicU64::new(0),
        }
    }

    /// Endpoint this session connects to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Policy applied after a disconnect
    pub fn restart_policy(&self) -> RestartPolicy {
        self.restart_policy
    }

    /// State of the live connection, if any
    pub fn connection_state(&self) -> Option<ConnectionState> {
        self.connection.as_ref().map(|c| c.state)
    }

    /// Number of connection attempts started so far
    pub fn attempts(&self) -> u64 {
        self.attempts
    }

    /// Latest server-pushed snapshot
    pub fn latest_state(&self) -> Option<Arc<StateSnapshot>> {
        self.state.latest()
    }

    /// Read-only handle to the latest-state cell
    pub fn state_reader(&self) -> StateReader {
        self.state.reader()
    }

    /// Start a new connection attempt (`Connecting`)
    ///
    /// Fails if the previous connection has not been closed yet.
    pub fn begin_connect(&mut self) -> Result<(), SessionError> {
        if let Some(existing) = &self.connection {
            return Err(SessionError::AlreadyConnected(existing.state));
        }
        self.attempts += 1;
        self.reset_refusals();
        self.connection = Some(Connection {
            state: ConnectionState::Connecting,
            writer: None,
        });
        tracing::debug!("Connection attempt {} to {}", self.attempts, self.endpoint);
        Ok(())
    }

    /// Give the current connection its outbound writer
    pub fn attach_writer(&mut self, writer: mpsc::UnboundedSender<String>) {
        match self.connection.as_mut() {
            Some(connection) => connection.writer = Some(writer),
            None => tracing::debug!("Ignoring writer for a connection that no longer exists"),
        }
    }

    /// Apply one lifecycle event
    pub fn handle(&mut self, event: SessionEvent) -> Transition {
        match event {
            SessionEvent::Opened => {
                match self.connection.as_mut() {
                    Some(connection) => {
                        connection.state = ConnectionState::Open;
                        self.schedule.reset();
                        self.reset_refusals();
                        self.log
                            .log(&[&format!("websocket connected to {}", self.endpoint)]);
                    }
                    None => tracing::debug!("Open event without a connection"),
                }
                Transition::Continue
            }

            SessionEvent::Frame(frame) => {
                self.handle_frame(frame);
                Transition::Continue
            }

            SessionEvent::Error(error) => {
                // The transport follows every error with a close
                tracing::debug!("Transport error on {}: {}", self.endpoint, error);
                Transition::Continue
            }

            SessionEvent::Closed { reason } => {
                if self.connection.take().is_none() {
                    tracing::debug!("Close event without a connection");
                    return Transition::Continue;
                }
                self.reset_refusals();
                if let Some(reason) = reason.filter(|r| !r.is_empty()) {
                    tracing::debug!("Close reason: {}", reason);
                }
                self.log
                    .log(&[&format!("websocket disconnected from {}", self.endpoint)]);
                Transition::Disconnected {
                    retry_in: self.schedule.next_delay(),
                }
            }
        }
    }

    /// Decide what to do once the reconnect delay has elapsed
    pub fn on_retry_elapsed(&mut self) -> RetryDecision {
        match self.restart_policy {
            RestartPolicy::RestartProcess => {
                tracing::warn!("Disconnected from {}, restarting process", self.endpoint);
                RetryDecision::RestartProcess
            }
            RestartPolicy::Reconnect => {
                self.log.log(&[&"websocket reconnecting"]);
                RetryDecision::Reconnect
            }
        }
    }

    /// Drop the connection without going through the close path
    pub fn abandon(&mut self) {
        if let Some(connection) = self.connection.take() {
            tracing::debug!("Abandoning {} connection to {}", connection.state, self.endpoint);
        }
        self.reset_refusals();
    }

    /// Sends refused since the connection last changed state
    pub fn refused_sends(&self) -> u64 {
        self.refused_sends.load(Ordering::Relaxed)
    }

    /// Write one message if the connection is open
    ///
    /// A refused send warns once per connection state; repeats (such as the
    /// per-frame poll) only show up at trace level.
    pub fn send(&self, message: Outbound) -> SendOutcome {
        let Some(connection) = &self.connection else {
            self.refuse("socket not yet connected");
            return SendOutcome::NotConnected;
        };
        let writer = match &connection.writer {
            Some(writer) if connection.state == ConnectionState::Open => writer,
            _ => {
                self.refuse("socket not yet ready");
                return SendOutcome::NotReady;
            }
        };

        match writer.send(message.into_wire()) {
            Ok(()) => SendOutcome::Sent,
            Err(_) => {
                tracing::warn!("Transport for {} is gone, message dropped", self.endpoint);
                SendOutcome::Failed
            }
        }
    }

    fn refuse(&self, reason: &str) {
        if self.refused_sends.fetch_add(1, Ordering::Relaxed) == 0 {
            tracing::warn!("{}", reason);
        } else {
            tracing::trace!("{}", reason);
        }
    }

    fn reset_refusals(&mut self) {
        *self.refused_sends.get_mut() = 0;
    }

    fn handle_frame(&mut self, frame: InboundFrame) {
        let Some(decoded) = frame.decode() else {
            self.log
                .log(&[&format!("ws received arraybuffer of {} bytes", frame.len())]);
            return;
        };

        match decoded {
            Ok(message) => match message.into_snapshot() {
                Some(snapshot) => self.state.replace(snapshot),
                None => self.log.log(&[&"ws received", &frame.as_text().unwrap_or_default()]),
            },
            Err(e) => {
                tracing::warn!("Dropping malformed frame from {}: {}", self.endpoint, e);
                self.log.log(&[&"ws dropped malformed frame", &e]);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vl_core::log::RingLog;

    fn core_with(policy: RestartPolicy) -> (SessionCore, Arc<RingLog>) {
        let log = Arc::new(RingLog::new());
        let core = SessionCore::new(
            Endpoint::new("ws", "localhost", 8080),
            policy,
            ReconnectSchedule::fixed(Duration::from_millis(1000)),
            log.clone(),
        );
        (core, log)
    }

    fn open_core() -> (SessionCore, mpsc::UnboundedReceiver<String>, Arc<RingLog>) {
        let (mut core, log) = core_with(RestartPolicy::Reconnect);
        let (tx, rx) = mpsc::unbounded_channel();
        core.begin_connect().unwrap();
        core.attach_writer(tx);
        assert_eq!(core.handle(SessionEvent::Opened), Transition::Continue);
        (core, rx, log)
    }

    fn text(body: &str) -> SessionEvent {
        SessionEvent::Frame(InboundFrame::from(body))
    }

    #[test]
    fn test_lifecycle_connecting_open_closed() {
        let (mut core, log) = core_with(RestartPolicy::Reconnect);
        assert_eq!(core.connection_state(), None);

        core.begin_connect().unwrap();
        assert_eq!(core.connection_state(), Some(ConnectionState::Connecting));

        core.handle(SessionEvent::Opened);
        assert_eq!(core.connection_state(), Some(ConnectionState::Open));

        let transition = core.handle(SessionEvent::Closed { reason: None });
        assert_eq!(
            transition,
            Transition::Disconnected {
                retry_in: Duration::from_millis(1000)
            }
        );
        assert_eq!(core.connection_state(), None);

        let lines = log.lines();
        assert_eq!(lines[0], "websocket connected to ws://localhost:8080");
        assert_eq!(lines[1], "websocket disconnected from ws://localhost:8080");
    }

    #[test]
    fn test_only_one_live_connection() {
        let (mut core, _log) = core_with(RestartPolicy::Reconnect);
        core.begin_connect().unwrap();
        assert_eq!(
            core.begin_connect(),
            Err(SessionError::AlreadyConnected(ConnectionState::Connecting))
        );

        core.handle(SessionEvent::Opened);
        assert_eq!(
            core.begin_connect(),
            Err(SessionError::AlreadyConnected(ConnectionState::Open))
        );

        core.handle(SessionEvent::Closed { reason: None });
        assert!(core.begin_connect().is_ok());
        assert_eq!(core.attempts(), 2);
    }

    #[test]
    fn test_state_replaced_not_merged() {
        let (mut core, _rx, _log) = open_core();
        core.handle(text(r#"{"cmd":"newData","state":{"a":1,"shared":true}}"#));
        core.handle(text(r#"{"cmd":"newData","state":{"b":2}}"#));

        let latest = core.latest_state().unwrap();
        assert_eq!(*latest, StateSnapshot::Data(json!({"b": 2})));
    }

    #[test]
    fn test_malformed_frame_keeps_state() {
        let (mut core, _rx, log) = open_core();
        core.handle(text(r#"{"cmd":"newData","state":{"a":1}}"#));

        assert_eq!(core.handle(text("{not json")), Transition::Continue);
        assert_eq!(
            core.latest_state().unwrap().data(),
            Some(&json!({"a": 1}))
        );
        assert!(log
            .lines()
            .iter()
            .any(|l| l.starts_with("ws dropped malformed frame")));
    }

    #[test]
    fn test_malformed_before_any_state() {
        let (mut core, _rx, _log) = open_core();
        core.handle(text("garbage"));
        core.handle(text(r#"{"cmd":"trackingData","state":{"hmd":null}}"#));
        assert!(core.latest_state().is_none());
    }

    #[test]
    fn test_tracking_frame_replaces_state() {
        let (mut core, _rx, _log) = open_core();
        core.handle(text(
            r#"{"cmd":"trackingData","state":{"hmd":{"pos":[0,1.6,0],"quat":[0,0,0,1]},"trackers":[]}}"#,
        ));

        let latest = core.latest_state().unwrap();
        let tracking = latest.tracking().unwrap();
        assert_eq!(tracking.hmd.pos, [0.0, 1.6, 0.0]);
        assert_eq!(tracking.trackers.len(), 0);
    }

    #[test]
    fn test_unrecognized_and_missing_cmd_are_logged() {
        let (mut core, _rx, log) = open_core();
        core.handle(text(r#"{"cmd":"ping"}"#));
        core.handle(text(r#"{"state":{"a":1}}"#));

        assert!(core.latest_state().is_none());
        let lines = log.lines();
        assert!(lines.contains(&r#"ws received, {"cmd":"ping"}"#.to_string()));
        assert!(lines.contains(&r#"ws received, {"state":{"a":1}}"#.to_string()));
    }

    #[test]
    fn test_binary_frame_only_logged() {
        let (mut core, _rx, log) = open_core();
        core.handle(SessionEvent::Frame(InboundFrame::from(vec![0u8; 12])));
        assert!(core.latest_state().is_none());
        assert_eq!(
            log.lines().last().map(String::as_str),
            Some("ws received arraybuffer of 12 bytes")
        );
    }

    #[test]
    fn test_send_without_connection() {
        let (core, _log) = core_with(RestartPolicy::Reconnect);
        assert_eq!(core.send(Outbound::from("getData")), SendOutcome::NotConnected);
    }

    #[test]
    fn test_send_while_connecting_writes_nothing() {
        let (mut core, _log) = core_with(RestartPolicy::Reconnect);
        let (tx, mut rx) = mpsc::unbounded_channel();
        core.begin_connect().unwrap();
        core.attach_writer(tx);

        assert_eq!(core.send(Outbound::from("getData")), SendOutcome::NotReady);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_send_json_on_open_connection() {
        let (core, mut rx, _log) = open_core();
        assert_eq!(core.send(Outbound::from(json!({"a": 1}))), SendOutcome::Sent);
        assert_eq!(rx.try_recv().unwrap(), r#"{"a":1}"#);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_refused_sends_counted_per_state() {
        let (mut core, _log) = core_with(RestartPolicy::Reconnect);
        for _ in 0..72 {
            assert_eq!(core.send(Outbound::from("getData")), SendOutcome::NotConnected);
        }
        assert_eq!(core.refused_sends(), 72);

        core.begin_connect().unwrap();
        assert_eq!(core.refused_sends(), 0);
        core.send(Outbound::from("getData"));
        core.send(Outbound::from("getData"));
        assert_eq!(core.refused_sends(), 2);

        let (tx, _rx) = mpsc::unbounded_channel();
        core.attach_writer(tx);
        core.handle(SessionEvent::Opened);
        assert_eq!(core.refused_sends(), 0);
        assert_eq!(core.send(Outbound::from("getData")), SendOutcome::Sent);
        assert_eq!(core.refused_sends(), 0);

        core.handle(SessionEvent::Closed { reason: None });
        core.send(Outbound::from("getData"));
        assert_eq!(core.refused_sends(), 1);
    }

    #[test]
    fn test_tracking_snapshot_keeps_extra_fields() {
        let (mut core, _rx, _log) = open_core();
        core.handle(text(
            r#"{"cmd":"trackingData","state":{"hmd":{"pos":[0,1.6,0],"quat":[0,0,0,1],"id":"hmd0"},"trackers":[],"timestamp":17}}"#,
        ));

        let latest = core.latest_state().unwrap();
        assert_eq!(latest.raw()["hmd"]["id"], "hmd0");
        assert_eq!(latest.raw()["timestamp"], 17);
        assert_eq!(latest.tracking().unwrap().hmd.pos, [0.0, 1.6, 0.0]);
    }

    #[test]
    fn test_send_after_transport_gone() {
        let (core, rx, _log) = open_core();
        drop(rx);
        assert_eq!(core.send(Outbound::from("getData")), SendOutcome::Failed);
    }

    #[test]
    fn test_send_after_close_is_dropped() {
        let (mut core, mut rx, _log) = open_core();
        core.handle(SessionEvent::Closed { reason: None });
        assert_eq!(core.send(Outbound::from("getData")), SendOutcome::NotConnected);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_retry_decision_follows_policy() {
        let (mut core, log) = core_with(RestartPolicy::Reconnect);
        assert_eq!(core.on_retry_elapsed(), RetryDecision::Reconnect);
        assert_eq!(
            log.lines().last().map(String::as_str),
            Some("websocket reconnecting")
        );

        let (mut core, _log) = core_with(RestartPolicy::RestartProcess);
        assert_eq!(core.on_retry_elapsed(), RetryDecision::RestartProcess);
    }

    #[test]
    fn test_open_resets_growing_schedule() {
        let log = Arc::new(RingLog::new());
        let mut core = SessionCore::new(
            Endpoint::new("ws", "localhost", 8080),
            RestartPolicy::Reconnect,
            ReconnectSchedule::new(Duration::from_secs(1), Duration::from_secs(8), 2.0, 0.0),
            log,
        );

        let close_failed_attempt = |core: &mut SessionCore| {
            core.begin_connect().unwrap();
            core.handle(SessionEvent::Error("refused".to_string()));
            core.handle(SessionEvent::Closed { reason: None })
        };
        assert_eq!(
            close_failed_attempt(&mut core),
            Transition::Disconnected { retry_in: Duration::from_secs(1) }
        );
        assert_eq!(
            close_failed_attempt(&mut core),
            Transition::Disconnected { retry_in: Duration::from_secs(2) }
        );

        core.begin_connect().unwrap();
        core.handle(SessionEvent::Opened);
        assert_eq!(
            core.handle(SessionEvent::Closed { reason: None }),
            Transition::Disconnected { retry_in: Duration::from_secs(1) }
        );
    }

    #[test]
    fn test_stray_close_is_ignored() {
        let (mut core, _log) = core_with(RestartPolicy::Reconnect);
        assert_eq!(
            core.handle(SessionEvent::Closed { reason: None }),
            Transition::Continue
        );
    }
}
