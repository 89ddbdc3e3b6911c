//! Human-readable session log sinks
//!
//! The session reports lifecycle messages ("connected", "reconnecting",
//! unrecognized frames) as a list of loggable values. Sinks join them with
//! `", "` and decide where the line goes.

use std::collections::VecDeque;
use std::fmt::{self, Display};
use std::sync::Mutex;

/// Number of lines kept by [`RingLog`]
pub const RING_LOG_CAPACITY: usize = 16;

/// Destination for session log lines
pub trait LogSink: Send + Sync {
    /// Record one line built from `values`
    fn log(&self, values: &[&dyn Display]);
}

/// Join values the way every sink renders them
pub fn join_values(values: &[&dyn Display]) -> String {
    let mut line = String::new();
    for (i, value) in values.iter().enumerate() {
        if i > 0 {
            line.push_str(", ");
        }
        line.push_str(&value.to_string());
    }
    line
}

/// Forwards every line to `tracing` at info level
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl LogSink for TracingLog {
    fn log(&self, values: &[&dyn Display]) {
        tracing::info!(target: "vrlink::session", "{}", join_values(values));
    }
}

/// Keeps the most recent lines for an on-screen log panel
///
/// Lines are also forwarded to `tracing`.
#[derive(Debug)]
pub struct RingLog {
    capacity: usize,
    lines: Mutex<VecDeque<String>>,
}

impl RingLog {
    /// Create a ring with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(RING_LOG_CAPACITY)
    }

    /// Create a ring holding at most `capacity` lines
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            lines: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Snapshot of the retained lines, oldest first
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }

    /// Panel text: a `Log:` header followed by the retained lines
    pub fn render(&self) -> String {
        format!("Log: \n {}", self.lines().join("\n"))
    }
}

impl Default for RingLog {
    fn default() -> Self {
        Self::new()
    }
}

impl LogSink for RingLog {
    fn log(&self, values: &[&dyn Display]) {
        let line = join_values(values);
        tracing::info!(target: "vrlink::session", "{}", line);

        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() >= self.capacity {
            lines.pop_front();
        }
        lines.push_back(line);
    }
}

impl fmt::Display for RingLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
