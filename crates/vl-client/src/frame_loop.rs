//! Fixed-cadence poll loop standing in for the render loop
//!
//! Every tick sends one `getData` poll and, once the server has pushed a
//! state, hands the latest snapshot to a [`FrameSink`]. Polls do not wait for
//! replies: a slow server only means frames render stale state.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use vl_protocol::{Command, StateSnapshot};

use crate::session::{SendOutcome, SessionHandle};

/// Receives the latest snapshot once per rendered frame
pub trait FrameSink: Send {
    /// Draw one frame from `snapshot`
    fn render(&mut self, snapshot: &StateSnapshot);
}

/// Counters for one run of the loop
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FrameStats {
    /// Ticks elapsed
    pub ticks: u64,
    /// Polls accepted by the transport
    pub polls_sent: u64,
    /// Frames handed to the sink
    pub rendered: u64,
}

/// Polls the session and feeds the sink at a fixed rate
pub struct FrameLoop {
    session: SessionHandle,
    interval: Duration,
}

impl FrameLoop {
    /// Create a loop ticking every `interval`
    pub fn new(session: SessionHandle, interval: Duration) -> Self {
        Self { session, interval }
    }

    /// Run one frame; returns whether anything was rendered
    pub fn tick<S: FrameSink + ?Sized>(&self, sink: &mut S, stats: &mut FrameStats) -> bool {
        stats.ticks += 1;
        if self.session.send(Command::GetData) == SendOutcome::Sent {
            stats.polls_sent += 1;
        }

        let Some(snapshot) = self.session.latest_state() else {
            return false;
        };
        sink.render(&snapshot);
        stats.rendered += 1;
        true
    }

    /// Tick until cancelled
    pub async fn run<S: FrameSink + ?Sized>(
        self,
        sink: &mut S,
        cancel: CancellationToken,
    ) -> FrameStats {
        let mut stats = FrameStats::default();
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.tick(sink, &mut stats);
                }
            }
        }

        tracing::debug!(
            "Frame loop stopped after {} ticks ({} rendered, {} polls sent)",
            stats.ticks,
            stats.rendered,
            stats.polls_sent
        );
        stats
    }
}

/// Status panel: a one-line summary of the latest snapshot
#[derive(Debug, Default)]
pub struct StatusSink {
    frames: u64,
    last_summary: String,
}

impl StatusSink {
    /// Create an empty status sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Frames rendered so far
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Summary of the most recent snapshot
    pub fn last_summary(&self) -> &str {
        &self.last_summary
    }
}

impl FrameSink for StatusSink {
    fn render(&mut self, snapshot: &StateSnapshot) {
        self.frames += 1;
        let summary = summarize(snapshot);
        if summary != self.last_summary {
            tracing::debug!("state: {}", summary);
            self.last_summary = summary;
        }
    }
}

const SUMMARY_MAX_CHARS: usize = 120;

fn summarize(snapshot: &StateSnapshot) -> String {
    match snapshot {
        StateSnapshot::Tracking { poses: tracking, .. } => {
            let [x, y, z] = tracking.hmd.pos;
            format!(
                "hmd pos [{:.3}, {:.3}, {:.3}] quat {:?}, {} trackers",
                x,
                y,
                z,
                tracking.hmd.quat,
                tracking.tracker_count()
            )
        }
        StateSnapshot::Data(value) => {
            let text = value.to_string();
            if text.chars().count() > SUMMARY_MAX_CHARS {
                let cut: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
                format!("{}...", cut)
            } else {
                text
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vl_protocol::{Pose, TrackingState};

    #[test]
    fn test_summarize_tracking() {
        let snapshot = StateSnapshot::Tracking {
            poses: TrackingState {
                hmd: Pose::new([0.0, 1.6, 0.0], [0.0, 0.0, 0.0, 1.0]),
                trackers: vec![Pose::IDENTITY, Pose::IDENTITY],
            },
            raw: json!({}),
        };
        assert_eq!(
            summarize(&snapshot),
            "hmd pos [0.000, 1.600, 0.000] quat [0.0, 0.0, 0.0, 1.0], 2 trackers"
        );
    }

    #[test]
    fn test_summarize_truncates_long_data() {
        let snapshot = StateSnapshot::Data(json!({ "blob": "x".repeat(500) }));
        let summary = summarize(&snapshot);
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS + 3);
    }

    #[test]
    fn test_status_sink_counts_frames() {
        let mut sink = StatusSink::new();
        let snapshot = StateSnapshot::Data(json!({"a": 1}));
        sink.render(&snapshot);
        sink.render(&snapshot);
        assert_eq!(sink.frames(), 2);
        assert_eq!(sink.last_summary(), r#"{"a":1}"#);
    }
}
