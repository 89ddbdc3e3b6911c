//! Latest server-pushed state, shared between the session and the render loop
//!
//! The cell is last-write-wins: every `newData`/`trackingData` frame replaces
//! the whole snapshot, nothing is merged and no history is kept. It is empty
//! until the first such frame arrives.
//!
//! [`SharedState`] is the single writer and stays inside the session;
//! [`StateReader`] handles are handed out to anything that renders.

use std::sync::Arc;

use tokio::sync::watch;
use vl_protocol::StateSnapshot;

type Slot = Option<Arc<StateSnapshot>>;

/// Writer side of the latest-state cell
#[derive(Debug)]
pub struct SharedState {
    tx: watch::Sender<Slot>,
}

impl SharedState {
    /// Create an empty cell
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx }
    }

    /// Replace the snapshot wholesale
    pub fn replace(&self, snapshot: StateSnapshot) {
        self.tx.send_replace(Some(Arc::new(snapshot)));
    }

    /// Latest snapshot, if any frame has arrived yet
    pub fn latest(&self) -> Option<Arc<StateSnapshot>> {
        self.tx.borrow().clone()
    }

    /// Create a read-only handle
    pub fn reader(&self) -> StateReader {
        StateReader {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Read-only handle to the latest-state cell
#[derive(Debug, Clone)]
pub struct StateReader {
    rx: watch::Receiver<Slot>,
}

impl StateReader {
    /// Latest snapshot, if any frame has arrived yet
    pub fn latest(&self) -> Option<Arc<StateSnapshot>> {
        self.rx.borrow().clone()
    }

    /// Wait until the snapshot is replaced, then return the new one
    ///
    /// Returns `None` once the writer is gone.
    pub async fn changed(&mut self) -> Option<Arc<StateSnapshot>> {
        self.rx.changed().await.ok()?;
        self.rx.borrow_and_update().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_until_first_replace() {
        let state = SharedState::new();
        assert!(state.latest().is_none());
        assert!(state.reader().latest().is_none());
    }

    #[test]
    fn test_replace_is_wholesale() {
        let state = SharedState::new();
        let reader = state.reader();

        state.replace(StateSnapshot::Data(json!({"a": 1, "keep": true})));
        state.replace(StateSnapshot::Data(json!({"b": 2})));

        let latest = reader.latest().unwrap();
        assert_eq!(*latest, StateSnapshot::Data(json!({"b": 2})));
    }

    #[tokio::test]
    async fn test_reader_observes_change() {
        let state = SharedState::new();
        let mut reader = state.reader();

        let waiter = tokio::spawn(async move { reader.changed().await });
        tokio::task::yield_now().await;
        state.replace(StateSnapshot::Data(json!("hello")));

        let seen = waiter.await.unwrap().unwrap();
        assert_eq!(seen.data(), Some(&json!("hello")));
    }

    #[tokio::test]
    async fn test_reader_ends_when_writer_dropped() {
        let state = SharedState::new();
        let mut reader = state.reader();
        drop(state);
        assert!(reader.changed().await.is_none());
    }
}
