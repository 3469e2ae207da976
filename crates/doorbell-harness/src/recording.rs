//! Recording collaborators for assertions.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use doorbell_app::SessionObserver;
use doorbell_core::{ConnectionState, HistoryStore, MemoryHistory, SessionNotification};
use doorbell_proto::{InfoEvent, RingEvent};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Observer that logs every notification. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    log: Arc<Mutex<Vec<SessionNotification>>>,
}

impl RecordingObserver {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification so far, in order.
    pub fn notifications(&self) -> Vec<SessionNotification> {
        lock(&self.log).clone()
    }

    /// Rings received so far.
    pub fn rings(&self) -> Vec<RingEvent> {
        lock(&self.log)
            .iter()
            .filter_map(|n| match n {
                SessionNotification::Ring { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Accepted info events so far.
    pub fn infos(&self) -> Vec<InfoEvent> {
        lock(&self.log)
            .iter()
            .filter_map(|n| match n {
                SessionNotification::Info { event, .. } => Some(event.clone()),
                _ => None,
            })
            .collect()
    }

    /// Connection state transitions so far.
    pub fn states(&self) -> Vec<ConnectionState> {
        lock(&self.log)
            .iter()
            .filter_map(|n| match n {
                SessionNotification::ConnectionStateChanged(state) => Some(*state),
                _ => None,
            })
            .collect()
    }

    /// Forget everything recorded.
    pub fn clear(&self) {
        lock(&self.log).clear();
    }
}

impl SessionObserver for RecordingObserver {
    fn notify(&mut self, notification: &SessionNotification) {
        lock(&self.log).push(notification.clone());
    }
}

/// [`MemoryHistory`] behind a shared handle, so tests can inspect what a
/// runtime recorded.
#[derive(Debug, Clone, Default)]
pub struct SharedHistory {
    inner: Arc<Mutex<MemoryHistory>>,
}

impl SharedHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the current history.
    pub fn snapshot(&self) -> MemoryHistory {
        lock(&self.inner).clone()
    }
}

impl HistoryStore for SharedHistory {
    fn record_doorbell_use(&mut self, token: &str, name: &str, at_ms: u64) {
        lock(&self.inner).record_doorbell_use(token, name, at_ms);
    }

    fn record_ringer_visit(&mut self, token: &str, name: &str, at_ms: u64) {
        lock(&self.inner).record_ringer_visit(token, name, at_ms);
    }
}
