use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::session::domain::session::{ConnectionId, FrameStats, Session};
use crate::shared::constants::DEFAULT_LOG_SAMPLE_INTERVAL;

/// Per-connection state for every open connection.
///
/// Only map insert/remove/lookup is serialized; a session's fields are
/// touched by that connection's frames alone.
pub struct SessionRegistry {
    sessions: Mutex<HashMap<ConnectionId, Session>>,
    next_id: AtomicU64,
    sample_interval: u64,
}

impl SessionRegistry {
    pub fn new(sample_interval: u64) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            sample_interval: sample_interval.max(1),
        }
    }

    /// Hands out a fresh id; ids are never reused within a process.
    pub fn allocate_id(&self) -> ConnectionId {
        ConnectionId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub fn on_connect(&self, id: ConnectionId) {
        self.lock().insert(id, Session::default());
        log::info!("Client connected: {id}");
    }

    /// Removing an unknown id is a no-op.
    pub fn on_disconnect(&self, id: ConnectionId) {
        match self.lock().remove(&id) {
            Some(session) => log::info!(
                "Client disconnected: {id} ({} frames processed)",
                session.frames_processed
            ),
            None => log::debug!("Disconnect for unknown session {id}"),
        }
    }

    /// Updates the session's frame accounting. `None` when `id` has no session.
    pub fn on_frame(&self, id: ConnectionId, now: Instant) -> Option<FrameStats> {
        let mut sessions = self.lock();
        let session = sessions.get_mut(&id)?;
        Some(session.record_frame(now, self.sample_interval))
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.lock().contains_key(&id)
    }

    pub fn frames_processed(&self, id: ConnectionId) -> Option<u64> {
        self.lock().get(&id).map(|s| s.frames_processed)
    }

    pub fn sample_interval(&self) -> u64 {
        self.sample_interval
    }

    // A panic while holding the lock can't leave a session half-written,
    // so a poisoned map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<ConnectionId, Session>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_SAMPLE_INTERVAL)
    }
}
