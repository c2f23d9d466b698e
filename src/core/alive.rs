//! # Live-session tracker fed from the event bus.
//!
//! The supervisor's listener forwards every bus event here. The tracker keeps the
//! set of sessions that announced `SessionStarted` and have not yet reported a
//! terminal event, so shutdown can name the sessions that outlived the grace period.
//!
//! ```text
//! SessionActor ──► Bus ──► listener ──► AliveTracker::update()
//!                                              │
//!                                              ▼
//!                                 HashMap<SessionId, Entry{key, last_seq}>
//! ```
//!
//! ## Rules
//! - `SessionStarted` inserts; `SessionStopped` / `SessionCrashed` remove.
//! - Other events for a tracked session only advance `last_seq`.
//! - Events with `seq <= last_seq` are stale and ignored.
//! - Reads are eventually consistent with the bus.

use std::collections::HashMap;

use tokio::sync::RwLock;

use crate::events::{Event, EventKind};
use crate::session::{SessionId, SessionKey};

#[derive(Debug, Clone)]
struct Entry {
    key: SessionKey,
    last_seq: u64,
}

/// Tracks which session incarnations are currently running.
#[derive(Default)]
pub(crate) struct AliveTracker {
    state: RwLock<HashMap<SessionId, Entry>>,
}

impl AliveTracker {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Applies one event; returns `true` if the live set changed.
    pub(crate) async fn update(&self, ev: &Event) -> bool {
        let Some(id) = ev.session else {
            return false;
        };

        let mut state = self.state.write().await;
        match ev.kind {
            EventKind::SessionStarted => {
                let Some(key) = ev.session_key() else {
                    return false;
                };
                match state.get_mut(&id) {
                    Some(entry) if ev.seq <= entry.last_seq => false,
                    Some(entry) => {
                        entry.last_seq = ev.seq;
                        false
                    }
                    None => {
                        state.insert(id, Entry { key, last_seq: ev.seq });
                        true
                    }
                }
            }
            EventKind::SessionStopped | EventKind::SessionCrashed => match state.get(&id) {
                Some(entry) if ev.seq <= entry.last_seq => false,
                Some(_) => state.remove(&id).is_some(),
                None => false,
            },
            _ => {
                if let Some(entry) = state.get_mut(&id) {
                    entry.last_seq = entry.last_seq.max(ev.seq);
                }
                false
            }
        }
    }

    /// Keys of running sessions, sorted.
    pub(crate) async fn snapshot(&self) -> Vec<SessionKey> {
        let state = self.state.read().await;
        let mut keys: Vec<SessionKey> = state.values().map(|e| e.key.clone()).collect();
        keys.sort_unstable();
        keys
    }

    #[cfg(test)]
    pub(crate) async fn is_alive(&self, id: SessionId) -> bool {
        self.state.read().await.contains_key(&id)
    }
}
