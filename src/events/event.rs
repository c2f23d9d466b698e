//! # Runtime events emitted by sessions and supervisors.
//!
//! The [`EventKind`] enum classifies event types across four categories:
//! - **Registration events**: session creation, conflicts, handler refusal
//! - **Protocol events**: queueing, delivery, subscribe, liveness loss
//! - **Terminal events**: session stopped or crashed
//! - **Runtime events**: shutdown and observer health
//!
//! The [`Event`] struct carries metadata such as timestamps, session identity,
//! reasons and queue length.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use pollbox::{Event, EventKind, SessionKey};
//!
//! let key = SessionKey::new("chat", "u1");
//! let ev = Event::new(EventKind::MessageQueued)
//!     .with_key(&key)
//!     .with_queued(3);
//!
//! assert_eq!(ev.kind, EventKind::MessageQueued);
//! assert_eq!(ev.session_key(), Some(key));
//! assert_eq!(ev.queued, Some(3));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::session::{SessionId, SessionKey, Token};

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(1);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Observer events ===
    /// Observer panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: observer name and panic message
    ObserverPanicked,

    /// Observer dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: observer name and "full" / "closed"
    ObserverOverflow,

    // === Shutdown events ===
    /// Supervisor shutdown started.
    ///
    /// Sets:
    /// - `group`
    ShutdownRequested,

    /// All sessions of the group stopped within the grace period.
    ///
    /// Sets:
    /// - `group`
    AllStoppedWithin,

    /// Grace period exceeded; some sessions did not stop in time.
    ///
    /// Sets:
    /// - `group`
    GraceExceeded,

    // === Registration events ===
    /// Session initialized and owns its key.
    ///
    /// Sets:
    /// - `group`, `key`, `session`
    SessionStarted,

    /// Handler refused to start (`Init::Ignore` / `Init::Stop`).
    ///
    /// Sets:
    /// - `group`, `key`, `session`
    /// - `reason`: "ignore" or the stop reason
    /// - `queued`: sends dropped from the mailbox
    SessionDeclined,

    /// A candidate lost the race for a key.
    ///
    /// Sets:
    /// - `group`, `key`, `session` (the loser)
    /// - `reason`: id of the owner
    RegistrationConflict,

    // === Protocol events ===
    /// Message buffered (no subscriber).
    ///
    /// Sets:
    /// - `group`, `key`, `session`
    /// - `queued`: queue length after the push
    MessageQueued,

    /// Message handed to a subscriber.
    ///
    /// Sets:
    /// - `group`, `key`, `session`, `token`
    /// - `queued`: queue length after delivery
    MessageDelivered,

    /// Delivery happened after the producer's deadline; acknowledgment skipped.
    ///
    /// Sets:
    /// - `group`, `key`, `session`, `token`
    AckSkipped,

    /// Consumer attached and is waiting.
    ///
    /// Sets:
    /// - `group`, `key`, `session`, `token`
    /// - `reason`: "expiry_discarded" if the inactivity deadline had already passed
    Subscribed,

    /// Subscribe rejected: a subscriber is already waiting, or the consumer is gone.
    ///
    /// Sets:
    /// - `group`, `key`, `session`, `token` (of the rejected request)
    /// - `reason`: "consumer_gone" for a closed inbox
    SubscribeRejected,

    /// Subscriber's inbox went away before a message arrived.
    ///
    /// Sets:
    /// - `group`, `key`, `session`, `token`
    SubscriberLost,

    /// Handler rejected a call.
    ///
    /// Sets:
    /// - `group`, `key`, `session`
    UnhandledRequest,

    // === Terminal events ===
    /// Session stopped and `terminate` returned.
    ///
    /// Sets:
    /// - `group`, `key`, `session`
    /// - `reason`: stop reason
    /// - `queued`: number of undelivered messages
    SessionStopped,

    /// Session task panicked (invariant violation or handler panic).
    ///
    /// Sets:
    /// - `group`, `key`, `session`
    /// - `reason`: panic message
    SessionCrashed,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Session group, if applicable.
    pub group: Option<Arc<str>>,
    /// Session key, if applicable.
    pub key: Option<Arc<str>>,
    /// Actor incarnation, if applicable.
    pub session: Option<SessionId>,
    /// Subscribe token, if applicable.
    pub token: Option<Token>,
    /// Queue length (compact).
    pub queued: Option<u32>,
    /// Human-readable reason (stop reasons, conflicts, panics).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            group: None,
            key: None,
            session: None,
            token: None,
            queued: None,
            reason: None,
        }
    }

    /// Attaches a group.
    #[inline]
    pub fn with_group(mut self, group: impl Into<Arc<str>>) -> Self {
        self.group = Some(group.into());
        self
    }

    /// Attaches group and key.
    #[inline]
    pub fn with_key(mut self, key: &SessionKey) -> Self {
        self.group = Some(key.group_arc());
        self.key = Some(key.key_arc());
        self
    }

    /// Attaches group, key and actor id.
    #[inline]
    pub fn with_session(self, key: &SessionKey, id: SessionId) -> Self {
        let mut ev = self.with_key(key);
        ev.session = Some(id);
        ev
    }

    /// Attaches a subscribe token.
    #[inline]
    pub fn with_token(mut self, token: Token) -> Self {
        self.token = Some(token);
        self
    }

    /// Attaches a queue length (saturating to `u32`).
    #[inline]
    pub fn with_queued(mut self, n: usize) -> Self {
        self.queued = Some(u32::try_from(n).unwrap_or(u32::MAX));
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Reassembles the session key when both group and key are set.
    pub fn session_key(&self) -> Option<SessionKey> {
        match (&self.group, &self.key) {
            (Some(g), Some(k)) => Some(SessionKey::new(Arc::clone(g), Arc::clone(k))),
            _ => None,
        }
    }

    /// Creates an observer overflow event.
    #[inline]
    pub fn observer_overflow(observer: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::ObserverOverflow)
            .with_reason(format!("observer={observer} reason={reason}"))
    }

    /// Creates an observer panic event.
    #[inline]
    pub fn observer_panicked(observer: &'static str, info: String) -> Self {
        Event::new(EventKind::ObserverPanicked)
            .with_reason(format!("observer={observer} panic={info}"))
    }

    /// Returns `true` for terminal session events.
    #[inline]
    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, EventKind::SessionStopped | EventKind::SessionCrashed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_is_monotonic() {
        let a = Event::new(EventKind::SessionStarted);
        let b = Event::new(EventKind::SessionStarted);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_queued_saturates() {
        let ev = Event::new(EventKind::MessageQueued).with_queued(usize::MAX);
        assert_eq!(ev.queued, Some(u32::MAX));
    }

    #[test]
    fn test_group_only_has_no_session_key() {
        let ev = Event::new(EventKind::ShutdownRequested).with_group("chat");
        assert_eq!(ev.session_key(), None);
        assert_eq!(ev.group.as_deref(), Some("chat"));
    }
}
