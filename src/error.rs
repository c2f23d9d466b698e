//! Error types used by the pollbox runtime and sessions.
//!
//! - [`SessionError`]: session creation failed (conflict, handler refusal).
//! - [`SendError`]: a producer's send was not acknowledged.
//! - [`SubscribeError`]: a consumer could not subscribe.
//! - [`CallError`]: a request/response call to the handler failed.
//! - [`RuntimeError`]: the supervisor itself failed (grace exceeded, signals).
//!
//! All of them are ordinary values returned to the caller. Invariant violations
//! inside a session are not errors: they abort the session task.
//!
//! Each type provides `as_label()`, a short stable label for logs.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::session::{Handler, SessionHandle, SessionKey};

/// # Errors produced when creating a session.
#[non_exhaustive]
#[derive(Error)]
pub enum SessionError<H: Handler> {
    /// Another live session already owns the key; carries its handle.
    #[error("session {} already registered", .0.key())]
    AlreadyRegistered(SessionHandle<H>),

    /// [`Handler::init`] returned [`Init::Ignore`](crate::Init::Ignore).
    #[error("handler declined to start session")]
    HandlerDeclined,

    /// [`Handler::init`] returned [`Init::Stop`](crate::Init::Stop).
    #[error("handler stopped during init: {0}")]
    HandlerStopped(Arc<str>),

    /// The session task ended before reporting its init result.
    #[error("session task exited during init")]
    Closed,
}

impl<H: Handler> fmt::Debug for SessionError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::AlreadyRegistered(h) => {
                f.debug_tuple("AlreadyRegistered").field(h).finish()
            }
            SessionError::HandlerDeclined => f.write_str("HandlerDeclined"),
            SessionError::HandlerStopped(r) => f.debug_tuple("HandlerStopped").field(r).finish(),
            SessionError::Closed => f.write_str("Closed"),
        }
    }
}

impl<H: Handler> SessionError<H> {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SessionError::AlreadyRegistered(_) => "session_already_registered",
            SessionError::HandlerDeclined => "session_handler_declined",
            SessionError::HandlerStopped(_) => "session_handler_stopped",
            SessionError::Closed => "session_closed",
        }
    }

    /// Handle of the winning session for [`SessionError::AlreadyRegistered`].
    pub fn into_existing(self) -> Option<SessionHandle<H>> {
        match self {
            SessionError::AlreadyRegistered(h) => Some(h),
            _ => None,
        }
    }
}

/// # Errors produced by [`SessionHandle::send`](crate::SessionHandle::send).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SendError {
    /// The deadline passed before a subscriber took the message.
    ///
    /// The message is still queued and will be delivered later.
    #[error("not delivered within deadline")]
    Timeout,

    /// The session stopped before accepting or delivering the message.
    #[error("session {key} closed")]
    SessionClosed {
        /// Key of the closed session.
        key: SessionKey,
    },

    /// No session existed and the handler refused to start one.
    #[error("session {key} could not be started: {label}")]
    NotStarted {
        /// Key of the session.
        key: SessionKey,
        /// Label of the underlying [`SessionError`].
        label: &'static str,
    },
}

impl SendError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SendError::Timeout => "send_timeout",
            SendError::SessionClosed { .. } => "send_session_closed",
            SendError::NotStarted { .. } => "send_not_started",
        }
    }
}

/// # Errors produced by [`SessionHandle::subscribe`](crate::SessionHandle::subscribe).
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    /// Another consumer is already waiting on this session.
    #[error("session {key} already has a subscriber")]
    AlreadySubscribed {
        /// Key of the session.
        key: SessionKey,
    },

    /// The session stopped.
    #[error("session {key} closed")]
    SessionClosed {
        /// Key of the closed session.
        key: SessionKey,
    },

    /// The consumer's inbox was closed before anything could be handed to it.
    ///
    /// Any queued message stays in the session for the next subscriber.
    #[error("consumer of session {key} is gone")]
    ConsumerGone {
        /// Key of the session.
        key: SessionKey,
    },
}

impl SubscribeError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubscribeError::AlreadySubscribed { .. } => "subscribe_already_subscribed",
            SubscribeError::SessionClosed { .. } => "subscribe_session_closed",
            SubscribeError::ConsumerGone { .. } => "subscribe_consumer_gone",
        }
    }
}

/// # Errors produced by [`SessionHandle::call`](crate::SessionHandle::call) and friends.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    /// The handler rejected the request.
    #[error("request not handled by session {key}")]
    Unhandled {
        /// Key of the session.
        key: SessionKey,
    },

    /// The session stopped before replying.
    #[error("session {key} closed")]
    SessionClosed {
        /// Key of the closed session.
        key: SessionKey,
    },
}

impl CallError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            CallError::Unhandled { .. } => "call_unhandled",
            CallError::SessionClosed { .. } => "call_session_closed",
        }
    }
}

/// # Errors produced by the supervisor runtime.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Shutdown grace period was exceeded; some sessions were still running.
    #[error("shutdown timeout {grace:?} exceeded; stuck: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Sessions that did not stop in time.
        stuck: Vec<SessionKey>,
    },

    /// OS signal handlers could not be installed.
    #[error("signal handler registration failed: {0}")]
    Signal(#[from] std::io::Error),
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use pollbox::RuntimeError;
    /// use std::time::Duration;
    ///
    /// let err = RuntimeError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "runtime_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
            RuntimeError::Signal(_) => "runtime_signal",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        let key = SessionKey::new("g", "k");
        assert_eq!(SendError::Timeout.as_label(), "send_timeout");
        assert_eq!(
            SubscribeError::AlreadySubscribed { key: key.clone() }.as_label(),
            "subscribe_already_subscribed"
        );
        assert_eq!(
            CallError::Unhandled { key }.as_label(),
            "call_unhandled"
        );
    }

    #[test]
    fn test_messages_name_the_session() {
        let err = SubscribeError::AlreadySubscribed {
            key: SessionKey::new("chat", "u1"),
        };
        assert_eq!(err.to_string(), "session chat/u1 already has a subscriber");
    }
}
