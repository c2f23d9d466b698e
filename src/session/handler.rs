//! # Pluggable per-session logic.
//!
//! A [`Handler`] is the application code living inside a session. The session
//! actor owns the protocol (send / subscribe / expiry) and forwards everything
//! else to the handler:
//!
//! ```text
//! create/ensure_started ──► Handler::init(key, arg) ──► Ready(self) | Ignore | Stop(reason)
//!
//! SessionHandle::info(msg)  ──► handle_info(msg)    ──► Flow
//! SessionHandle::cast(msg)  ──► handle_cast(msg)    ──► Flow
//! SessionHandle::call(req)  ──► handle_call(req)    ──► CallFlow<Reply>
//! (quiet for ContinueFor d) ──► handle_timeout()    ──► Flow
//!
//! session stops ──► terminate(reason, undelivered)   (exactly once)
//! ```
//!
//! The handler value *is* the session's application state; it is mutated through
//! `&mut self` and never inspected by the runtime.
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use pollbox::{Flow, Handler, Init, SessionKey, StopReason};
//!
//! struct Chat {
//!     seen: usize,
//! }
//!
//! #[async_trait]
//! impl Handler for Chat {
//!     type Init = ();
//!     type Message = String;
//!     type Info = ();
//!     type Call = ();
//!     type Reply = usize;
//!     type Cast = ();
//!
//!     async fn init(_key: &SessionKey, _arg: ()) -> Init<Self> {
//!         Init::Ready(Chat { seen: 0 })
//!     }
//!
//!     async fn handle_info(&mut self, _msg: ()) -> Flow {
//!         self.seen += 1;
//!         Flow::Continue
//!     }
//!
//!     async fn terminate(&mut self, _reason: &StopReason, _undelivered: Vec<String>) {}
//! }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::session::key::SessionKey;

/// Why a session stopped.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// No subscriber and no delivery for the inactivity window.
    Inactive,
    /// Stopped by the supervisor (terminate or shutdown).
    Shutdown,
    /// Stopped by the handler.
    Handler(Arc<str>),
}

impl StopReason {
    /// Handler-directed stop with a reason text.
    pub fn handler(reason: impl Into<Arc<str>>) -> Self {
        StopReason::Handler(reason.into())
    }

    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            StopReason::Inactive => "inactive",
            StopReason::Shutdown => "shutdown",
            StopReason::Handler(_) => "handler_stop",
        }
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopReason::Handler(r) => write!(f, "handler_stop: {r}"),
            other => f.write_str(other.as_label()),
        }
    }
}

/// Result of [`Handler::init`].
pub enum Init<H> {
    /// Session starts with this handler state.
    Ready(H),
    /// Handler declined; no session is created.
    Ignore,
    /// Handler refused with a reason; no session is created.
    Stop(Arc<str>),
}

/// What the session does after a handler callback.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Keep running.
    Continue,
    /// Keep running; call [`Handler::handle_timeout`] if nothing else arrives within the duration.
    ContinueFor(Duration),
    /// Stop the session.
    Stop(StopReason),
}

/// Outcome of [`Handler::handle_call`].
#[derive(Debug)]
pub enum CallFlow<R> {
    /// Reply and keep running.
    Reply(R),
    /// Reply, then stop.
    ReplyAndStop(R, StopReason),
    /// Stop without replying; the caller observes a closed session.
    Stop(StopReason),
    /// Request not understood; the caller gets [`CallError::Unhandled`](crate::CallError::Unhandled).
    Reject,
}

/// Application logic hosted by a session.
#[async_trait]
pub trait Handler: Sized + Send + 'static {
    /// Argument passed to [`init`](Self::init).
    type Init: Send + 'static;
    /// Payload routed through send / subscribe.
    type Message: Send + 'static;
    /// Arbitrary out-of-protocol messages.
    type Info: Send + 'static;
    /// Request type for [`call`](crate::SessionHandle::call).
    type Call: Send + 'static;
    /// Reply type for [`call`](crate::SessionHandle::call).
    type Reply: Send + 'static;
    /// Fire-and-forget request type.
    type Cast: Send + 'static;

    /// Builds the handler state for a new session.
    async fn init(key: &SessionKey, arg: Self::Init) -> Init<Self>;

    /// Handles an out-of-protocol message.
    async fn handle_info(&mut self, _msg: Self::Info) -> Flow {
        Flow::Continue
    }

    /// Handles a request/response call.
    async fn handle_call(&mut self, _req: Self::Call) -> CallFlow<Self::Reply> {
        CallFlow::Reject
    }

    /// Handles a fire-and-forget request.
    async fn handle_cast(&mut self, _msg: Self::Cast) -> Flow {
        Flow::Continue
    }

    /// Called when a [`Flow::ContinueFor`] window passes with no other message.
    async fn handle_timeout(&mut self) -> Flow {
        Flow::Continue
    }

    /// Called exactly once when the session stops, with messages never delivered.
    async fn terminate(&mut self, reason: &StopReason, undelivered: Vec<Self::Message>);
}
