//! Session-facing types: identity, handler contract, addresses and consumer inboxes.
//!
//! ## Contents
//! - [`SessionKey`], [`SessionId`] identity of a session and of one actor incarnation
//! - [`Handler`] application logic hosted by a session ([`Init`], [`Flow`], [`CallFlow`], [`StopReason`])
//! - [`SessionHandle`] cloneable address; [`AckMode`] producer acknowledgment policy
//! - [`Inbox`], [`Consumer`], [`Delivery`], [`Token`] the consumer side of subscribe

mod ack;
mod handle;
mod handler;
mod inbox;
mod key;

pub(crate) use ack::{Ack, AckOutcome};
pub(crate) use handle::{Command, Startup};

pub use ack::AckMode;
pub use handle::{SessionHandle, SessionState, SessionStatus};
pub use handler::{CallFlow, Flow, Handler, Init, StopReason};
pub use inbox::{Consumer, Delivery, Inbox, Token};
pub use key::{SessionId, SessionKey};
