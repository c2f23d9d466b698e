//! # pollbox
//!
//! **Pollbox** is a long-poll session broker for Rust.
//!
//! A session is a keyed, transient mailbox between producers and exactly one
//! long-polling consumer at a time. Messages are queued while nobody listens and
//! handed over one at a time as soon as a consumer subscribes. A session that has
//! no subscriber and delivers nothing for the inactivity window stops on its own.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   producer               producer                    consumer (long poll)
//!      │ send(key, msg, ack)  │                             │ subscribe / poll
//!      ▼                      ▼                             ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  SessionSupervisor (one per group)                                │
//! │  - KeyRegistry (key → live SessionHandle, compare-and-set)        │
//! │  - Bus (broadcast events)                                         │
//! │  - AliveTracker (live sessions for shutdown reports)              │
//! │  - TaskTracker (one watcher per session task)                     │
//! └──────┬──────────────────┬──────────────────┬──────────────────────┘
//!        ▼                  ▼                  ▼
//!  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!  │ SessionActor │   │ SessionActor │   │ SessionActor │
//!  │  chat/alice  │   │  chat/bob    │   │  chat/carol  │
//!  └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!         │ SessionStarted, MessageQueued, MessageDelivered, SessionStopped, ...
//!         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                     Bus (broadcast channel)                       │
//! └─────────────────────────────────┬─────────────────────────────────┘
//!                                   ▼
//!                         ┌───────────────────┐
//!                         │ observer_listener │
//!                         └───┬───────────┬───┘
//!                             ▼           ▼
//!                      AliveTracker   ObserverSet ──► LogWriter, custom ...
//! ```
//!
//! ### One session
//! ```text
//! send ──► queue ──┐                    ┌── subscriber attached?
//!                  ├── deliver(front) ◄─┤      yes: hand over, ack producer,
//! subscribe ───────┘                    │           restart inactivity timer
//!                                       └──    no: keep queued, timer running
//!
//! timer fires (no subscriber) ──► Stopped(Inactive) ──► terminate(reason, undelivered)
//! ```
//!
//! ## Features
//! | Area            | Description                                              | Key types / traits                         |
//! |-----------------|----------------------------------------------------------|--------------------------------------------|
//! | **Sessions**    | Keyed mailboxes with a single long-poll subscriber.      | [`SessionHandle`], [`Inbox`], [`AckMode`]  |
//! | **Handlers**    | Application state and callbacks inside a session.        | [`Handler`], [`Flow`], [`CallFlow`]        |
//! | **Supervision** | Start, route to, terminate and shut down sessions.       | [`SessionSupervisor`], [`SupervisorBuilder`] |
//! | **Registry**    | Single owner per key, pluggable.                         | [`KeyRegistry`], [`LocalRegistry`]         |
//! | **Observers**   | Hook into runtime events (logging, metrics).             | [`Observe`], [`Event`]                     |
//! | **Errors**      | Typed results for every operation.                       | [`SendError`], [`SubscribeError`], ...     |
//! | **Configuration** | Inactivity window, capacities, shutdown grace.         | [`Config`]                                 |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use pollbox::{AckMode, Config, Handler, Init, SessionKey, SessionSupervisor, StopReason};
//!
//! struct Mailbox;
//!
//! #[async_trait]
//! impl Handler for Mailbox {
//!     type Init = ();
//!     type Message = String;
//!     type Info = ();
//!     type Call = ();
//!     type Reply = ();
//!     type Cast = ();
//!
//!     async fn init(_key: &SessionKey, _arg: ()) -> Init<Self> {
//!         Init::Ready(Mailbox)
//!     }
//!
//!     async fn terminate(&mut self, _reason: &StopReason, _undelivered: Vec<String>) {}
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sup = SessionSupervisor::<Mailbox>::builder("chat", Config::default()).build();
//!
//!     // Queued: nobody is listening yet.
//!     sup.send("alice", "hello".to_string(), AckMode::Async).await?;
//!
//!     // A long poll picks it up immediately.
//!     let session = sup.find("alice").await.ok_or("session missing")?;
//!     let msg = session.poll(Duration::from_secs(1)).await?;
//!     assert_eq!(msg.as_deref(), Some("hello"));
//!
//!     sup.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod core;
mod error;
mod events;
mod observers;
mod session;

// ---- Public re-exports ----

pub use crate::core::{
    Address, Claim, Config, KeyRegistry, LocalRegistry, SessionSupervisor, SupervisorBuilder,
};
pub use error::{CallError, RuntimeError, SendError, SessionError, SubscribeError};
pub use events::{Bus, Event, EventKind};
pub use observers::{Observe, ObserverSet};
pub use session::{
    AckMode, CallFlow, Consumer, Delivery, Flow, Handler, Inbox, Init, SessionHandle, SessionId,
    SessionKey, SessionState, SessionStatus, StopReason, Token,
};

// Optional: expose a simple built-in logger observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
