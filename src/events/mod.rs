//! Runtime events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: session actors, `SessionSupervisor`, `ObserverSet` workers (overflow/panic).
//! - **Consumers**: the supervisor's observer listener (fans out to `ObserverSet`
//!   and updates `AliveTracker`) and any receiver from `SessionSupervisor::events`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
