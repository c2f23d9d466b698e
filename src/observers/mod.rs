//! # Event observers for the pollbox runtime.
//!
//! ```text
//! SessionActor ── publish(Event) ──► Bus ──► observer_listener
//!                                               ├──► ObserverSet ──► Observe::on_event(&Event)
//!                                               │                     ├─ LogWriter
//!                                               │                     └─ custom ...
//!                                               └──► AliveTracker (live sessions for shutdown)
//! ```

#[cfg(feature = "logging")]
mod log;
mod observer;
mod observer_set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use observer::Observe;
pub use observer_set::ObserverSet;

pub(crate) use observer_set::panic_message;
