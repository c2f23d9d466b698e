//! Runtime core: session state machine, registry and supervision.
//!
//! Public API from this module is [`SessionSupervisor`] with its [`SupervisorBuilder`],
//! the [`Config`], and the [`KeyRegistry`] seam with its in-process [`LocalRegistry`].
//!
//! Internal modules:
//! - [`actor`]: one session task (mailbox, queue, subscriber, inactivity timer);
//! - [`timer`]: restartable inactivity deadline;
//! - [`alive`]: live-session tracking for shutdown reports;
//! - [`shutdown`]: cross-platform termination signals.

mod actor;
mod alive;
mod builder;
mod config;
mod registry;
mod shutdown;
mod supervisor;
mod timer;

pub use builder::SupervisorBuilder;
pub use config::Config;
pub use registry::{Address, Claim, KeyRegistry, LocalRegistry};
pub use supervisor::SessionSupervisor;
