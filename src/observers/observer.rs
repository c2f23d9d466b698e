//! # Event observer trait.
//!
//! Provides [`Observe`], the extension point for plugging logging, metrics or
//! alerting into the runtime.
//!
//! Each observer gets:
//! - **Dedicated worker task** (runs independently)
//! - **Per-observer bounded queue** (capacity via [`Observe::queue_capacity`])
//! - **Panic isolation** (panics are caught and reported as `EventKind::ObserverPanicked`)
//!
//! ## Example
//! ```rust
//! use async_trait::async_trait;
//! use pollbox::{Event, EventKind, Observe};
//!
//! struct Expiries;
//!
//! #[async_trait]
//! impl Observe for Expiries {
//!     async fn on_event(&self, ev: &Event) {
//!         if matches!(ev.kind, EventKind::SessionStopped) {
//!             // count expiries, etc.
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str { "expiries" }
//! }
//! ```

use async_trait::async_trait;

use crate::events::Event;

/// Event observer for runtime observability.
///
/// ### Implementation requirements
/// - Use async I/O; avoid blocking the executor.
/// - Handle errors internally; do not panic.
/// - Slow processing affects only this observer's queue.
#[async_trait]
pub trait Observe: Send + Sync + 'static {
    /// Processes a single event, in FIFO order per observer.
    async fn on_event(&self, event: &Event);

    /// Name used in overflow/panic events.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Preferred queue capacity (clamped to a minimum of 1). Default: 1024.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
