//! # Non-blocking event fan-out to multiple observers.
//!
//! ```text
//! emit(event)
//!     ├──► [queue 1] ──► worker 1 ──► observer1.on_event()
//!     │    (bounded)         └──────► panic → ObserverPanicked
//!     └──► [queue N] ──► worker N ──► observerN.on_event()
//! ```
//!
//! ## Rules
//! - **Non-blocking**: `emit()` uses `try_send` and returns immediately
//! - **Overflow**: event dropped for that observer only, `ObserverOverflow` published
//! - **Per-observer FIFO**; no ordering across observers
//! - **Isolation**: a panicking observer keeps running on the next event

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};
use crate::observers::Observe;

struct ObserverChannel {
    name: &'static str,
    sender: mpsc::Sender<Arc<Event>>,
}

/// Fan-out coordinator for multiple event observers.
pub struct ObserverSet {
    channels: Vec<ObserverChannel>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl ObserverSet {
    /// Creates a new set and spawns one worker task per observer.
    ///
    /// Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(observers: Vec<Arc<dyn Observe>>, bus: Bus) -> Self {
        let mut channels = Vec::with_capacity(observers.len());
        let mut workers = Vec::with_capacity(observers.len());

        for obs in observers {
            let name = obs.name();
            let (tx, rx) = mpsc::channel::<Arc<Event>>(obs.queue_capacity().max(1));
            workers.push(tokio::spawn(Self::worker(obs, rx, bus.clone())));
            channels.push(ObserverChannel { name, sender: tx });
        }
        Self {
            channels,
            workers,
            bus,
        }
    }

    async fn worker(obs: Arc<dyn Observe>, mut rx: mpsc::Receiver<Arc<Event>>, bus: Bus) {
        while let Some(ev) = rx.recv().await {
            let fut = obs.on_event(ev.as_ref());
            if let Err(panic_err) = std::panic::AssertUnwindSafe(fut).catch_unwind().await {
                bus.publish(Event::observer_panicked(obs.name(), panic_message(&*panic_err)));
            }
        }
    }

    /// Emits an event to all observers.
    ///
    /// `ObserverOverflow` events that themselves overflow are not re-published.
    pub fn emit(&self, event: Event) {
        let event = Arc::new(event);
        let is_overflow_evt = matches!(event.kind, EventKind::ObserverOverflow);

        for channel in &self.channels {
            let reason = match channel.sender.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if !is_overflow_evt {
                self.bus.publish(Event::observer_overflow(channel.name, reason));
            }
        }
    }

    /// Number of observers in the set.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if the set has no observers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Closes all queues and waits for workers to drain them.
    pub async fn shutdown(self) {
        drop(self.channels);
        for h in self.workers {
            let _ = h.await;
        }
    }
}

/// Extracts a readable message from a panic payload.
pub(crate) fn panic_message(any: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = any.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = any.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}
