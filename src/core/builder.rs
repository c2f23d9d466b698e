use std::sync::Arc;

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{alive::AliveTracker, supervisor::SessionSupervisor};
use crate::core::Config;
use crate::core::registry::{KeyRegistry, LocalRegistry};
use crate::events::{Bus, Event};
use crate::observers::{Observe, ObserverSet};
use crate::session::{Handler, SessionHandle};

/// Builder for a [`SessionSupervisor`] with optional observers and registry.
pub struct SupervisorBuilder<H: Handler> {
    group: Arc<str>,
    cfg: Config,
    observers: Vec<Arc<dyn Observe>>,
    registry: Option<Arc<dyn KeyRegistry<SessionHandle<H>>>>,
}

impl<H: Handler> SupervisorBuilder<H> {
    /// Creates a builder for `group` with the given configuration.
    pub fn new(group: impl Into<Arc<str>>, cfg: Config) -> Self {
        Self {
            group: group.into(),
            cfg,
            observers: Vec::new(),
            registry: None,
        }
    }

    /// Sets event observers.
    ///
    /// Each observer gets a dedicated worker with a bounded queue.
    pub fn with_observers(mut self, observers: Vec<Arc<dyn Observe>>) -> Self {
        self.observers = observers;
        self
    }

    /// Replaces the default in-process [`LocalRegistry`].
    ///
    /// Supervisors sharing a registry share key ownership.
    pub fn with_registry(mut self, registry: Arc<dyn KeyRegistry<SessionHandle<H>>>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Builds the supervisor and starts its observer listener.
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<SessionSupervisor<H>> {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let observers = ObserverSet::new(self.observers, bus.clone());
        let alive = Arc::new(AliveTracker::new());
        let registry: Arc<dyn KeyRegistry<SessionHandle<H>>> = match self.registry {
            Some(registry) => registry,
            None => Arc::new(LocalRegistry::new()),
        };

        let listener_token = CancellationToken::new();
        let listener = observer_listener(&bus, observers, Arc::clone(&alive), listener_token.clone());

        Arc::new(SessionSupervisor::new_internal(
            self.group,
            self.cfg,
            registry,
            bus,
            alive,
            listener_token,
            listener,
        ))
    }
}

/// Forwards bus events to the alive tracker and observers until `token` fires,
/// then drains what is already buffered and flushes the observers.
fn observer_listener(
    bus: &Bus,
    observers: ObserverSet,
    alive: Arc<AliveTracker>,
    token: CancellationToken,
) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                msg = rx.recv() => match msg {
                    Ok(ev) => {
                        alive.update(&ev).await;
                        observers.emit(ev);
                    }
                    Err(RecvError::Lagged(_)) => {
                        observers.emit(Event::observer_overflow("listener", "lagged"));
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = token.cancelled() => break,
            }
        }
        while let Ok(ev) = rx.try_recv() {
            alive.update(&ev).await;
            observers.emit(ev);
        }
        observers.shutdown().await;
    })
}
