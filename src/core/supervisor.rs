//! # SessionSupervisor: starts, routes to, and shuts down the sessions of one group.
//!
//! The supervisor owns a [`KeyRegistry`], the event [`Bus`] and a [`TaskTracker`]
//! with one watcher task per session. It never restarts a session: a session that
//! stops or crashes is simply gone, and the next `send`/`ensure_started` for its key
//! starts a fresh incarnation.
//!
//! ## Architecture
//! ```text
//! create(key, init)
//!   ├─► SessionHandle{ mpsc::Sender, child token, startup } ──► registry.register_or_locate
//!   │        lost ─► wait for the owner's init ─┬─ started ─► Err(AlreadyRegistered(owner))
//!   │                                           └─ declined ─► claim again
//!   └─► tracker.spawn(watcher) ──► tokio::spawn(run_session) ──► ready ─► Ok(handle)
//!                       │
//!                       └─ JoinError(panic) ─► unregister + SessionCrashed
//!
//! send(key, msg, mode)
//!   └─► ensure_started ─► enqueue ─┬─ Ok ─► await ack (deadline-bound)
//!                                  └─ closed ─► retry with a fresh session
//!
//! shutdown()
//!   ├─► Bus.publish(ShutdownRequested)
//!   ├─► runtime_token.cancel()        → every session stops with StopReason::Shutdown
//!   └─► tracker.wait() within cfg.grace
//!          ├─ Ok      → AllStoppedWithin
//!          └─ timeout → GraceExceeded (AliveTracker.snapshot() names the stuck keys)
//! ```
//!
//! Consumers blocked in [`SessionHandle::poll`] while their session stops see no
//! delivery; their own wait bounds them.

use std::sync::Arc;

use tokio::sync::{Mutex, broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::core::actor::{ActorParams, run_session};
use crate::core::alive::AliveTracker;
use crate::core::builder::SupervisorBuilder;
use crate::core::registry::KeyRegistry;
use crate::core::{Config, shutdown};
use crate::error::{RuntimeError, SendError, SessionError};
use crate::events::{Bus, Event, EventKind};
use crate::observers::panic_message;
use crate::session::{
    AckMode, Command, Handler, SessionHandle, SessionId, SessionKey, Startup,
};

/// How many fresh sessions a single `send` may start before giving up.
const ROUTE_ATTEMPTS: usize = 3;

/// Supervises the sessions of one group.
pub struct SessionSupervisor<H: Handler> {
    group: Arc<str>,
    cfg: Config,
    registry: Arc<dyn KeyRegistry<SessionHandle<H>>>,
    bus: Bus,
    alive: Arc<AliveTracker>,
    tracker: TaskTracker,
    runtime_token: CancellationToken,
    listener_token: CancellationToken,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl<H: Handler> SessionSupervisor<H> {
    /// Starts building a supervisor for `group`.
    pub fn builder(group: impl Into<Arc<str>>, cfg: Config) -> SupervisorBuilder<H> {
        SupervisorBuilder::new(group, cfg)
    }

    pub(crate) fn new_internal(
        group: Arc<str>,
        cfg: Config,
        registry: Arc<dyn KeyRegistry<SessionHandle<H>>>,
        bus: Bus,
        alive: Arc<AliveTracker>,
        listener_token: CancellationToken,
        listener: JoinHandle<()>,
    ) -> Self {
        Self {
            group,
            cfg,
            registry,
            bus,
            alive,
            tracker: TaskTracker::new(),
            runtime_token: CancellationToken::new(),
            listener_token,
            listener: Mutex::new(Some(listener)),
        }
    }

    /// Group this supervisor serves.
    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Builds the full key for `key` in this group.
    pub fn key(&self, key: impl Into<Arc<str>>) -> SessionKey {
        SessionKey::new(Arc::clone(&self.group), key)
    }

    /// Subscribes to the runtime event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Starts a session for `key`.
    ///
    /// Fails with [`SessionError::AlreadyRegistered`] (carrying the owner's handle)
    /// when a live session holds the key, or with the handler's refusal.
    pub async fn create(
        &self,
        key: impl Into<Arc<str>>,
        init: H::Init,
    ) -> Result<SessionHandle<H>, SessionError<H>> {
        let key = self.key(key);
        let id = SessionId::next();
        let (tx, rx) = mpsc::channel(self.cfg.mailbox_capacity_clamped());
        let token = self.runtime_token.child_token();
        let (startup_tx, startup_rx) = watch::channel(Startup::Pending);
        let handle = SessionHandle::new(key.clone(), id, tx, token.clone(), startup_rx);

        loop {
            let claim = self.registry.register_or_locate(&key, handle.clone()).await;
            if claim.is_owner {
                break;
            }
            // An owner still in init may decline; it unregisters before reporting.
            if claim.owner.started().await {
                self.bus.publish(
                    Event::new(EventKind::RegistrationConflict)
                        .with_session(&key, id)
                        .with_reason(claim.owner.id().to_string()),
                );
                return Err(SessionError::AlreadyRegistered(claim.owner));
            }
        }

        let (ready_tx, ready_rx) = oneshot::channel();
        self.spawn(ActorParams {
            key,
            id,
            me: handle.clone(),
            init,
            registry: Arc::clone(&self.registry),
            bus: self.bus.clone(),
            inactivity: self.cfg.inactivity_window(),
            rx,
            token,
            startup: startup_tx,
            ready: ready_tx,
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(handle),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(SessionError::Closed),
        }
    }

    /// Returns the live session for `key`, starting one if needed.
    ///
    /// Losing a start race is not an error: the winner's handle is returned once
    /// its init succeeded. A decline is reported as an error, never as a handle.
    pub async fn ensure_started(
        &self,
        key: impl Into<Arc<str>>,
        init: H::Init,
    ) -> Result<SessionHandle<H>, SessionError<H>> {
        let key: Arc<str> = key.into();
        if let Some(handle) = self.find(Arc::clone(&key)).await {
            return Ok(handle);
        }
        match self.create(key, init).await {
            Err(SessionError::AlreadyRegistered(owner)) => Ok(owner),
            other => other,
        }
    }

    /// Looks up the live session for `key`.
    ///
    /// A session still running `Handler::init` is waited for; one that declines
    /// is reported as absent.
    pub async fn find(&self, key: impl Into<Arc<str>>) -> Option<SessionHandle<H>> {
        let handle = self.registry.lookup(&self.key(key)).await?;
        handle.started().await.then_some(handle)
    }

    /// Sends `message` to the session for `key`, starting it with `H::Init::default()`.
    ///
    /// A session that closes between lookup and enqueue is replaced and the send
    /// retried. Once enqueued the message is never re-sent: a deadline that passes
    /// yields [`SendError::Timeout`] while the message stays queued.
    pub async fn send(
        &self,
        key: impl Into<Arc<str>>,
        message: H::Message,
        mode: AckMode,
    ) -> Result<(), SendError>
    where
        H::Init: Default,
    {
        let key: Arc<str> = key.into();
        let (mut cmd, waiter) = Command::send(message, mode);

        for _ in 0..ROUTE_ATTEMPTS {
            let handle = match self.ensure_started(Arc::clone(&key), H::Init::default()).await {
                Ok(h) => h,
                Err(e) => {
                    return Err(SendError::NotStarted {
                        key: self.key(key),
                        label: e.as_label(),
                    });
                }
            };
            match handle.enqueue(cmd).await {
                Ok(()) => return handle.await_ack(waiter, mode).await,
                Err(back) => cmd = back,
            }
        }
        Err(SendError::SessionClosed { key: self.key(key) })
    }

    /// Asks the session for `key` to stop; returns `false` if none is running.
    ///
    /// The session stops with [`StopReason::Shutdown`](crate::StopReason::Shutdown)
    /// and hands undelivered messages to `terminate`.
    pub async fn terminate(&self, key: impl Into<Arc<str>>) -> bool {
        match self.find(key).await {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Keys of the live sessions in this group.
    pub async fn sessions(&self) -> Vec<SessionKey> {
        self.registry.keys(&self.group).await
    }

    /// Stops every session and waits up to `cfg.grace` for them to finish.
    ///
    /// Observers are flushed before returning.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        self.bus
            .publish(Event::new(EventKind::ShutdownRequested).with_group(Arc::clone(&self.group)));
        self.runtime_token.cancel();
        self.tracker.close();

        let res = match time::timeout(self.cfg.grace, self.tracker.wait()).await {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::AllStoppedWithin).with_group(Arc::clone(&self.group)),
                );
                Ok(())
            }
            Err(_elapsed) => {
                self.bus.publish(
                    Event::new(EventKind::GraceExceeded).with_group(Arc::clone(&self.group)),
                );
                Err(RuntimeError::GraceExceeded {
                    grace: self.cfg.grace,
                    stuck: self.alive.snapshot().await,
                })
            }
        };

        self.stop_listener().await;
        res
    }

    /// Serves until SIGINT/SIGTERM/SIGQUIT (Ctrl-C elsewhere), then shuts down.
    pub async fn run_until_signal(&self) -> Result<(), RuntimeError> {
        shutdown::wait_for_shutdown_signal().await?;
        self.shutdown().await
    }

    fn spawn(&self, params: ActorParams<H>) {
        let key = params.key.clone();
        let id = params.id;
        let registry = Arc::clone(&self.registry);
        let bus = self.bus.clone();

        let session = tokio::spawn(run_session(params));
        self.tracker.spawn(async move {
            let Err(err) = session.await else {
                return;
            };
            if err.is_panic() {
                registry.unregister(&key, id).await;
                let info = panic_message(&*err.into_panic());
                bus.publish(
                    Event::new(EventKind::SessionCrashed)
                        .with_session(&key, id)
                        .with_reason(info),
                );
            }
        });
    }

    async fn stop_listener(&self) {
        self.listener_token.cancel();
        if let Some(listener) = self.listener.lock().await.take() {
            let _ = listener.await;
        }
    }
}

impl<H: Handler> Drop for SessionSupervisor<H> {
    fn drop(&mut self) {
        self.runtime_token.cancel();
        self.listener_token.cancel();
    }
}
