//! # SessionActor: one mailbox per key.
//!
//! Owns the FIFO queue, the optional subscriber, the inactivity timer and the
//! handler state of one session. All inputs are serialized through one loop:
//!
//! ```text
//! loop {
//!   ├─► check invariants (panic on violation)
//!   ├─► select (biased):
//!   │     ├─ cancellation token   → stop(Shutdown)
//!   │     ├─ mailbox command      → Send / Subscribe / Call / Cast / Info / Status
//!   │     ├─ inactivity timer     → stop(Inactive)
//!   │     ├─ subscriber closed    → drop subscriber, restart timer
//!   │     └─ handler timeout      → Handler::handle_timeout
//!   └─► apply Flow (Continue / ContinueFor / Stop)
//! }
//! ```
//!
//! ## States
//! ```text
//!            send                     subscribe (queue non-empty): pop + deliver
//!   Idle ─────────────► Buffered ◄──────────────────────────┐
//!    │  ▲                  │                                │
//!    │  └── deliver ───────┼──── Subscribed ◄── subscribe ──┘ (queue empty)
//!    │     (send arrives)  │          │
//!    └──── timer ──────────┴──────────┴──► Stopped ──► Handler::terminate(reason, undelivered)
//! ```
//!
//! Stopping unregisters the key first, then drains the mailbox: pending sends join
//! the undelivered list and their waiting producers observe `SessionClosed`.
//! A declining `init` drains the same way, but drops the sends without a `terminate`.
//!
//! ## Rules
//! - At most one subscriber; a second subscribe is rejected, state untouched.
//! - A subscriber is never kept while messages are queued.
//! - The inactivity timer is armed exactly when no subscriber is attached.
//! - A producer's deadline is re-tested at the delivery instant.
//! - Violating any of the above is a logic bug and aborts the task.

use std::collections::VecDeque;
use std::future::pending;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio::select;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, Sleep};
use tokio_util::sync::CancellationToken;

use crate::core::registry::KeyRegistry;
use crate::core::timer::InactivityTimer;
use crate::error::{CallError, SessionError, SubscribeError};
use crate::events::{Bus, Event, EventKind};
use crate::session::{
    Ack, AckOutcome, CallFlow, Command, Consumer, Flow, Handler, Init, SessionHandle, SessionId,
    SessionKey, SessionState, SessionStatus, Startup, StopReason, Token,
};

/// Everything a session task needs, assembled by the supervisor.
pub(crate) struct ActorParams<H: Handler> {
    pub key: SessionKey,
    pub id: SessionId,
    /// Own address, used once to re-validate ownership.
    pub me: SessionHandle<H>,
    pub init: H::Init,
    pub registry: Arc<dyn KeyRegistry<SessionHandle<H>>>,
    pub bus: Bus,
    pub inactivity: Duration,
    pub rx: mpsc::Receiver<Command<H>>,
    pub token: CancellationToken,
    /// Init outcome for every holder of a handle.
    pub startup: watch::Sender<Startup>,
    /// Reports the init outcome back to the creator.
    pub ready: oneshot::Sender<Result<(), SessionError<H>>>,
}

struct Queued<M> {
    payload: M,
    ack: Ack,
}

struct Subscriber<M> {
    consumer: Consumer<M>,
    token: Token,
}

enum Step<H: Handler> {
    Cancelled,
    Command(Option<Command<H>>),
    Expired,
    SubscriberLost,
    HandlerTimeout,
}

pub(crate) struct SessionActor<H: Handler> {
    key: SessionKey,
    id: SessionId,
    handler: H,
    queue: VecDeque<Queued<H::Message>>,
    subscriber: Option<Subscriber<H::Message>>,
    timer: InactivityTimer,
    handler_deadline: Option<Pin<Box<Sleep>>>,
    registry: Arc<dyn KeyRegistry<SessionHandle<H>>>,
    bus: Bus,
}

/// Runs a session from ownership re-validation to `terminate`.
///
/// Returns the stop reason, or `None` if the session never started.
pub(crate) async fn run_session<H: Handler>(p: ActorParams<H>) -> Option<StopReason> {
    let ActorParams {
        key,
        id,
        me,
        init,
        registry,
        bus,
        inactivity,
        mut rx,
        token,
        startup,
        ready,
    } = p;

    // The claim and the spawn are separate steps: confirm we still own the key.
    let claim = registry.register_or_locate(&key, me).await;
    if !claim.is_owner {
        bus.publish(
            Event::new(EventKind::RegistrationConflict)
                .with_session(&key, id)
                .with_reason(claim.owner.id().to_string()),
        );
        startup.send_replace(Startup::Failed);
        let _ = ready.send(Err(SessionError::AlreadyRegistered(claim.owner)));
        return None;
    }
    drop(claim);

    let outcome = match H::init(&key, init).await {
        Init::Ready(h) => Ok(h),
        Init::Ignore => Err((Arc::from("ignore"), SessionError::HandlerDeclined)),
        Init::Stop(reason) => Err((Arc::clone(&reason), SessionError::HandlerStopped(reason))),
    };
    let handler = match outcome {
        Ok(h) => h,
        Err((reason, err)) => {
            registry.unregister(&key, id).await;
            // Nothing was started: queued sends are dropped and their producers see SessionClosed.
            let dropped = drain_mailbox(&mut rx, &key);
            bus.publish(
                Event::new(EventKind::SessionDeclined)
                    .with_session(&key, id)
                    .with_reason(reason)
                    .with_queued(dropped.len()),
            );
            drop(dropped);
            startup.send_replace(Startup::Failed);
            let _ = ready.send(Err(err));
            return None;
        }
    };

    let mut actor = SessionActor {
        key,
        id,
        handler,
        queue: VecDeque::new(),
        subscriber: None,
        timer: InactivityTimer::new(inactivity),
        handler_deadline: None,
        registry,
        bus,
    };
    actor.timer.restart();
    actor.publish(EventKind::SessionStarted);
    startup.send_replace(Startup::Ready);
    // The creator may have given up waiting; the session runs regardless.
    let _ = ready.send(Ok(()));

    let reason = actor.run(&mut rx, &token).await;
    actor.finish(reason.clone(), rx).await;
    Some(reason)
}

impl<H: Handler> SessionActor<H> {
    async fn run(
        &mut self,
        rx: &mut mpsc::Receiver<Command<H>>,
        token: &CancellationToken,
    ) -> StopReason {
        loop {
            self.check_invariants();

            let step = select! {
                biased;
                _ = token.cancelled() => Step::Cancelled,
                cmd = rx.recv() => Step::Command(cmd),
                _ = self.timer.expired() => Step::Expired,
                _ = subscriber_gone(self.subscriber.as_ref()) => Step::SubscriberLost,
                _ = handler_deadline(self.handler_deadline.as_mut()) => Step::HandlerTimeout,
            };
            // Any input cancels a pending handler timeout.
            self.handler_deadline = None;

            let flow = match step {
                Step::Cancelled | Step::Command(None) => return StopReason::Shutdown,
                Step::Expired => return StopReason::Inactive,
                Step::Command(Some(cmd)) => self.on_command(cmd).await,
                Step::SubscriberLost => {
                    self.on_subscriber_lost();
                    Flow::Continue
                }
                Step::HandlerTimeout => self.handler.handle_timeout().await,
            };

            match flow {
                Flow::Continue => {}
                Flow::ContinueFor(d) => self.handler_deadline = Some(Box::pin(time::sleep(d))),
                Flow::Stop(reason) => return reason,
            }
        }
    }

    async fn on_command(&mut self, cmd: Command<H>) -> Flow {
        match cmd {
            Command::Send { message, ack } => {
                self.on_send(Queued {
                    payload: message,
                    ack,
                });
                Flow::Continue
            }
            Command::Subscribe {
                consumer,
                token,
                reply,
            } => {
                let res = self.on_subscribe(consumer, token);
                let _ = reply.send(res);
                Flow::Continue
            }
            Command::Call { request, reply } => match self.handler.handle_call(request).await {
                CallFlow::Reply(r) => {
                    let _ = reply.send(Ok(r));
                    Flow::Continue
                }
                CallFlow::ReplyAndStop(r, reason) => {
                    let _ = reply.send(Ok(r));
                    Flow::Stop(reason)
                }
                CallFlow::Stop(reason) => Flow::Stop(reason),
                CallFlow::Reject => {
                    self.publish(EventKind::UnhandledRequest);
                    let _ = reply.send(Err(CallError::Unhandled {
                        key: self.key.clone(),
                    }));
                    Flow::Continue
                }
            },
            Command::Cast(msg) => self.handler.handle_cast(msg).await,
            Command::Info(msg) => self.handler.handle_info(msg).await,
            Command::Status(reply) => {
                let _ = reply.send(self.status());
                Flow::Continue
            }
        }
    }

    fn on_send(&mut self, msg: Queued<H::Message>) {
        match self.subscriber.take() {
            Some(sub) => {
                self.deliver(&sub.consumer, sub.token, msg);
            }
            None => {
                self.queue.push_back(msg);
                self.bus.publish(
                    self.event(EventKind::MessageQueued)
                        .with_queued(self.queue.len()),
                );
            }
        }
    }

    fn on_subscribe(
        &mut self,
        consumer: Consumer<H::Message>,
        token: Token,
    ) -> Result<(), SubscribeError> {
        // A reconnecting consumer may subscribe before the old inbox's closure is observed.
        if self
            .subscriber
            .as_ref()
            .is_some_and(|s| s.consumer.is_closed())
        {
            self.on_subscriber_lost();
        }
        if self.subscriber.is_some() {
            self.bus
                .publish(self.event(EventKind::SubscribeRejected).with_token(token));
            return Err(SubscribeError::AlreadySubscribed {
                key: self.key.clone(),
            });
        }
        if consumer.is_closed() {
            self.bus.publish(
                self.event(EventKind::SubscribeRejected)
                    .with_token(token)
                    .with_reason("consumer_gone"),
            );
            return Err(SubscribeError::ConsumerGone {
                key: self.key.clone(),
            });
        }

        match self.queue.pop_front() {
            Some(msg) => {
                if !self.deliver(&consumer, token, msg) {
                    return Err(SubscribeError::ConsumerGone {
                        key: self.key.clone(),
                    });
                }
            }
            None => {
                // An expiry racing with this subscribe is discarded with the deadline.
                let raced = self.timer.cancel();
                self.subscriber = Some(Subscriber { consumer, token });
                let ev = self.event(EventKind::Subscribed).with_token(token);
                self.bus.publish(if raced {
                    ev.with_reason("expiry_discarded")
                } else {
                    ev
                });
            }
        }
        Ok(())
    }

    /// Hands `msg` to `consumer`; a closed inbox puts it back at the front.
    ///
    /// Returns `true` if the consumer got the message.
    fn deliver(
        &mut self,
        consumer: &Consumer<H::Message>,
        token: Token,
        msg: Queued<H::Message>,
    ) -> bool {
        let Queued { payload, ack } = msg;
        match consumer.deliver(token, payload) {
            Ok(()) => {
                let outcome = ack.acknowledge(Instant::now());
                self.timer.restart();
                self.bus.publish(
                    self.event(EventKind::MessageDelivered)
                        .with_token(token)
                        .with_queued(self.queue.len()),
                );
                if outcome == AckOutcome::DeadlinePassed {
                    self.bus
                        .publish(self.event(EventKind::AckSkipped).with_token(token));
                }
                true
            }
            Err(payload) => {
                self.queue.push_front(Queued { payload, ack });
                self.timer.restart();
                self.bus
                    .publish(self.event(EventKind::SubscriberLost).with_token(token));
                false
            }
        }
    }

    fn on_subscriber_lost(&mut self) {
        if let Some(sub) = self.subscriber.take() {
            self.timer.restart();
            self.bus
                .publish(self.event(EventKind::SubscriberLost).with_token(sub.token));
        }
    }

    fn status(&self) -> SessionStatus {
        let state = if self.subscriber.is_some() {
            SessionState::Subscribed
        } else if self.queue.is_empty() {
            SessionState::Idle
        } else {
            SessionState::Buffered
        };
        SessionStatus {
            state,
            queued: self.queue.len(),
        }
    }

    fn check_invariants(&self) {
        if self.subscriber.is_some() {
            assert!(
                self.queue.is_empty(),
                "session {}: subscriber attached with {} queued messages",
                self.key,
                self.queue.len()
            );
            assert!(
                !self.timer.is_armed(),
                "session {}: inactivity timer armed while subscribed",
                self.key
            );
        } else {
            assert!(
                self.timer.is_armed(),
                "session {}: no subscriber and no inactivity timer",
                self.key
            );
        }
    }

    /// Unregisters, drains the mailbox and hands undelivered messages to the handler.
    async fn finish(mut self, reason: StopReason, mut rx: mpsc::Receiver<Command<H>>) {
        self.registry.unregister(&self.key, self.id).await;
        let pending = drain_mailbox(&mut rx, &self.key);
        self.queue.extend(pending);
        self.subscriber = None;
        self.timer.cancel();

        // Dropping the acks tells waiting producers the session closed.
        let undelivered: Vec<H::Message> = self.queue.drain(..).map(|q| q.payload).collect();
        let lost = undelivered.len();
        self.handler.terminate(&reason, undelivered).await;
        self.bus.publish(
            self.event(EventKind::SessionStopped)
                .with_reason(reason.to_string())
                .with_queued(lost),
        );
    }

    fn event(&self, kind: EventKind) -> Event {
        Event::new(kind).with_session(&self.key, self.id)
    }

    fn publish(&self, kind: EventKind) {
        self.bus.publish(self.event(kind));
    }
}

/// Closes the mailbox and empties it.
///
/// Pending sends are returned with their acks; subscribers are told the session
/// closed. Other commands are dropped, which surfaces as `SessionClosed` to callers.
fn drain_mailbox<H: Handler>(
    rx: &mut mpsc::Receiver<Command<H>>,
    key: &SessionKey,
) -> Vec<Queued<H::Message>> {
    rx.close();
    let mut sends = Vec::new();
    while let Ok(cmd) = rx.try_recv() {
        match cmd {
            Command::Send { message, ack } => sends.push(Queued {
                payload: message,
                ack,
            }),
            Command::Subscribe { reply, .. } => {
                let _ = reply.send(Err(SubscribeError::SessionClosed { key: key.clone() }));
            }
            _ => {}
        }
    }
    sends
}

async fn subscriber_gone<M>(sub: Option<&Subscriber<M>>) {
    match sub {
        Some(s) => s.consumer.closed().await,
        None => pending::<()>().await,
    }
}

async fn handler_deadline(sleep: Option<&mut Pin<Box<Sleep>>>) {
    match sleep {
        Some(s) => s.as_mut().await,
        None => pending::<()>().await,
    }
}
