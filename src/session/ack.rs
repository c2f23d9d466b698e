//! # Acknowledgment modes for producers.
//!
//! [`AckMode`] decides when a producer's [`send`](crate::SessionHandle::send) returns:
//!
//! ```text
//! Async          → as soon as the message is in the session mailbox
//! WaitForever    → when the message reaches a subscriber (however long that takes)
//! WaitUntil(t)   → when the message reaches a subscriber, or Timeout at `t`
//! ```
//!
//! ## Rules
//! - A producer timing out does **not** withdraw the message; it stays queued
//!   and is delivered to the next subscriber.
//! - The deadline is evaluated exactly once, by the session, at the delivery
//!   instant. A delivery after `t` skips the acknowledgment.

use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

/// When a producer's send is acknowledged relative to actual delivery.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum AckMode {
    /// Fire-and-forget: acknowledged once enqueued.
    #[default]
    Async,
    /// Block until the message is delivered to a subscriber.
    WaitForever,
    /// Block until delivery or until the instant passes.
    WaitUntil(Instant),
}

impl AckMode {
    /// `WaitUntil(now + d)`.
    pub fn deadline(d: Duration) -> Self {
        AckMode::WaitUntil(Instant::now() + d)
    }

    /// Returns the deadline for `WaitUntil`, otherwise `None`.
    #[inline]
    pub fn instant(&self) -> Option<Instant> {
        match self {
            AckMode::WaitUntil(t) => Some(*t),
            _ => None,
        }
    }
}

/// What happened to an acknowledgment at delivery time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum AckOutcome {
    /// Producer did not ask to be acknowledged.
    NotRequested,
    /// Producer was notified.
    Acknowledged,
    /// Deadline had already passed; producer left alone.
    DeadlinePassed,
    /// Producer stopped waiting before delivery.
    ProducerGone,
}

/// Session-side half of a pending acknowledgment.
#[derive(Debug)]
pub(crate) enum Ack {
    None,
    Forever(oneshot::Sender<()>),
    Until(Instant, oneshot::Sender<()>),
}

impl Ack {
    /// Builds the session half and, if the producer waits, the receiver it awaits.
    pub(crate) fn pair(mode: AckMode) -> (Self, Option<oneshot::Receiver<()>>) {
        match mode {
            AckMode::Async => (Ack::None, None),
            AckMode::WaitForever => {
                let (tx, rx) = oneshot::channel();
                (Ack::Forever(tx), Some(rx))
            }
            AckMode::WaitUntil(t) => {
                let (tx, rx) = oneshot::channel();
                (Ack::Until(t, tx), Some(rx))
            }
        }
    }

    /// Notifies the producer, re-testing the deadline against `now`.
    pub(crate) fn acknowledge(self, now: Instant) -> AckOutcome {
        let tx = match self {
            Ack::None => return AckOutcome::NotRequested,
            Ack::Forever(tx) => tx,
            Ack::Until(deadline, _) if now >= deadline => return AckOutcome::DeadlinePassed,
            Ack::Until(_, tx) => tx,
        };
        match tx.send(()) {
            Ok(()) => AckOutcome::Acknowledged,
            Err(()) => AckOutcome::ProducerGone,
        }
    }
}
