//! # Consumer inbox.
//!
//! A consumer (typically one long-poll request) owns an [`Inbox`] and hands out
//! its [`Consumer`] address when subscribing. The session delivers exactly one
//! [`Delivery`] per successful subscribe, tagged with the [`Token`] that
//! subscribe returned.
//!
//! ## Liveness
//! The inbox *is* the consumer's liveness handle: while a session holds a
//! subscriber it watches [`Consumer::closed`], which resolves once the inbox is
//! dropped or [closed](Inbox::close). That is treated as liveness loss and the
//! session returns to idle without touching its queue.
//!
//! ```text
//! Inbox ──consumer()──► Consumer ──subscribe──► SessionActor
//!   ▲                                              │
//!   └──────────── Delivery { token, message } ◄────┘
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(1);

/// Correlates a subscribe call with the delivery it produces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Token(u64);

impl Token {
    pub(crate) fn next() -> Self {
        Self(TOKEN_SEQ.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value (for logs).
    #[inline]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message handed to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery<M> {
    /// Token returned by the subscribe call that produced this delivery.
    pub token: Token,
    /// The payload sent by the producer.
    pub message: M,
}

/// Address of a consumer inbox, given to sessions on subscribe.
pub struct Consumer<M> {
    tx: mpsc::UnboundedSender<Delivery<M>>,
}

impl<M> Clone for Consumer<M> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<M> fmt::Debug for Consumer<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<M> Consumer<M> {
    /// Hands `message` to the inbox; gives it back if the inbox is gone.
    pub(crate) fn deliver(&self, token: Token, message: M) -> Result<(), M> {
        self.tx
            .send(Delivery { token, message })
            .map_err(|e| e.0.message)
    }

    /// Returns `true` once the owning inbox is closed or dropped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves when the owning inbox is closed or dropped.
    pub async fn closed(&self) {
        self.tx.closed().await
    }
}

/// Receiving side owned by the consumer.
pub struct Inbox<M> {
    tx: mpsc::UnboundedSender<Delivery<M>>,
    rx: mpsc::UnboundedReceiver<Delivery<M>>,
}

impl<M> Default for Inbox<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> fmt::Debug for Inbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inbox").field("pending", &self.rx.len()).finish()
    }
}

impl<M> Inbox<M> {
    /// Creates an empty inbox.
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { tx, rx }
    }

    /// Address to pass to [`SessionHandle::subscribe`](crate::SessionHandle::subscribe).
    pub fn consumer(&self) -> Consumer<M> {
        Consumer {
            tx: self.tx.clone(),
        }
    }

    /// Waits for the next delivery.
    ///
    /// Returns `None` only after [`close`](Self::close) once the buffer is drained.
    pub async fn recv(&mut self) -> Option<Delivery<M>> {
        self.rx.recv().await
    }

    /// Waits for the delivery tagged with `token`, discarding older ones.
    pub async fn recv_token(&mut self, token: Token) -> Option<M> {
        while let Some(d) = self.rx.recv().await {
            if d.token == token {
                return Some(d.message);
            }
        }
        None
    }

    /// Non-blocking receive.
    pub fn try_recv(&mut self) -> Option<Delivery<M>> {
        self.rx.try_recv().ok()
    }

    /// Signals liveness loss to any session holding this inbox as subscriber.
    ///
    /// Deliveries already buffered stay readable via [`try_recv`](Self::try_recv).
    pub fn close(&mut self) {
        self.rx.close();
    }
}
