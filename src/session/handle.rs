//! # Session address.
//!
//! [`SessionHandle`] is the cloneable address of a live session actor. Every
//! operation is a message into the actor's mailbox; the actor processes them
//! strictly one at a time.
//!
//! ## Blocking behavior
//! ```text
//! send(Async)         → returns once enqueued
//! send(WaitForever)   → returns once delivered to a subscriber
//! send(WaitUntil(t))  → returns once delivered, or Timeout at t (message stays queued)
//! subscribe           → returns a Token once the actor accepted the subscriber;
//!                       the message itself arrives later in the consumer's Inbox
//! call                → returns the handler's reply
//! cast / info         → return once enqueued
//! ```

use std::fmt;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::error::{CallError, SendError, SubscribeError};
use crate::session::ack::{Ack, AckMode};
use crate::session::handler::Handler;
use crate::session::inbox::{Consumer, Inbox, Token};
use crate::session::key::{SessionId, SessionKey};

/// Conceptual state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No subscriber, empty queue.
    Idle,
    /// No subscriber, messages waiting.
    Buffered,
    /// A consumer is waiting; the queue is empty.
    Subscribed,
}

/// Point-in-time view of a session, see [`SessionHandle::status`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionStatus {
    /// Current state.
    pub state: SessionState,
    /// Number of buffered messages.
    pub queued: usize,
}

/// Outcome of `Handler::init`, as seen through a handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Startup {
    Pending,
    Ready,
    Failed,
}

/// Mailbox messages understood by the session actor.
pub(crate) enum Command<H: Handler> {
    Send {
        message: H::Message,
        ack: Ack,
    },
    Subscribe {
        consumer: Consumer<H::Message>,
        token: Token,
        reply: oneshot::Sender<Result<(), SubscribeError>>,
    },
    Call {
        request: H::Call,
        reply: oneshot::Sender<Result<H::Reply, CallError>>,
    },
    Cast(H::Cast),
    Info(H::Info),
    Status(oneshot::Sender<SessionStatus>),
}

impl<H: Handler> Command<H> {
    /// Builds a send command and the acknowledgment the producer may await.
    pub(crate) fn send(message: H::Message, mode: AckMode) -> (Self, Option<oneshot::Receiver<()>>) {
        let (ack, waiter) = Ack::pair(mode);
        (Command::Send { message, ack }, waiter)
    }
}

/// Cloneable address of a session actor.
pub struct SessionHandle<H: Handler> {
    key: SessionKey,
    id: SessionId,
    tx: mpsc::Sender<Command<H>>,
    cancel: CancellationToken,
    startup: watch::Receiver<Startup>,
}

impl<H: Handler> Clone for SessionHandle<H> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            id: self.id,
            tx: self.tx.clone(),
            cancel: self.cancel.clone(),
            startup: self.startup.clone(),
        }
    }
}

impl<H: Handler> fmt::Debug for SessionHandle<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("key", &self.key)
            .field("id", &self.id)
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl<H: Handler> SessionHandle<H> {
    pub(crate) fn new(
        key: SessionKey,
        id: SessionId,
        tx: mpsc::Sender<Command<H>>,
        cancel: CancellationToken,
        startup: watch::Receiver<Startup>,
    ) -> Self {
        Self {
            key,
            id,
            tx,
            cancel,
            startup,
        }
    }

    /// Key of the session.
    #[inline]
    pub fn key(&self) -> &SessionKey {
        &self.key
    }

    /// Id of this actor incarnation.
    #[inline]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Returns `true` once the session stopped accepting messages.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Returns `true` if both handles address the same actor incarnation.
    #[inline]
    pub fn same_session(&self, other: &Self) -> bool {
        self.id == other.id
    }

    /// Sends a message, acknowledged according to `mode`.
    ///
    /// On [`SendError::Timeout`] the message stays queued and is still delivered
    /// to the next subscriber.
    pub async fn send(&self, message: H::Message, mode: AckMode) -> Result<(), SendError> {
        let (cmd, waiter) = Command::send(message, mode);
        self.enqueue(cmd).await.map_err(|_| self.send_closed())?;
        self.await_ack(waiter, mode).await
    }

    /// Subscribes `consumer` for the next message.
    ///
    /// The message arrives later in the consumer's [`Inbox`] tagged with the returned token.
    /// A session accepts one subscriber at a time.
    pub async fn subscribe(&self, consumer: &Consumer<H::Message>) -> Result<Token, SubscribeError> {
        let token = Token::next();
        let (reply, rx) = oneshot::channel();
        let cmd = Command::Subscribe {
            consumer: consumer.clone(),
            token,
            reply,
        };
        let closed = || SubscribeError::SessionClosed {
            key: self.key.clone(),
        };
        self.enqueue(cmd).await.map_err(|_| closed())?;
        rx.await.map_err(|_| closed())??;
        Ok(token)
    }

    /// One long-poll round trip: waits up to `wait` for the next message.
    ///
    /// Returns `Ok(None)` if nothing arrived in time. A message racing the timeout
    /// is either returned or left queued for the next poll, never lost.
    pub async fn poll(&self, wait: Duration) -> Result<Option<H::Message>, SubscribeError> {
        let mut inbox = Inbox::new();
        let token = self.subscribe(&inbox.consumer()).await?;

        match time::timeout(wait, inbox.recv_token(token)).await {
            Ok(message) => Ok(message),
            Err(_elapsed) => {
                inbox.close();
                Ok(inbox
                    .try_recv()
                    .filter(|d| d.token == token)
                    .map(|d| d.message))
            }
        }
    }

    /// Request/response round trip through [`Handler::handle_call`].
    pub async fn call(&self, request: H::Call) -> Result<H::Reply, CallError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::Call { request, reply })
            .await
            .map_err(|_| self.call_closed())?;
        rx.await.map_err(|_| self.call_closed())?
    }

    /// Fire-and-forget through [`Handler::handle_cast`].
    pub async fn cast(&self, msg: H::Cast) -> Result<(), CallError> {
        self.enqueue(Command::Cast(msg))
            .await
            .map_err(|_| self.call_closed())
    }

    /// Out-of-protocol message through [`Handler::handle_info`].
    pub async fn info(&self, msg: H::Info) -> Result<(), CallError> {
        self.enqueue(Command::Info(msg))
            .await
            .map_err(|_| self.call_closed())
    }

    /// Current state and queue length.
    pub async fn status(&self) -> Result<SessionStatus, CallError> {
        let (reply, rx) = oneshot::channel();
        self.enqueue(Command::Status(reply))
            .await
            .map_err(|_| self.call_closed())?;
        rx.await.map_err(|_| self.call_closed())
    }

    /// Resolves once the session task stopped accepting messages.
    pub async fn closed(&self) {
        self.tx.closed().await
    }

    /// Puts a command into the mailbox; gives it back if the session is gone.
    pub(crate) async fn enqueue(&self, cmd: Command<H>) -> Result<(), Command<H>> {
        self.tx.send(cmd).await.map_err(|e| e.0)
    }

    /// Waits for the acknowledgment of an already enqueued send.
    pub(crate) async fn await_ack(
        &self,
        waiter: Option<oneshot::Receiver<()>>,
        mode: AckMode,
    ) -> Result<(), SendError> {
        let Some(rx) = waiter else {
            return Ok(());
        };
        match mode.instant() {
            Some(deadline) => match time::timeout_at(deadline, rx).await {
                Ok(res) => res.map_err(|_| self.send_closed()),
                Err(_elapsed) => Err(SendError::Timeout),
            },
            None => rx.await.map_err(|_| self.send_closed()),
        }
    }

    /// Waits for `Handler::init` to finish; `true` if the session started.
    ///
    /// A task that died during init counts as failed.
    pub(crate) async fn started(&self) -> bool {
        let mut startup = self.startup.clone();
        matches!(
            startup
                .wait_for(|s| *s != Startup::Pending)
                .await
                .map(|s| *s),
            Ok(Startup::Ready)
        )
    }

    pub(crate) fn cancel(&self) {
        self.cancel.cancel();
    }

    fn send_closed(&self) -> SendError {
        SendError::SessionClosed {
            key: self.key.clone(),
        }
    }

    fn call_closed(&self) -> CallError {
        CallError::SessionClosed {
            key: self.key.clone(),
        }
    }
}
