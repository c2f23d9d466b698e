//! # Inactivity timer.
//!
//! One per session. The timer is a single pinned [`Sleep`] that is re-armed in
//! place, so at most one deadline is ever outstanding.
//!
//! ```text
//! restart()  → cancel() then arm at now + window
//! cancel()   → disarm; returns true if the deadline had already passed but
//!              expiry was not yet observed (the stale expiry is discarded)
//! expired()  → resolves at the deadline while armed, never while disarmed
//! ```
//!
//! Expiry is observed only by polling [`InactivityTimer::expired`] from the actor
//! loop, so a cancelled timer cannot leave a late expiry behind in the mailbox.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{self, Instant, Sleep};

pub(crate) struct InactivityTimer {
    window: Duration,
    sleep: Pin<Box<Sleep>>,
    armed: bool,
}

impl InactivityTimer {
    /// Creates a disarmed timer.
    pub(crate) fn new(window: Duration) -> Self {
        Self {
            window,
            sleep: Box::pin(time::sleep(window)),
            armed: false,
        }
    }

    /// Cancels any outstanding deadline and arms a fresh one.
    pub(crate) fn restart(&mut self) {
        self.cancel();
        self.sleep.as_mut().reset(Instant::now() + self.window);
        self.armed = true;
    }

    /// Disarms the timer; `true` if it raced with firing.
    ///
    /// Expiry is only observed through [`expired`](Self::expired), so a passed but
    /// unobserved deadline is dropped here and reported to the caller.
    pub(crate) fn cancel(&mut self) -> bool {
        let raced = self.armed && Instant::now() >= self.sleep.deadline();
        self.armed = false;
        raced
    }

    #[inline]
    pub(crate) fn is_armed(&self) -> bool {
        self.armed
    }

    /// Resolves once the armed deadline passes; pending forever while disarmed.
    pub(crate) async fn expired(&mut self) {
        if self.armed {
            self.sleep.as_mut().await;
            self.armed = false;
        } else {
            pending::<()>().await;
        }
    }
}
