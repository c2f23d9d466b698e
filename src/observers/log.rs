//! # LogWriter: simple event printer
//!
//! A minimal observer that prints incoming [`Event`]s to stdout, one line each.
//! Use it for tests or demos.
//!
//! ## Example output
//! ```text
//! [session-started] session=chat/u1 id=#3
//! [queued] session=chat/u1 queued=Some(1)
//! [subscribed] session=chat/u1 token=Some(Token(7))
//! [delivered] session=chat/u1 token=Some(Token(8)) queued=Some(0)
//! [stopped] session=chat/u1 reason="inactive" undelivered=Some(0)
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::observers::Observe;

/// Event writer observer.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn session(e: &Event) -> String {
    match (&e.group, &e.key) {
        (Some(g), Some(k)) => format!("{g}/{k}"),
        (Some(g), None) => g.to_string(),
        _ => "-".to_string(),
    }
}

#[async_trait]
impl Observe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let s = session(e);
        let reason = e.reason.as_deref().unwrap_or("");
        match e.kind {
            EventKind::SessionStarted => {
                let id = e.session.map(|id| id.to_string()).unwrap_or_default();
                println!("[session-started] session={s} id={id}");
            }
            EventKind::SessionDeclined => {
                println!(
                    "[session-declined] session={s} reason={reason:?} dropped={:?}",
                    e.queued
                );
            }
            EventKind::RegistrationConflict => {
                println!("[registration-conflict] session={s} owner={reason}");
            }
            EventKind::MessageQueued => {
                println!("[queued] session={s} queued={:?}", e.queued);
            }
            EventKind::MessageDelivered => {
                println!(
                    "[delivered] session={s} token={:?} queued={:?}",
                    e.token, e.queued
                );
            }
            EventKind::AckSkipped => {
                println!("[ack-skipped] session={s} token={:?}", e.token);
            }
            EventKind::Subscribed => {
                println!("[subscribed] session={s} token={:?} {reason}", e.token);
            }
            EventKind::SubscribeRejected => {
                println!("[subscribe-rejected] session={s} token={:?} {reason}", e.token);
            }
            EventKind::SubscriberLost => {
                println!("[subscriber-lost] session={s} token={:?}", e.token);
            }
            EventKind::UnhandledRequest => {
                println!("[unhandled] session={s}");
            }
            EventKind::SessionStopped => {
                println!(
                    "[stopped] session={s} reason={reason:?} undelivered={:?}",
                    e.queued
                );
            }
            EventKind::SessionCrashed => {
                println!("[crashed] session={s} panic={reason:?}");
            }
            EventKind::ShutdownRequested => println!("[shutdown-requested] group={s}"),
            EventKind::AllStoppedWithin => println!("[all-stopped-within-grace] group={s}"),
            EventKind::GraceExceeded => println!("[grace-exceeded] group={s}"),
            EventKind::ObserverOverflow => println!("[observer-overflow] {reason}"),
            EventKind::ObserverPanicked => println!("[observer-panicked] {reason}"),
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
