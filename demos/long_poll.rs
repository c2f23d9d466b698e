//! # Long-poll chat demo
//!
//! One producer pushes notifications for two users while each user long-polls
//! their own session. `carol` never connects: her session buffers, then expires
//! and hands the unread messages to `terminate`.
//!
//! Flow:
//! ```text
//! producer ── send(user, msg, WaitUntil(+200ms)) ──► SessionSupervisor("chat")
//!                                                        ├─ chat/alice ◄── poll loop
//!                                                        ├─ chat/bob   ◄── poll loop
//!                                                        └─ chat/carol (no consumer → expires)
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example long_poll --features logging
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pollbox::{
    AckMode, CallFlow, Config, Handler, Init, LogWriter, Observe, SendError, SessionKey,
    SessionSupervisor, StopReason,
};

/// Per-user session state: number of messages handed out so far.
struct Notifications {
    user: SessionKey,
}

#[async_trait]
impl Handler for Notifications {
    type Init = ();
    type Message = String;
    type Info = ();
    type Call = ();
    type Reply = String;
    type Cast = ();

    async fn init(key: &SessionKey, _arg: ()) -> Init<Self> {
        Init::Ready(Notifications { user: key.clone() })
    }

    async fn handle_call(&mut self, _req: ()) -> CallFlow<String> {
        CallFlow::Reply(format!("session for {}", self.user.key()))
    }

    async fn terminate(&mut self, reason: &StopReason, undelivered: Vec<String>) {
        if !undelivered.is_empty() {
            println!(
                "[demo] {} stopped ({reason}); unread: {undelivered:?}",
                self.user
            );
        }
    }
}

async fn consume(sup: Arc<SessionSupervisor<Notifications>>, user: &'static str, polls: usize) {
    let mut received = 0;
    for _ in 0..polls {
        let session = match sup.ensure_started(user, ()).await {
            Ok(s) => s,
            Err(e) => {
                eprintln!("[{user}] cannot start session: {e}");
                return;
            }
        };
        match session.poll(Duration::from_millis(300)).await {
            Ok(Some(msg)) => {
                received += 1;
                println!("[{user}] got: {msg}");
            }
            Ok(None) => println!("[{user}] poll timed out"),
            Err(e) => println!("[{user}] poll failed: {e}"),
        }
    }
    println!("[{user}] done, {received} message(s)");
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cfg = Config {
        inactivity: Duration::from_millis(500),
        grace: Duration::from_secs(2),
        ..Config::default()
    };
    let observers: Vec<Arc<dyn Observe>> = vec![Arc::new(LogWriter::new())];
    let sup = SessionSupervisor::<Notifications>::builder("chat", cfg)
        .with_observers(observers)
        .build();

    let alice = tokio::spawn(consume(Arc::clone(&sup), "alice", 4));
    let bob = tokio::spawn(consume(Arc::clone(&sup), "bob", 4));

    for i in 1..=3 {
        for user in ["alice", "bob", "carol"] {
            let mode = AckMode::deadline(Duration::from_millis(200));
            match sup.send(user, format!("notification #{i}"), mode).await {
                Ok(()) => println!("[producer] {user} took #{i}"),
                Err(SendError::Timeout) => println!("[producer] {user} is away, #{i} queued"),
                Err(e) => println!("[producer] {user}: {e}"),
            }
        }
    }

    alice.await?;
    bob.await?;

    if let Some(session) = sup.find("alice").await {
        println!("[demo] {}", session.call(()).await?);
    }

    // Give carol's session time to expire.
    tokio::time::sleep(Duration::from_millis(800)).await;
    println!("[demo] live sessions: {:?}", sup.sessions().await);

    sup.shutdown().await?;
    Ok(())
}
