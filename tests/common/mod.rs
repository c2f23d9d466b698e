#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pollbox::{CallFlow, Config, Flow, Handler, Init, SessionKey, SessionSupervisor, StopReason};
use tokio::sync::mpsc;

/// How long `init` takes for the `slow*` keys.
pub const SLOW_INIT: Duration = Duration::from_millis(50);

/// What a session reported from `terminate`.
pub type Stopped = (SessionKey, StopReason, Vec<String>);

/// Init argument for [`Echo`]; the default reports nowhere.
#[derive(Clone, Default)]
pub struct Probe {
    pub stopped: Option<mpsc::UnboundedSender<Stopped>>,
    /// Time `terminate` takes.
    pub linger: Option<Duration>,
}

impl Probe {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Stopped>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                stopped: Some(tx),
                linger: None,
            },
            rx,
        )
    }

    pub fn lingering(mut self, d: Duration) -> Self {
        self.linger = Some(d);
        self
    }
}

#[derive(Debug)]
pub enum Req {
    Count,
    Finish,
    Unknown,
}

/// Test handler: counts infos, answers calls, arms handler timeouts on cast.
///
/// Keys `declined` and `refused` make `init` fail, `slow-declined` after [`SLOW_INIT`].
/// Key `slow` starts after [`SLOW_INIT`]. `info(0)` panics.
pub struct Echo {
    key: SessionKey,
    seen: u32,
    probe: Probe,
}

#[async_trait]
impl Handler for Echo {
    type Init = Probe;
    type Message = String;
    type Info = u32;
    type Call = Req;
    type Reply = u32;
    type Cast = Duration;

    async fn init(key: &SessionKey, probe: Probe) -> Init<Self> {
        if key.key().starts_with("slow") {
            tokio::time::sleep(SLOW_INIT).await;
        }
        match key.key() {
            "declined" | "slow-declined" => Init::Ignore,
            "refused" => Init::Stop(Arc::from("refused")),
            _ => Init::Ready(Echo {
                key: key.clone(),
                seen: 0,
                probe,
            }),
        }
    }

    async fn handle_info(&mut self, n: u32) -> Flow {
        assert!(n > 0, "zero info");
        self.seen += n;
        Flow::Continue
    }

    async fn handle_call(&mut self, req: Req) -> CallFlow<u32> {
        match req {
            Req::Count => CallFlow::Reply(self.seen),
            Req::Finish => CallFlow::ReplyAndStop(self.seen, StopReason::handler("requested")),
            Req::Unknown => CallFlow::Reject,
        }
    }

    async fn handle_cast(&mut self, quiet: Duration) -> Flow {
        Flow::ContinueFor(quiet)
    }

    async fn handle_timeout(&mut self) -> Flow {
        Flow::Stop(StopReason::handler("idle handler"))
    }

    async fn terminate(&mut self, reason: &StopReason, undelivered: Vec<String>) {
        if let Some(d) = self.probe.linger {
            tokio::time::sleep(d).await;
        }
        if let Some(tx) = &self.probe.stopped {
            let _ = tx.send((self.key.clone(), reason.clone(), undelivered));
        }
    }
}

pub fn cfg() -> Config {
    Config {
        inactivity: Duration::from_secs(30),
        mailbox_capacity: 64,
        bus_capacity: 1024,
        grace: Duration::from_secs(5),
    }
}

pub fn supervisor(cfg: Config) -> Arc<SessionSupervisor<Echo>> {
    SessionSupervisor::<Echo>::builder("chat", cfg).build()
}
