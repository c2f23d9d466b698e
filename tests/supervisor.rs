mod common;

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use common::{Echo, Probe, Req, SLOW_INIT, cfg, supervisor};
use pollbox::{
    AckMode, CallError, Config, Event, EventKind, KeyRegistry, LocalRegistry, Observe,
    RuntimeError, SendError, SessionError, SessionHandle, SessionKey, SessionSupervisor,
    StopReason,
};

#[tokio::test]
async fn test_one_live_session_per_key() {
    let sup = supervisor(cfg());
    let first = sup.create("alice", Probe::default()).await.unwrap();

    let err = sup.create("alice", Probe::default()).await.unwrap_err();
    assert_eq!(err.as_label(), "session_already_registered");
    let owner = err.into_existing().unwrap();
    assert!(owner.same_session(&first));

    let again = sup.ensure_started("alice", Probe::default()).await.unwrap();
    assert!(again.same_session(&first));
    assert_eq!(sup.sessions().await, vec![SessionKey::new("chat", "alice")]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_starts_agree_on_one_session() {
    let sup = supervisor(cfg());

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let sup = Arc::clone(&sup);
        tasks.push(tokio::spawn(async move {
            sup.ensure_started("bob", Probe::default()).await.unwrap().id()
        }));
    }
    let mut ids = HashSet::new();
    for t in tasks {
        ids.insert(t.await.unwrap());
    }
    assert_eq!(ids.len(), 1);
}

#[tokio::test]
async fn test_handler_can_decline_or_refuse() {
    let sup = supervisor(cfg());

    let err = sup.create("declined", Probe::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::HandlerDeclined));
    assert!(sup.find("declined").await.is_none());

    let err = sup.create("refused", Probe::default()).await.unwrap_err();
    assert!(matches!(err, SessionError::HandlerStopped(ref r) if &**r == "refused"));

    let err = sup
        .send("declined", "x".to_string(), AckMode::Async)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SendError::NotStarted { label: "session_handler_declined", .. }
    ));
}

#[tokio::test(start_paused = true)]
async fn test_callers_during_a_declining_init_see_the_decline() {
    let sup = supervisor(cfg());
    let creator = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move { sup.create("slow-declined", Probe::default()).await })
    };
    tokio::time::sleep(SLOW_INIT / 5).await;

    let err = sup
        .ensure_started("slow-declined", Probe::default())
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::HandlerDeclined));

    let err = sup
        .send("slow-declined", "dropped?".to_string(), AckMode::Async)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SendError::NotStarted { label: "session_handler_declined", .. }
    ));

    let created = creator.await.unwrap();
    assert!(matches!(created, Err(SessionError::HandlerDeclined)));
    assert!(sup.find("slow-declined").await.is_none());
    assert!(sup.sessions().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_callers_during_a_slow_init_get_the_started_session() {
    let sup = supervisor(cfg());
    let creator = {
        let sup = Arc::clone(&sup);
        tokio::spawn(async move { sup.create("slow", Probe::default()).await })
    };
    tokio::time::sleep(SLOW_INIT / 5).await;

    let found = sup.find("slow").await.unwrap();
    let joined = sup.ensure_started("slow", Probe::default()).await.unwrap();
    sup.send("slow", "early".to_string(), AckMode::Async).await.unwrap();

    let created = creator.await.unwrap().unwrap();
    assert!(found.same_session(&created));
    assert!(joined.same_session(&created));
    assert_eq!(
        created.poll(Duration::from_secs(1)).await.unwrap().as_deref(),
        Some("early")
    );
}

#[tokio::test(start_paused = true)]
async fn test_idle_session_expires_and_hands_back_messages() {
    let sup = supervisor(Config {
        inactivity: Duration::from_millis(50),
        ..cfg()
    });
    let (probe, mut stopped) = Probe::new();
    let session = sup.create("alice", probe).await.unwrap();
    session.send("unread".to_string(), AckMode::Async).await.unwrap();

    let (key, reason, undelivered) = stopped.recv().await.unwrap();
    assert_eq!(key, SessionKey::new("chat", "alice"));
    assert_eq!(reason, StopReason::Inactive);
    assert_eq!(undelivered, vec!["unread".to_string()]);
    assert!(sup.find("alice").await.is_none());
    assert!(session.is_closed());
}

#[tokio::test(start_paused = true)]
async fn test_subscribed_session_does_not_expire() {
    let sup = supervisor(Config {
        inactivity: Duration::from_millis(50),
        ..cfg()
    });
    let session = sup.create("alice", Probe::default()).await.unwrap();
    let inbox = pollbox::Inbox::<String>::new();
    session.subscribe(&inbox.consumer()).await.unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(sup.find("alice").await.is_some());

    // Losing the subscriber restarts the countdown.
    drop(inbox);
    session.closed().await;
    assert!(sup.find("alice").await.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_delivery_restarts_inactivity_window() {
    let sup = supervisor(Config {
        inactivity: Duration::from_millis(100),
        ..cfg()
    });
    let session = sup.create("alice", Probe::default()).await.unwrap();

    for i in 0..5 {
        tokio::time::sleep(Duration::from_millis(60)).await;
        session.send(format!("m{i}"), AckMode::Async).await.unwrap();
        let got = session.poll(Duration::from_millis(10)).await.unwrap();
        assert_eq!(got, Some(format!("m{i}")));
    }
    assert!(!session.is_closed());
}

#[tokio::test]
async fn test_send_after_stop_starts_fresh_session() {
    let sup = supervisor(cfg());
    let old = sup.create("alice", Probe::default()).await.unwrap();
    assert!(sup.terminate("alice").await);
    old.closed().await;

    sup.send("alice", "hello".to_string(), AckMode::Async).await.unwrap();
    let fresh = sup.find("alice").await.unwrap();
    assert!(!fresh.same_session(&old));
    assert_eq!(fresh.status().await.unwrap().queued, 1);

    assert!(!sup.terminate("nobody").await);
}

#[tokio::test]
async fn test_call_cast_and_info_reach_handler() {
    let sup = supervisor(cfg());
    let (probe, mut stopped) = Probe::new();
    let session = sup.create("alice", probe).await.unwrap();

    assert_eq!(session.call(Req::Count).await.unwrap(), 0);
    session.info(2).await.unwrap();
    session.info(3).await.unwrap();
    assert_eq!(session.call(Req::Count).await.unwrap(), 5);

    let err = session.call(Req::Unknown).await.unwrap_err();
    assert!(matches!(err, CallError::Unhandled { .. }));

    assert_eq!(session.call(Req::Finish).await.unwrap(), 5);
    let (_, reason, _) = stopped.recv().await.unwrap();
    assert_eq!(reason, StopReason::handler("requested"));

    let err = session.call(Req::Count).await.unwrap_err();
    assert!(matches!(err, CallError::SessionClosed { .. }));
}

#[tokio::test]
async fn test_crashed_session_is_reported_and_replaced() {
    let sup = supervisor(cfg());
    let mut events = sup.events();
    let session = sup.create("alice", Probe::default()).await.unwrap();

    session.info(0).await.unwrap();
    session.closed().await;

    loop {
        let ev = events.recv().await.unwrap();
        if ev.kind == EventKind::SessionCrashed {
            assert_eq!(ev.session, Some(session.id()));
            assert_eq!(ev.reason.as_deref(), Some("zero info"));
            break;
        }
    }
    assert!(sup.find("alice").await.is_none());

    sup.send("alice", "again".to_string(), AckMode::Async).await.unwrap();
    let fresh = sup.find("alice").await.unwrap();
    assert!(!fresh.same_session(&session));
}

#[tokio::test(start_paused = true)]
async fn test_handler_timeout_fires_when_quiet() {
    let sup = supervisor(cfg());
    let (probe, mut stopped) = Probe::new();
    let session = sup.create("alice", probe).await.unwrap();

    session.cast(Duration::from_millis(30)).await.unwrap();
    let (_, reason, _) = stopped.recv().await.unwrap();
    assert_eq!(reason, StopReason::handler("idle handler"));
}

#[tokio::test]
async fn test_shutdown_stops_every_session() {
    let sup = supervisor(cfg());
    let (probe, mut stopped) = Probe::new();
    sup.create("a", probe.clone()).await.unwrap();
    sup.create("b", probe).await.unwrap();

    sup.shutdown().await.unwrap();

    let mut keys = Vec::new();
    for _ in 0..2 {
        let (key, reason, _) = stopped.recv().await.unwrap();
        assert_eq!(reason, StopReason::Shutdown);
        keys.push(key);
    }
    keys.sort();
    assert_eq!(keys, vec![SessionKey::new("chat", "a"), SessionKey::new("chat", "b")]);
    assert!(sup.sessions().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_reports_stuck_sessions() {
    let sup = supervisor(Config {
        grace: Duration::from_millis(100),
        ..cfg()
    });
    let (probe, _stopped) = Probe::new();
    sup.create("fast", probe.clone()).await.unwrap();
    sup.create("slow", probe.lingering(Duration::from_secs(60)))
        .await
        .unwrap();

    match sup.shutdown().await {
        Err(RuntimeError::GraceExceeded { grace, stuck }) => {
            assert_eq!(grace, Duration::from_millis(100));
            assert_eq!(stuck, vec![SessionKey::new("chat", "slow")]);
        }
        other => panic!("expected GraceExceeded, got {other:?}"),
    }
}

#[tokio::test]
async fn test_shared_registry_spans_supervisors() {
    let registry: Arc<dyn KeyRegistry<SessionHandle<Echo>>> = Arc::new(LocalRegistry::new());
    let left = SessionSupervisor::<Echo>::builder("chat", cfg())
        .with_registry(Arc::clone(&registry))
        .build();
    let right = SessionSupervisor::<Echo>::builder("chat", cfg())
        .with_registry(registry)
        .build();

    let owner = left.create("alice", Probe::default()).await.unwrap();
    let err = right.create("alice", Probe::default()).await.unwrap_err();
    assert!(err.into_existing().unwrap().same_session(&owner));
}

struct Recorder(Mutex<Vec<EventKind>>);

#[async_trait]
impl Observe for Recorder {
    async fn on_event(&self, ev: &Event) {
        self.0.lock().unwrap().push(ev.kind);
    }

    fn name(&self) -> &'static str {
        "recorder"
    }
}

#[tokio::test]
async fn test_observers_see_session_lifecycle() {
    let recorder = Arc::new(Recorder(Mutex::new(Vec::new())));
    let sup = SessionSupervisor::<Echo>::builder("chat", cfg())
        .with_observers(vec![recorder.clone() as Arc<dyn Observe>])
        .build();
    let mut events = sup.events();

    sup.send("alice", "hi".to_string(), AckMode::Async).await.unwrap();
    let session = sup.find("alice").await.unwrap();
    session.poll(Duration::from_secs(1)).await.unwrap();
    sup.shutdown().await.unwrap();

    let seen = recorder.0.lock().unwrap().clone();
    for kind in [
        EventKind::SessionStarted,
        EventKind::MessageQueued,
        EventKind::MessageDelivered,
        EventKind::ShutdownRequested,
        EventKind::SessionStopped,
        EventKind::AllStoppedWithin,
    ] {
        assert!(seen.contains(&kind), "missing {kind:?} in {seen:?}");
    }

    let first = events.recv().await.unwrap();
    assert_eq!(first.kind, EventKind::SessionStarted);
    assert_eq!(first.key.as_deref(), Some("alice"));
}
