mod common;

use std::time::Duration;

use common::{Probe, cfg, supervisor};
use pollbox::{
    AckMode, EventKind, Inbox, SendError, SessionState, StopReason, SubscribeError,
};
use tokio::time::Instant;

#[tokio::test]
async fn test_queued_messages_come_out_in_order() {
    let sup = supervisor(cfg());
    for m in ["1", "2", "3"] {
        sup.send("alice", m.to_string(), AckMode::Async).await.unwrap();
    }

    let session = sup.find("alice").await.unwrap();
    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionState::Buffered);
    assert_eq!(status.queued, 3);

    for want in ["1", "2", "3"] {
        let got = session.poll(Duration::from_secs(1)).await.unwrap();
        assert_eq!(got.as_deref(), Some(want));
    }
    assert_eq!(session.status().await.unwrap().state, SessionState::Idle);
}

#[tokio::test]
async fn test_waiting_subscriber_gets_next_message() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let mut inbox = Inbox::new();
    let token = session.subscribe(&inbox.consumer()).await.unwrap();
    assert_eq!(session.status().await.unwrap().state, SessionState::Subscribed);

    session.send("hi".to_string(), AckMode::Async).await.unwrap();
    let delivery = inbox.recv().await.unwrap();
    assert_eq!(delivery.token, token);
    assert_eq!(delivery.message, "hi");

    // One message per subscription: the next send is buffered.
    session.send("again".to_string(), AckMode::Async).await.unwrap();
    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionState::Buffered);
    assert_eq!(status.queued, 1);
}

#[tokio::test]
async fn test_second_subscriber_is_rejected() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let mut first = Inbox::new();
    let second = Inbox::<String>::new();
    session.subscribe(&first.consumer()).await.unwrap();

    let err = session.subscribe(&second.consumer()).await.unwrap_err();
    assert!(matches!(err, SubscribeError::AlreadySubscribed { .. }));
    assert_eq!(err.as_label(), "subscribe_already_subscribed");

    session.send("for first".to_string(), AckMode::Async).await.unwrap();
    assert_eq!(first.recv().await.unwrap().message, "for first");
}

#[tokio::test]
async fn test_dropped_inbox_frees_the_subscriber_slot() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let stale = Inbox::<String>::new();
    session.subscribe(&stale.consumer()).await.unwrap();
    drop(stale);

    let mut fresh = Inbox::new();
    let token = session.subscribe(&fresh.consumer()).await.unwrap();
    session.send("reconnected".to_string(), AckMode::Async).await.unwrap();

    let delivery = fresh.recv().await.unwrap();
    assert_eq!(delivery.token, token);
    assert_eq!(delivery.message, "reconnected");
}

#[tokio::test]
async fn test_session_notices_a_vanished_subscriber_on_its_own() {
    let sup = supervisor(cfg());
    let mut events = sup.events();
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let stale = Inbox::<String>::new();
    let stale_token = session.subscribe(&stale.consumer()).await.unwrap();
    drop(stale);

    // No new subscribe arrives: the session must see the closed inbox by itself.
    loop {
        let ev = events.recv().await.unwrap();
        if ev.kind == EventKind::SubscriberLost {
            assert_eq!(ev.token, Some(stale_token));
            break;
        }
    }
    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionState::Idle);
    assert_eq!(status.queued, 0);
    assert!(!session.is_closed());

    let mut fresh = Inbox::new();
    let token = session.subscribe(&fresh.consumer()).await.unwrap();
    session.send("next".to_string(), AckMode::Async).await.unwrap();
    let delivery = fresh.recv().await.unwrap();
    assert_eq!(delivery.token, token);
    assert_eq!(delivery.message, "next");
}

#[tokio::test]
async fn test_subscribe_with_closed_inbox_leaves_message_queued() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();
    session.send("waiting".to_string(), AckMode::Async).await.unwrap();

    let mut gone = Inbox::<String>::new();
    gone.close();
    let err = session.subscribe(&gone.consumer()).await.unwrap_err();
    assert!(matches!(err, SubscribeError::ConsumerGone { .. }));
    assert_eq!(err.as_label(), "subscribe_consumer_gone");

    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionState::Buffered);
    assert_eq!(status.queued, 1);
    assert_eq!(
        session.poll(Duration::from_secs(1)).await.unwrap().as_deref(),
        Some("waiting")
    );
}

#[tokio::test]
async fn test_delivery_to_closed_inbox_keeps_message() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let mut inbox = Inbox::<String>::new();
    session.subscribe(&inbox.consumer()).await.unwrap();
    inbox.close();
    session.send("kept".to_string(), AckMode::Async).await.unwrap();

    let status = session.status().await.unwrap();
    assert_eq!(status.state, SessionState::Buffered);
    assert_eq!(status.queued, 1);
    assert_eq!(
        session.poll(Duration::from_secs(1)).await.unwrap().as_deref(),
        Some("kept")
    );
}

#[tokio::test(start_paused = true)]
async fn test_deadline_ack_times_out_and_message_stays_queued() {
    let sup = supervisor(cfg());
    let deadline = Instant::now() + Duration::from_millis(10);

    let err = sup
        .send("alice", "late".to_string(), AckMode::WaitUntil(deadline))
        .await
        .unwrap_err();
    assert_eq!(err, SendError::Timeout);

    let session = sup.find("alice").await.unwrap();
    assert_eq!(session.status().await.unwrap().queued, 1);
    assert_eq!(
        session.poll(Duration::from_secs(1)).await.unwrap().as_deref(),
        Some("late")
    );
}

#[tokio::test]
async fn test_wait_forever_resolves_on_delivery() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let producer = {
        let session = session.clone();
        tokio::spawn(async move { session.send("sync".to_string(), AckMode::WaitForever).await })
    };

    let got = session.poll(Duration::from_secs(5)).await.unwrap();
    assert_eq!(got.as_deref(), Some("sync"));
    producer.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_deadline_ack_resolves_when_subscriber_waits() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let mut inbox = Inbox::new();
    session.subscribe(&inbox.consumer()).await.unwrap();
    session
        .send("in time".to_string(), AckMode::deadline(Duration::from_secs(5)))
        .await
        .unwrap();
    assert_eq!(inbox.recv().await.unwrap().message, "in time");
}

#[tokio::test(start_paused = true)]
async fn test_poll_times_out_empty() {
    let sup = supervisor(cfg());
    let session = sup.create("alice", Probe::default()).await.unwrap();

    let got = session.poll(Duration::from_millis(20)).await.unwrap();
    assert_eq!(got, None);

    // The abandoned poll does not block the next one.
    session.send("next".to_string(), AckMode::Async).await.unwrap();
    assert_eq!(
        session.poll(Duration::from_millis(20)).await.unwrap().as_deref(),
        Some("next")
    );
}

#[tokio::test]
async fn test_waiting_producer_sees_close_on_terminate() {
    let sup = supervisor(cfg());
    let (probe, mut stopped) = Probe::new();
    let session = sup.create("alice", probe).await.unwrap();

    let producer = {
        let session = session.clone();
        tokio::spawn(async move { session.send("never".to_string(), AckMode::WaitForever).await })
    };
    // Let the producer enqueue.
    while session.status().await.unwrap().queued == 0 {
        tokio::task::yield_now().await;
    }

    assert!(sup.terminate("alice").await);
    let err = producer.await.unwrap().unwrap_err();
    assert!(matches!(err, SendError::SessionClosed { .. }));

    let (_, reason, undelivered) = stopped.recv().await.unwrap();
    assert_eq!(reason, StopReason::Shutdown);
    assert_eq!(undelivered, vec!["never".to_string()]);
}
