//! Retry flow tests for mpn-channel
//!
//! These tests drive the public API the way a session engine would: a
//! recording transport keeps every request/tutor pair, and the test plays
//! the scheduler by polling tutors and calling `recover()` on timeout.

use mpn_channel::request::keys::{
    LS_GROUP, LS_OP, LS_SUB_ID, PN_COALESCING, PN_DEVICE_TOKEN, PN_NEW_DEVICE_TOKEN,
    PN_SUBSCRIPTION_ID, PN_SUBSCRIPTION_STATUS,
};
use mpn_channel::{
    ChannelTransport, ControlTransport, Device, PollOutcome, Platform, Request, RequestKind,
    RequestManager, RetryScheduler, StatusFilter, Subscription, SubscriptionMode, Tutor,
    TutorState, TutorTarget,
};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Transport that records every pair handed to it.
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<(Request, Tutor)>>,
}

impl RecordingTransport {
    fn record(&self, request: Request, tutor: Tutor) {
        self.sent.lock().unwrap().push((request, tutor));
    }

    fn sent(&self) -> Vec<(Request, Tutor)> {
        self.sent.lock().unwrap().clone()
    }

    fn last(&self) -> (Request, Tutor) {
        self.sent().last().cloned().expect("at least one pair sent")
    }
}

impl ControlTransport for RecordingTransport {
    fn send_register(&self, request: Request, tutor: Tutor) {
        self.record(request, tutor);
    }
    fn send_subscribe(&self, request: Request, tutor: Tutor) {
        self.record(request, tutor);
    }
    fn send_unsubscribe(&self, request: Request, tutor: Tutor) {
        self.record(request, tutor);
    }
    fn send_unsubscribe_by_filter(&self, request: Request, tutor: Tutor) {
        self.record(request, tutor);
    }
}

fn setup() -> (RequestManager, Arc<RecordingTransport>) {
    let transport = Arc::new(RecordingTransport::default());
    let manager = RequestManager::builder(Arc::clone(&transport) as Arc<dyn ControlTransport>)
        .device(Device::new(Platform::Apple, "com.example.app", "token-a").with_device_id("dev-42"))
        .build();
    (manager, transport)
}

/// Scheduler stand-in: poll the latest tutor once, recovering if needed.
fn poll_latest(transport: &RecordingTransport) -> bool {
    let (_, tutor) = transport.last();
    if tutor.should_stop() {
        return false;
    }
    tutor.recover().unwrap().is_some()
}

#[test]
fn test_subscribe_recovers_three_times_with_stable_identity() {
    let (manager, transport) = setup();
    let sub = Subscription::new(SubscriptionMode::Merge, "item1", "last_price").coalescing(true);

    let first_id = manager.send_subscribe(3000, "eph-1", &sub).unwrap();
    let (first, _) = transport.last();
    assert_eq!(first.params().get(LS_OP), Some("activate"));
    assert_eq!(first.params().get(PN_COALESCING), Some("true"));
    assert!(!first.params().contains_key(PN_SUBSCRIPTION_ID));

    for _ in 0..3 {
        assert!(poll_latest(&transport), "no response: tutor must retry");
    }

    let sent = transport.sent();
    assert_eq!(sent.len(), 4, "original plus three recoveries");

    let ids: Vec<u64> = sent.iter().map(|(r, _)| r.id()).collect();
    assert_eq!(ids[0], first_id);
    assert!(ids.windows(2).all(|w| w[0] < w[1]), "ids strictly increase: {:?}", ids);

    for (request, tutor) in &sent {
        assert_eq!(request.params().get(LS_SUB_ID), Some("eph-1"));
        assert_eq!(request.params().get(LS_GROUP), Some("item1"));
        assert_eq!(request.params(), first.params(), "same logical operation");
        assert_eq!(tutor.timeout_ms(), 3000);
        match tutor.target() {
            TutorTarget::Subscribe {
                ephemeral_id,
                subscription,
            } => {
                assert_eq!(ephemeral_id, "eph-1");
                assert_eq!(subscription, &sub);
            }
            other => panic!("unexpected target {:?}", other),
        }
    }
}

#[test]
fn test_response_ends_retries() {
    let (manager, transport) = setup();
    manager.send_register(1000).unwrap();
    assert!(poll_latest(&transport));

    let (_, tutor) = transport.last();
    tutor.on_response();
    assert!(!poll_latest(&transport), "answered tutor stops");
    assert_eq!(transport.sent().len(), 2);
}

#[test]
fn test_terminal_notifications_are_idempotent() {
    let (manager, transport) = setup();
    manager
        .send_unsubscribe_by_filter(1000, StatusFilter::Active)
        .unwrap();
    let (_, tutor) = transport.last();

    tutor.on_response();
    tutor.on_response();
    tutor.notify_abort();
    assert!(tutor.should_stop());
    assert_eq!(tutor.state(), TutorState::Completed);

    assert_eq!(tutor.recover(), Ok(None));
    assert_eq!(transport.sent().len(), 1, "stopped tutor never re-sends");
}

#[test]
fn test_abort_stops_retries() {
    let (manager, transport) = setup();
    manager.send_register(1000).unwrap();
    let (_, tutor) = transport.last();

    tutor.notify_abort();
    assert!(!poll_latest(&transport));
    assert_eq!(tutor.state(), TutorState::Aborted);
}

#[test]
fn test_late_response_to_abandoned_attempt_settles_only_it() {
    let (manager, transport) = setup();
    manager.send_register(1000).unwrap();
    assert!(poll_latest(&transport));

    let sent = transport.sent();
    let (_, abandoned) = &sent[0];
    let (_, current) = &sent[1];
    abandoned.on_response();

    assert_eq!(abandoned.state(), TutorState::Completed);
    assert_eq!(current.state(), TutorState::Pending);
}

#[test]
fn test_register_renewal_survives_recovery() {
    let (manager, transport) = setup();
    manager.refresh_token("token-b").unwrap();
    manager.send_register(1000).unwrap();
    assert!(poll_latest(&transport));

    for (request, _) in transport.sent() {
        assert_eq!(request.kind(), RequestKind::MpnRegister);
        assert_eq!(request.params().get(PN_DEVICE_TOKEN), Some("token-a"));
        assert_eq!(request.params().get(PN_NEW_DEVICE_TOKEN), Some("token-b"));
    }
}

#[test]
fn test_filter_wire_status() {
    let (manager, transport) = setup();
    manager.send_unsubscribe_by_filter(1000, StatusFilter::All).unwrap();
    manager
        .send_unsubscribe_by_filter(1000, StatusFilter::Triggered)
        .unwrap();

    let sent = transport.sent();
    assert!(!sent[0].0.params().contains_key(PN_SUBSCRIPTION_STATUS));
    assert_eq!(sent[1].0.params().get(PN_SUBSCRIPTION_STATUS), Some("TRIGGERED"));
}

#[test]
fn test_wire_body_starts_with_request_id() {
    let (manager, transport) = setup();
    let id = manager.send_register(1000).unwrap();
    let (request, _) = transport.last();

    let wire = request.to_wire();
    assert!(wire.starts_with(&format!("LS_reqId={id}&LS_op=register&")), "{wire}");
    assert!(!request.to_string().contains("LS_reqId"));
}

#[test]
fn test_rebuild_failure_surfaces_operation() {
    let (transport, mut rx) = ChannelTransport::new();
    let manager = RequestManager::builder(Arc::new(transport) as Arc<dyn ControlTransport>)
        .device(Device::new(Platform::Google, "app", "tok").with_device_id("dev-1"))
        .build();
    let mut scheduler = RetryScheduler::new();
    let now = Instant::now();

    let sub = Subscription::new(SubscriptionMode::Merge, "item1", "last_price");
    let id = manager.send_subscribe(100, "eph-3", &sub).unwrap();
    scheduler.absorb(&mut rx, now);
    let tutor = scheduler.get(id).unwrap().clone();

    // Token change: the device must register again before subscribing
    manager.set_device(Device::new(Platform::Google, "app", "tok2"));
    let outcomes = scheduler.poll_due(now + Duration::from_millis(100));

    match &outcomes[..] {
        [(polled, PollOutcome::RecoveryFailed(TutorTarget::Subscribe { ephemeral_id, .. }))] => {
            assert_eq!(*polled, id);
            assert_eq!(ephemeral_id, "eph-3");
        }
        other => panic!("unexpected outcomes {:?}", other),
    }
    assert_eq!(tutor.state(), TutorState::Aborted);
    assert!(scheduler.is_empty());
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_channel_transport_with_scheduler() {
    let (transport, mut rx) = ChannelTransport::new();
    let manager = RequestManager::builder(Arc::new(transport) as Arc<dyn ControlTransport>)
        .device(Device::new(Platform::Google, "app", "tok").with_device_id("dev-1"))
        .build();
    let mut scheduler = RetryScheduler::new();
    let start = Instant::now();

    let sub = Subscription::new(SubscriptionMode::Distinct, "news", "headline");
    manager.send_subscribe(200, "eph-9", &sub).unwrap();

    // Two silent timeouts, then an answer
    let mut now = start;
    let mut dispatched = scheduler.absorb(&mut rx, now);
    for _ in 0..2 {
        now += Duration::from_millis(200);
        let outcomes = scheduler.poll_due(now);
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].1, PollOutcome::Recovered);
        dispatched.extend(scheduler.absorb(&mut rx, now));
    }
    assert_eq!(dispatched.len(), 3);

    let last = dispatched.last().unwrap();
    scheduler.get(last.id()).unwrap().on_response();
    now += Duration::from_millis(200);
    assert_eq!(scheduler.poll_due(now), vec![(last.id(), PollOutcome::Retired)]);
    assert!(scheduler.is_empty());
    assert!(rx.try_recv().is_err());
}
