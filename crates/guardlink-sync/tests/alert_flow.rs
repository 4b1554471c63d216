//! End-to-end alert scenarios: tracker → relay → observer message flows
//! exercised over the session transport with a scripted link.

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use url::Url;

use guardlink_core::{Coordinate, GeocodeError, ReverseGeocoder, SessionRole};
use guardlink_sync::config::SyncConfig;
use guardlink_sync::observer::Observer;
use guardlink_sync::transport::{SessionTransport, TransportConfig};
use guardlink_sync::wire::WireFrame;

use support::{wait_until, ConnectOutcome, LinkHandle, RecordingNotifier, ScriptedConnector, TestLink};

struct StaticGeocoder(&'static str);

#[async_trait]
impl ReverseGeocoder for StaticGeocoder {
    async fn reverse_geocode(&self, _coordinate: Coordinate) -> Result<String, GeocodeError> {
        Ok(self.0.to_string())
    }
}

struct Session {
    observer: Observer,
    notifier: Arc<RecordingNotifier>,
    handle: LinkHandle,
    transport: Arc<SessionTransport>,
}

/// Wires an observer to a single scripted link and starts its event loop.
fn start_observer() -> Session {
    let (link, handle) = TestLink::pair();
    let connector = ScriptedConnector::new(vec![ConnectOutcome::Link(link)]);

    let config = SyncConfig::builder()
        .relay_url(Url::parse("wss://relay.test").unwrap())
        .build()
        .unwrap();
    let endpoint = config.session_endpoint("observer-1").unwrap();

    let (transport, events) = SessionTransport::connect(
        SessionRole::Observer,
        endpoint,
        connector,
        TransportConfig::default(),
    );
    let transport = Arc::new(transport);

    let notifier = Arc::new(RecordingNotifier::default());
    let observer = Observer::new(
        Arc::clone(&transport),
        Arc::new(StaticGeocoder("Taichung")),
        notifier.clone(),
        config,
    );

    let event_loop = observer.clone();
    tokio::spawn(async move { event_loop.run_events(events).await });

    Session {
        observer,
        notifier,
        handle,
        transport,
    }
}

fn push(session: &Session, json: &str) {
    session
        .handle
        .inbound_tx
        .send(Ok(WireFrame::Text(json.to_string())))
        .unwrap();
}

const SOS_ALERT: &str =
    r#"{"type":"sos_alert","lat":24.15,"lng":120.67,"timestamp":1000,"address":"Taichung"}"#;

#[tokio::test]
async fn sos_alert_activates_and_notifies_exactly_once() {
    let session = start_observer();

    push(&session, SOS_ALERT);
    assert!(wait_until(|| session.observer.active_alert().is_some()).await);

    let alert = session.observer.active_alert().unwrap();
    assert!((alert.raised_at().as_epoch_seconds() - 1000.0).abs() < f64::EPSILON);
    assert_eq!(alert.address(), Some("Taichung"));
    assert_eq!(session.notifier.count(), 1);
    assert!(session.notifier.bodies()[0].contains("Taichung"));

    // A duplicate delivery of the same message must not re-fire.
    push(&session, SOS_ALERT);
    push(&session, r#"{"type":"location_update","lat":24.16,"lng":120.68}"#);
    assert!(wait_until(|| session.observer.target_position().is_some()).await);
    assert_eq!(session.notifier.count(), 1);

    session.transport.disconnect().await;
}

#[tokio::test]
async fn clear_flow_converges_and_replay_does_not_reopen() {
    let mut session = start_observer();

    push(&session, SOS_ALERT);
    assert!(wait_until(|| session.observer.active_alert().is_some()).await);

    // User clears: local state drops immediately and clear_sos goes out.
    session.observer.clear_alert();
    assert!(session.observer.active_alert().is_none());

    let outbound = session.handle.outbound_rx.recv().await.unwrap();
    assert_eq!(
        outbound,
        WireFrame::Text(r#"{"type":"clear_sos"}"#.to_string())
    );

    // The relay fans the clear back out.
    push(&session, r#"{"type":"sos_cleared"}"#);

    // A late duplicate of the original alert must not reopen it.
    push(&session, SOS_ALERT);
    push(&session, r#"{"type":"location_update","lat":24.20,"lng":120.70}"#);
    assert!(wait_until(|| {
        session
            .observer
            .target_position()
            .is_some_and(|c| (c.latitude - 24.20).abs() < f64::EPSILON)
    })
    .await);

    assert!(session.observer.active_alert().is_none());
    assert_eq!(session.notifier.count(), 1);

    // Only a strictly newer alert re-opens.
    push(
        &session,
        r#"{"type":"sos_alert","lat":24.15,"lng":120.67,"timestamp":1001}"#,
    );
    assert!(wait_until(|| session.observer.active_alert().is_some()).await);
    assert_eq!(session.notifier.count(), 2);

    session.transport.disconnect().await;
}

#[tokio::test]
async fn alert_without_address_resolves_through_the_geocoder() {
    let session = start_observer();

    push(
        &session,
        r#"{"type":"sos_alert","lat":24.15,"lng":120.67,"timestamp":1000}"#,
    );
    assert!(wait_until(|| session.observer.active_alert().is_some()).await);
    assert!(wait_until(|| {
        session
            .observer
            .active_alert()
            .is_some_and(|a| a.address() == Some("Taichung"))
    })
    .await);

    session.transport.disconnect().await;
}

#[tokio::test]
async fn bad_messages_do_not_terminate_the_session() {
    let session = start_observer();

    // Unknown type: ignored. Malformed recognized type: dropped with an
    // error event. Either way the loop continues.
    push(&session, r#"{"type":"battery_report","level":17}"#);
    push(&session, r#"{"type":"sos_alert","lat":24.15}"#);
    push(&session, "not json at all");
    push(&session, SOS_ALERT);

    assert!(wait_until(|| session.observer.active_alert().is_some()).await);
    assert_eq!(session.notifier.count(), 1);
    assert!(session.transport.state().is_connected());

    session.transport.disconnect().await;
}

#[tokio::test]
async fn binary_frames_decode_like_text_frames() {
    let session = start_observer();

    session
        .handle
        .inbound_tx
        .send(Ok(WireFrame::Binary(SOS_ALERT.as_bytes().to_vec())))
        .unwrap();

    assert!(wait_until(|| session.observer.active_alert().is_some()).await);
    session.transport.disconnect().await;
}
