//! Observer role client: the family side of the protocol.
//!
//! The observer consumes location and SOS broadcasts, deduplicates alerts
//! by their monotonic timestamp, resolves an address for alerts that arrive
//! without one, triggers the local notification, and issues alert-clear
//! requests. Position consumption is most-recent-value: every broadcast
//! overwrites the current target position, no ordering buffer.
//!
//! The observer also supports the HTTP polling fallback for deployments
//! with no relay session available; both paths feed the same alert monitor
//! and position slot, so dedup semantics are identical.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use guardlink_core::{AlertEvent, AlertStamp, Coordinate, Notifier, ReverseGeocoder};

use crate::alert::{AlertMonitor, RaiseOutcome};
use crate::config::SyncConfig;
use crate::fallback::FallbackClient;
use crate::geocode::ThrottledGeocoder;
use crate::transport::{SessionTransport, TransportEvent};
use crate::wire::{ClientMessage, RelayMessage};

/// Status strings surfaced to the presentation layer.
mod status {
    pub const ALERT_ACTIVE: &str = "SOS alert active";
    pub const ALERT_CLEARED: &str = "SOS alert cleared";
    pub const CLEAR_FAILED: &str = "SOS clear failed";
    pub const POLL_FAILED: &str = "poll failed";
}

/// The family-side role client.
pub struct Observer {
    inner: Arc<ObserverInner>,
}

struct ObserverInner {
    transport: Option<Arc<SessionTransport>>,
    geocoder: ThrottledGeocoder,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
    target: RwLock<Option<Coordinate>>,
    alert: RwLock<AlertMonitor>,
    last_status: RwLock<Option<String>>,
    polling: AtomicBool,
}

impl Clone for Observer {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Observer {
    /// Creates an observer over an established session transport.
    pub fn new(
        transport: Arc<SessionTransport>,
        geocoder: Arc<dyn ReverseGeocoder>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self::build(Some(transport), geocoder, notifier, config)
    }

    /// Creates an observer with no relay session, for polling-only use
    /// through [`Observer::run_polling`].
    pub fn polling_only(
        geocoder: Arc<dyn ReverseGeocoder>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self::build(None, geocoder, notifier, config)
    }

    fn build(
        transport: Option<Arc<SessionTransport>>,
        geocoder: Arc<dyn ReverseGeocoder>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        let geocoder = ThrottledGeocoder::new(geocoder, config.geocode);
        Self {
            inner: Arc::new(ObserverInner {
                transport,
                geocoder,
                notifier,
                config,
                target: RwLock::new(None),
                alert: RwLock::new(AlertMonitor::new()),
                last_status: RwLock::new(None),
                polling: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the tracked user's most recently reported position.
    #[must_use]
    pub fn target_position(&self) -> Option<Coordinate> {
        *self.inner.target.read()
    }

    /// Returns the outstanding alert, if any.
    #[must_use]
    pub fn active_alert(&self) -> Option<AlertEvent> {
        self.inner.alert.read().active_event().cloned()
    }

    /// Returns the most recent status string, if any operation ran yet.
    #[must_use]
    pub fn last_status(&self) -> Option<String> {
        self.inner.last_status.read().clone()
    }

    /// Consumes the session event stream until it ends.
    pub async fn run_events(&self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Observer event stream ended");
    }

    /// Handles one transport event.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.handle_message(message).await,
            TransportEvent::Connected => {
                tracing::info!("Observer session connected");
            }
            TransportEvent::Disconnected { reason } => {
                tracing::warn!(%reason, "Observer session disconnected");
            }
            TransportEvent::DecodeFailed(error) => {
                tracing::warn!(%error, "Dropping malformed relay message");
            }
            TransportEvent::SendFailed { reason } => {
                self.set_status(format!("{}: {reason}", status::CLEAR_FAILED));
            }
        }
    }

    /// Handles one relay message.
    pub async fn handle_message(&self, message: RelayMessage) {
        match message {
            RelayMessage::Location { lat, lng, .. }
            | RelayMessage::LocationUpdate { lat, lng } => {
                match Coordinate::new(lat, lng) {
                    Ok(coordinate) => {
                        // Last message wins; position is inherently
                        // most-recent-value.
                        *self.inner.target.write() = Some(coordinate);
                    }
                    Err(error) => {
                        tracing::warn!(lat, lng, %error, "Dropping invalid position broadcast");
                    }
                }
            }
            RelayMessage::SosAlert {
                lat,
                lng,
                timestamp,
                address,
            } => {
                let Ok(coordinate) = Coordinate::new(lat, lng) else {
                    tracing::warn!(lat, lng, "Dropping sos_alert with invalid coordinate");
                    return;
                };
                self.ingest_alert(coordinate, AlertStamp::from_epoch_seconds(timestamp), address)
                    .await;
            }
            RelayMessage::SosCleared => {
                if self.inner.alert.write().clear() {
                    self.set_status(status::ALERT_CLEARED);
                }
            }
            RelayMessage::NavigationInstruction { .. } => {
                // Tracker-bound; an observer has no use for it.
            }
        }
    }

    /// Feeds one alert through the monitor; on a genuine raise, resolves an
    /// address if none was supplied and fires the local notification.
    async fn ingest_alert(
        &self,
        coordinate: Coordinate,
        stamp: AlertStamp,
        address: Option<String>,
    ) {
        let event = AlertEvent::new(coordinate, address.clone(), stamp);
        let outcome = self.inner.alert.write().raise(event);
        if outcome == RaiseOutcome::Stale {
            return;
        }

        // The alert position also moves the map target.
        *self.inner.target.write() = Some(coordinate);

        let display_address = match address {
            Some(address) => address,
            None => {
                // The lock is not held across this suspension point; if the
                // alert is cleared or superseded meanwhile, the late address
                // is dropped by the stamp guard below.
                let resolved = self.inner.geocoder.resolve(coordinate).await;
                let text = resolved.display_text().to_string();
                self.inner
                    .alert
                    .write()
                    .set_address_if_current(stamp, text.clone());
                text
            }
        };

        self.set_status(status::ALERT_ACTIVE);
        self.inner.notifier.notify(
            "SOS alert",
            &format!("Someone raised SOS at {display_address}!"),
        );
    }

    /// Clears the outstanding alert locally and asks the relay to broadcast
    /// the clear so sibling observers converge too.
    ///
    /// Optimistic: the local state drops to idle immediately and the relay
    /// acknowledgement is not awaited.
    pub fn clear_alert(&self) {
        self.inner.alert.write().clear();
        self.set_status(status::ALERT_CLEARED);

        if let Some(transport) = &self.inner.transport {
            if let Err(error) = transport.send(ClientMessage::ClearSos) {
                tracing::warn!(%error, "Failed to send clear_sos");
                self.set_status(format!("{}: {error}", status::CLEAR_FAILED));
            }
        }
    }

    /// Clears the outstanding alert locally and through the HTTP fallback.
    ///
    /// The polling-mode counterpart of [`Observer::clear_alert`]: the local
    /// state drops immediately, then the relay is told so sibling observers
    /// converge too.
    pub async fn clear_alert_fallback(&self, client: &FallbackClient) {
        self.inner.alert.write().clear();
        self.set_status(status::ALERT_CLEARED);

        if let Err(error) = client.clear_sos().await {
            tracing::warn!(%error, "Failed to post sos clear");
            self.set_status(format!("{}: {error}", status::CLEAR_FAILED));
        }
    }

    /// Runs the HTTP polling fallback until [`Observer::stop_polling`].
    ///
    /// Polls the latest position and the latest SOS state on their own
    /// intervals, feeding the same monitor and position slot as the push
    /// path.
    pub async fn run_polling(&self, client: &FallbackClient) {
        self.inner.polling.store(true, Ordering::SeqCst);

        let mut location_tick = tokio::time::interval(self.inner.config.location_poll_interval);
        let mut sos_tick = tokio::time::interval(self.inner.config.sos_poll_interval);

        while self.inner.polling.load(Ordering::SeqCst) {
            tokio::select! {
                _ = location_tick.tick() => self.poll_location(client).await,
                _ = sos_tick.tick() => self.poll_sos(client).await,
            }
        }
    }

    /// Stops the polling loop after the current cycle.
    pub fn stop_polling(&self) {
        self.inner.polling.store(false, Ordering::SeqCst);
    }

    async fn poll_location(&self, client: &FallbackClient) {
        match client.latest_location().await {
            Ok(Some(coordinate)) => {
                *self.inner.target.write() = Some(coordinate);
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(%error, "Location poll failed");
                self.set_status(format!("{}: {error}", status::POLL_FAILED));
            }
        }
    }

    async fn poll_sos(&self, client: &FallbackClient) {
        match client.latest_sos().await {
            Ok(Some((coordinate, stamp))) => {
                self.ingest_alert(coordinate, stamp, None).await;
            }
            Ok(None) => {
                // The relay reports no outstanding alert; converge. The
                // monitor retains the highest stamp, so a replay cannot
                // resurrect the alert afterwards.
                if self.inner.alert.write().clear() {
                    self.set_status(status::ALERT_CLEARED);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "SOS poll failed");
                self.set_status(format!("{}: {error}", status::POLL_FAILED));
            }
        }
    }

    fn set_status(&self, text: impl Into<String>) {
        *self.inner.last_status.write() = Some(text.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use guardlink_core::GeocodeError;
    use parking_lot::Mutex;
    use url::Url;

    struct RecordingNotifier(Mutex<Vec<String>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, _title: &str, body: &str) {
            self.0.lock().push(body.to_string());
        }
    }

    struct StaticGeocoder(&'static str);

    #[async_trait]
    impl ReverseGeocoder for StaticGeocoder {
        async fn reverse_geocode(&self, _coordinate: Coordinate) -> Result<String, GeocodeError> {
            Ok(self.0.to_string())
        }
    }

    fn observer() -> (Observer, Arc<RecordingNotifier>) {
        let notifier = Arc::new(RecordingNotifier(Mutex::new(Vec::new())));
        let config = SyncConfig::builder()
            .relay_url(Url::parse("wss://relay.test").unwrap())
            .build()
            .unwrap();
        let observer = Observer::polling_only(
            Arc::new(StaticGeocoder("Taichung")),
            notifier.clone(),
            config,
        );
        (observer, notifier)
    }

    fn sos_alert(timestamp: f64, address: Option<&str>) -> RelayMessage {
        RelayMessage::SosAlert {
            lat: 24.15,
            lng: 120.67,
            timestamp,
            address: address.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn test_location_update_overwrites_target() {
        let (observer, _) = observer();

        observer
            .handle_message(RelayMessage::LocationUpdate {
                lat: 24.15,
                lng: 120.67,
            })
            .await;
        observer
            .handle_message(RelayMessage::Location {
                lat: 25.05,
                lng: 121.53,
                heading: 10.0,
                timestamp: 1000.0,
            })
            .await;

        let target = observer.target_position().unwrap();
        assert!((target.latitude - 25.05).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_invalid_position_broadcast_is_dropped() {
        let (observer, _) = observer();

        observer
            .handle_message(RelayMessage::LocationUpdate {
                lat: 95.0,
                lng: 120.67,
            })
            .await;
        assert!(observer.target_position().is_none());
    }

    #[tokio::test]
    async fn test_sos_alert_notifies_once() {
        let (observer, notifier) = observer();

        observer
            .handle_message(sos_alert(1000.0, Some("Taichung")))
            .await;
        assert!(observer.active_alert().is_some());
        assert_eq!(notifier.0.lock().len(), 1);
        assert!(notifier.0.lock()[0].contains("Taichung"));

        // Duplicate delivery of the same alert must not re-fire.
        observer
            .handle_message(sos_alert(1000.0, Some("Taichung")))
            .await;
        assert_eq!(notifier.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sos_alert_without_address_resolves_one() {
        let (observer, notifier) = observer();

        observer.handle_message(sos_alert(1000.0, None)).await;

        let alert = observer.active_alert().unwrap();
        assert_eq!(alert.address(), Some("Taichung"));
        assert!(notifier.0.lock()[0].contains("Taichung"));
    }

    #[tokio::test]
    async fn test_newer_alert_refires() {
        let (observer, notifier) = observer();

        observer.handle_message(sos_alert(1000.0, None)).await;
        observer.handle_message(sos_alert(1001.0, None)).await;

        assert_eq!(notifier.0.lock().len(), 2);
        let alert = observer.active_alert().unwrap();
        assert_eq!(
            alert.raised_at(),
            AlertStamp::from_epoch_seconds(1001.0)
        );
    }

    #[tokio::test]
    async fn test_clear_then_replay_does_not_reopen() {
        let (observer, notifier) = observer();

        observer.handle_message(sos_alert(1000.0, None)).await;
        observer.clear_alert();
        assert!(observer.active_alert().is_none());

        // Late duplicate of the cleared alert.
        observer.handle_message(sos_alert(1000.0, None)).await;
        assert!(observer.active_alert().is_none());
        assert_eq!(notifier.0.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_sos_cleared_from_relay_converges() {
        let (observer, _) = observer();

        observer.handle_message(sos_alert(1000.0, None)).await;
        observer.handle_message(RelayMessage::SosCleared).await;
        assert!(observer.active_alert().is_none());
        assert_eq!(
            observer.last_status().as_deref(),
            Some(status::ALERT_CLEARED)
        );
    }

    #[tokio::test]
    async fn test_alert_moves_target_position() {
        let (observer, _) = observer();

        observer.handle_message(sos_alert(1000.0, None)).await;
        let target = observer.target_position().unwrap();
        assert!((target.latitude - 24.15).abs() < f64::EPSILON);
    }

    /// Serves one 404 on a fresh local port, standing in for a relay with
    /// no outstanding alert.
    async fn serve_one_404() -> Url {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut stream, _)) = listener.accept().await {
                let mut request = [0u8; 1024];
                let _ = stream.read(&mut request).await;
                let _ = stream
                    .write_all(
                        b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n",
                    )
                    .await;
            }
        });
        Url::parse(&format!("http://{addr}")).unwrap()
    }

    #[tokio::test]
    async fn test_sos_poll_404_converges_to_idle() {
        let (observer, notifier) = observer();
        observer.handle_message(sos_alert(1000.0, None)).await;
        assert!(observer.active_alert().is_some());

        let client = FallbackClient::new(serve_one_404().await).unwrap();
        observer.poll_sos(&client).await;

        assert!(observer.active_alert().is_none());
        // Convergence is silent; only the original raise notified.
        assert_eq!(notifier.0.lock().len(), 1);

        // A replay after convergence must not resurrect the alert.
        observer.handle_message(sos_alert(1000.0, None)).await;
        assert!(observer.active_alert().is_none());
    }
}
