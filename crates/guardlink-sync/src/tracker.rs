//! Tracker role client: the tracked user's side of the protocol.
//!
//! The tracker owns the current position/heading, pushes periodic location
//! updates, originates SOS alerts, and reacts to the relay's alert
//! acknowledgement. It runs two loops: the sampling loop (periodic upload)
//! and the event loop (relay traffic); user actions ([`Tracker::raise_sos`])
//! arrive from the interaction layer at any time.
//!
//! Every failure surfaces as a status string readable by the presentation
//! layer ("upload failed", "SOS send failed", ...) which self-clears on the
//! next successful operation; nothing here can crash the session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;

use guardlink_core::{
    AlertEvent, AlertStamp, Coordinate, Notifier, PositionSource, SyncError, SyncResult,
};

use crate::alert::{AlertMonitor, RaiseOutcome};
use crate::config::SyncConfig;
use crate::transport::{SessionTransport, TransportEvent};
use crate::wire::{ClientMessage, RelayMessage};

/// Status strings surfaced to the presentation layer.
mod status {
    pub const UPLOADED: &str = "location uploaded";
    pub const UPLOAD_FAILED: &str = "upload failed";
    pub const DATA_UNAVAILABLE: &str = "location or heading unavailable, upload skipped";
    pub const SOS_SENT: &str = "SOS sent";
    pub const SOS_FAILED: &str = "SOS send failed";
    pub const SOS_NO_FIX: &str = "no position fix, SOS not sent";
    pub const SOS_ACKNOWLEDGED: &str = "SOS alert active";
    pub const SOS_CLEARED: &str = "SOS alert cleared";
}

/// The tracked user's role client.
pub struct Tracker {
    inner: Arc<TrackerInner>,
}

struct TrackerInner {
    transport: Arc<SessionTransport>,
    position: Arc<dyn PositionSource>,
    notifier: Arc<dyn Notifier>,
    config: SyncConfig,
    alert: RwLock<AlertMonitor>,
    last_status: RwLock<Option<String>>,
    /// Sink for opaque navigation instructions, if the host wires one up.
    navigation_tx: Option<mpsc::Sender<String>>,
    sampling: AtomicBool,
}

impl Clone for Tracker {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Tracker {
    /// Creates a tracker over an established session transport.
    pub fn new(
        transport: Arc<SessionTransport>,
        position: Arc<dyn PositionSource>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
    ) -> Self {
        Self::build(transport, position, notifier, config, None)
    }

    /// Creates a tracker that forwards navigation instructions to `tx`.
    pub fn with_navigation_sink(
        transport: Arc<SessionTransport>,
        position: Arc<dyn PositionSource>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
        tx: mpsc::Sender<String>,
    ) -> Self {
        Self::build(transport, position, notifier, config, Some(tx))
    }

    fn build(
        transport: Arc<SessionTransport>,
        position: Arc<dyn PositionSource>,
        notifier: Arc<dyn Notifier>,
        config: SyncConfig,
        navigation_tx: Option<mpsc::Sender<String>>,
    ) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                transport,
                position,
                notifier,
                config,
                alert: RwLock::new(AlertMonitor::new()),
                last_status: RwLock::new(None),
                navigation_tx,
                sampling: AtomicBool::new(false),
            }),
        }
    }

    /// Returns the most recent status string, if any operation ran yet.
    #[must_use]
    pub fn last_status(&self) -> Option<String> {
        self.inner.last_status.read().clone()
    }

    /// Returns `true` if the tracker's own SOS alert is outstanding.
    #[must_use]
    pub fn alert_active(&self) -> bool {
        self.inner.alert.read().is_active()
    }

    /// Runs the periodic sampling loop until [`Tracker::stop_sampling`].
    ///
    /// Each cycle uploads the current position, or skips the cycle with a
    /// "data unavailable" status when the positioning subsystem has not
    /// produced a complete fix yet.
    pub async fn run_sampling(&self) {
        self.inner.sampling.store(true, Ordering::SeqCst);

        while self.inner.sampling.load(Ordering::SeqCst) {
            self.send_location();
            tokio::time::sleep(self.inner.config.location_interval).await;
        }
    }

    /// Stops the sampling loop after the current cycle.
    pub fn stop_sampling(&self) {
        self.inner.sampling.store(false, Ordering::SeqCst);
    }

    /// Performs one upload cycle.
    pub fn send_location(&self) {
        let sample = match self.inner.position.latest_sample() {
            Some(sample) if sample.is_complete() => sample,
            _ => {
                self.set_status(status::DATA_UNAVAILABLE);
                tracing::debug!("Skipping upload cycle: no complete position fix");
                return;
            }
        };

        let heading = sample
            .heading
            .map(|h| h.degrees())
            .unwrap_or_default();
        let message = ClientMessage::Location {
            lat: sample.coordinate.latitude,
            lng: sample.coordinate.longitude,
            heading,
            timestamp: sample.captured_at.timestamp_millis() as f64 / 1000.0,
        };

        match self.inner.transport.send(message) {
            Ok(()) => self.set_status(status::UPLOADED),
            Err(error) => {
                tracing::warn!(%error, "Location upload failed");
                self.set_status(format!("{}: {error}", status::UPLOAD_FAILED));
            }
        }
    }

    /// Raises an SOS alert at the current position.
    ///
    /// Surfaces an optimistic "SOS sent" status immediately; the relay's
    /// `sos_alert` echo finalizes it. With no position fix nothing is sent.
    ///
    /// # Errors
    ///
    /// Returns a validation error when no position fix is available and a
    /// transport error when the message cannot be enqueued.
    pub fn raise_sos(&self) -> SyncResult<()> {
        let coordinate = match self.inner.position.latest_sample() {
            Some(sample) => sample.coordinate,
            None => {
                self.set_status(status::SOS_NO_FIX);
                return Err(SyncError::validation("no position fix available"));
            }
        };

        let message = ClientMessage::Sos {
            lat: coordinate.latitude,
            lng: coordinate.longitude,
        };

        match self.inner.transport.send(message) {
            Ok(()) => {
                self.set_status(status::SOS_SENT);
                self.inner
                    .notifier
                    .notify(status::SOS_SENT, "Emergency alert delivered to your family");
                Ok(())
            }
            Err(error) => {
                tracing::warn!(%error, "SOS send failed");
                self.set_status(format!("{}: {error}", status::SOS_FAILED));
                Err(error.into())
            }
        }
    }

    /// Consumes the session event stream until it ends.
    pub async fn run_events(&self, mut events: mpsc::Receiver<TransportEvent>) {
        while let Some(event) = events.recv().await {
            self.handle_event(event).await;
        }
        tracing::debug!("Tracker event stream ended");
    }

    /// Handles one transport event.
    pub async fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Message(message) => self.handle_message(message).await,
            TransportEvent::Connected => {
                tracing::info!("Tracker session connected");
            }
            TransportEvent::Disconnected { reason } => {
                tracing::warn!(%reason, "Tracker session disconnected");
            }
            TransportEvent::DecodeFailed(error) => {
                tracing::warn!(%error, "Dropping malformed relay message");
            }
            TransportEvent::SendFailed { reason } => {
                self.set_status(format!("{}: {reason}", status::UPLOAD_FAILED));
            }
        }
    }

    async fn handle_message(&self, message: RelayMessage) {
        match message {
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
                let event = AlertEvent::new(
                    coordinate,
                    address,
                    AlertStamp::from_epoch_seconds(timestamp),
                );
                // The relay's echo of our own alert: finalize the optimistic
                // "SOS sent" status. Duplicates are absorbed by the monitor.
                if self.inner.alert.write().raise(event) == RaiseOutcome::Raised {
                    self.set_status(status::SOS_ACKNOWLEDGED);
                }
            }
            RelayMessage::SosCleared => {
                if self.inner.alert.write().clear() {
                    self.set_status(status::SOS_CLEARED);
                }
            }
            RelayMessage::NavigationInstruction { payload } => {
                if let Some(tx) = &self.inner.navigation_tx {
                    if tx.send(payload).await.is_err() {
                        tracing::debug!("Navigation sink dropped");
                    }
                } else {
                    tracing::debug!("No navigation sink configured");
                }
            }
            // Position broadcasts are observer-bound; nothing to do here.
            RelayMessage::Location { .. } | RelayMessage::LocationUpdate { .. } => {}
        }
    }

    fn set_status(&self, text: impl Into<String>) {
        *self.inner.last_status.write() = Some(text.into());
    }
}
