//! Collaborator trait definitions for the GuardLink system.
//!
//! These traits are the seams between the synchronization core and the host
//! platform. The original services (device positioning, local notifications,
//! reverse geocoding) are process-wide singletons on the platform side; here
//! each becomes an explicit interface with a single shared instance
//! constructed at process start and handed to the role clients.
//!
//! # Traits
//!
//! - [`PositionSource`]: the device's positioning subsystem
//! - [`Notifier`]: the host platform's local-notification facility
//! - [`ReverseGeocoder`]: the raw (unthrottled) coordinate-to-address lookup

use async_trait::async_trait;

use crate::error::GeocodeError;
use crate::types::{Coordinate, LocationSample};

/// Source of device position fixes.
///
/// Implementations wrap the platform positioning subsystem. The core only
/// ever reads the most recent sample; history is not its concern.
pub trait PositionSource: Send + Sync {
    /// Returns the most recent position fix, or `None` if the subsystem has
    /// not produced one yet.
    fn latest_sample(&self) -> Option<LocationSample>;
}

/// Sink for user-facing local notifications.
///
/// The core decides *when* a notification fires and *what* it says; how it
/// is rendered belongs to the host platform.
pub trait Notifier: Send + Sync {
    /// Delivers a local notification with the given title and body.
    fn notify(&self, title: &str, body: &str);
}

/// Raw reverse-geocoding lookup.
///
/// Implementations talk to an external geocoding service. Throttling and
/// caching live above this trait; implementations should perform exactly
/// one lookup per call.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync {
    /// Resolves a coordinate to a human-readable address.
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<String, GeocodeError>;
}

/// A [`Notifier`] that logs notifications instead of delivering them.
///
/// Useful for headless deployments and as the default in tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, title: &str, body: &str) {
        tracing::info!(title, body, "Local notification");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Heading;
    use std::sync::Mutex;

    struct FixedSource(Option<LocationSample>);

    impl PositionSource for FixedSource {
        fn latest_sample(&self) -> Option<LocationSample> {
            self.0
        }
    }

    struct RecordingNotifier(Mutex<Vec<(String, String)>>);

    impl Notifier for RecordingNotifier {
        fn notify(&self, title: &str, body: &str) {
            self.0
                .lock()
                .unwrap()
                .push((title.to_string(), body.to_string()));
        }
    }

    #[test]
    fn test_position_source_passthrough() {
        let coord = Coordinate::new(24.15, 120.67).unwrap();
        let sample = LocationSample::new(coord, Some(Heading::new(12.0).unwrap()));
        let source = FixedSource(Some(sample));
        assert_eq!(source.latest_sample(), Some(sample));

        let empty = FixedSource(None);
        assert!(empty.latest_sample().is_none());
    }

    #[test]
    fn test_notifier_receives_content() {
        let notifier = RecordingNotifier(Mutex::new(Vec::new()));
        notifier.notify("SOS alert", "Someone raised SOS at Taichung!");

        let delivered = notifier.0.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(delivered[0].0, "SOS alert");
    }
}
