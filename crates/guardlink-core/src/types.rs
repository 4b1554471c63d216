//! Core data types for the GuardLink synchronization system.
//!
//! This module defines the data structures shared between the tracker and
//! observer roles: geographic coordinates, location samples, alert events,
//! and session state.
//!
//! # Type Categories
//!
//! - **Geography**: [`Coordinate`], [`Heading`]
//! - **Location**: [`LocationSample`]
//! - **Alerting**: [`AlertStamp`], [`AlertEvent`], [`AlertStatus`]
//! - **Session**: [`SessionRole`], [`ConnectionStatus`], [`SessionState`]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};

/// Mean Earth radius in meters, used for haversine distance.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

// =============================================================================
// Geography
// =============================================================================

/// A validated geographic coordinate.
///
/// Both components are guaranteed finite, with latitude in [-90, 90] and
/// longitude in [-180, 180].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in decimal degrees
    pub latitude: f64,
    /// Longitude in decimal degrees
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a new coordinate.
    ///
    /// # Errors
    ///
    /// Returns a validation error if either component is non-finite or out
    /// of range.
    pub fn new(latitude: f64, longitude: f64) -> SyncResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(SyncError::validation(format!(
                "Latitude must be finite and in [-90, 90], got {latitude}"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(SyncError::validation(format!(
                "Longitude must be finite and in [-180, 180], got {longitude}"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Returns the great-circle (haversine) distance to another coordinate,
    /// in meters.
    #[must_use]
    pub fn distance_m(&self, other: &Self) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlng = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// A compass heading in decimal degrees, normalized to [0, 360).
///
/// Absence of a heading is represented as `Option<Heading>`, never as a
/// sentinel value.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Heading(f64);

impl Heading {
    /// Creates a new heading.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the value is not finite.
    pub fn new(degrees: f64) -> SyncResult<Self> {
        if !degrees.is_finite() {
            return Err(SyncError::validation(format!(
                "Heading must be finite, got {degrees}"
            )));
        }
        Ok(Self(degrees.rem_euclid(360.0)))
    }

    /// Returns the heading in decimal degrees.
    #[must_use]
    pub fn degrees(&self) -> f64 {
        self.0
    }
}

impl std::fmt::Display for Heading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}°", self.0)
    }
}

// =============================================================================
// Location
// =============================================================================

/// A single position fix from the device's positioning subsystem.
///
/// Samples are immutable once captured and superseded by the next sample.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationSample {
    /// Position at capture time
    pub coordinate: Coordinate,
    /// Compass heading, if one was available
    pub heading: Option<Heading>,
    /// When the positioning subsystem produced the fix
    pub captured_at: DateTime<Utc>,
}

impl LocationSample {
    /// Creates a new sample captured now.
    #[must_use]
    pub fn new(coordinate: Coordinate, heading: Option<Heading>) -> Self {
        Self {
            coordinate,
            heading,
            captured_at: Utc::now(),
        }
    }

    /// Returns `true` if the sample carries everything a location upload
    /// needs (position and heading).
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.heading.is_some()
    }
}

// =============================================================================
// Alerting
// =============================================================================

/// The monotonic identity of an SOS alert: seconds since the Unix epoch as
/// assigned by the relay.
///
/// A stamp strictly greater than the stored one supersedes the current
/// alert; an equal or smaller stamp is a duplicate delivery and is ignored.
/// Duplicate deliveries of the same wire message re-parse to a bitwise
/// identical value, so equality is exact.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AlertStamp(f64);

impl AlertStamp {
    /// Creates a stamp from seconds since the Unix epoch.
    #[must_use]
    pub fn from_epoch_seconds(seconds: f64) -> Self {
        Self(seconds)
    }

    /// Returns the stamp as seconds since the Unix epoch.
    #[must_use]
    pub fn as_epoch_seconds(&self) -> f64 {
        self.0
    }

    /// Returns `true` if this stamp strictly supersedes `other`.
    #[must_use]
    pub fn supersedes(&self, other: &Self) -> bool {
        self.0 > other.0
    }
}

impl std::fmt::Display for AlertStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle status of an alert event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    /// The alert is outstanding
    Active,
    /// The alert has been cleared by a peer
    Cleared,
}

/// A single SOS alert event.
///
/// Exactly one alert event is "current" per tracked subject at any time; it
/// persists in memory for the life of the session and is explicitly
/// replaced on clear.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    coordinate: Coordinate,
    address: Option<String>,
    raised_at: AlertStamp,
    status: AlertStatus,
}

impl AlertEvent {
    /// Creates a new active alert event.
    #[must_use]
    pub fn new(coordinate: Coordinate, address: Option<String>, raised_at: AlertStamp) -> Self {
        Self {
            coordinate,
            address,
            raised_at,
            status: AlertStatus::Active,
        }
    }

    /// Returns the alert position.
    #[must_use]
    pub fn coordinate(&self) -> Coordinate {
        self.coordinate
    }

    /// Returns the resolved address, if one is known.
    #[must_use]
    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Attaches a resolved address.
    pub fn set_address(&mut self, address: impl Into<String>) {
        self.address = Some(address.into());
    }

    /// Returns the monotonic alert id.
    #[must_use]
    pub fn raised_at(&self) -> AlertStamp {
        self.raised_at
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> AlertStatus {
        self.status
    }

    /// Marks the event cleared.
    pub fn clear(&mut self) {
        self.status = AlertStatus::Cleared;
    }

    /// Returns `true` if the alert is outstanding.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }
}

// =============================================================================
// Session
// =============================================================================

/// Which side of the protocol a client speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionRole {
    /// The tracked user's device: pushes location, originates SOS
    Tracker,
    /// A family device: consumes broadcasts, may clear SOS
    Observer,
}

impl std::fmt::Display for SessionRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tracker => write!(f, "tracker"),
            Self::Observer => write!(f, "observer"),
        }
    }
}

/// Connection lifecycle of the session transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    /// No link and no pending attempt
    Disconnected,
    /// A connection or reconnection attempt is in flight
    Connecting,
    /// The link is established
    Connected,
}

/// Session state owned by the transport.
///
/// Mutated only by transport-internal transitions; role clients read it for
/// status display and telemetry.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    /// The role this session was opened for
    pub role: SessionRole,
    /// Current connection lifecycle stage
    pub status: ConnectionStatus,
    /// Most recent transport failure, if any
    pub last_error: Option<String>,
}

impl SessionState {
    /// Creates the initial (disconnected) state for a role.
    #[must_use]
    pub fn new(role: SessionRole) -> Self {
        Self {
            role,
            status: ConnectionStatus::Disconnected,
            last_error: None,
        }
    }

    /// Returns `true` if the link is currently established.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.status == ConnectionStatus::Connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_validation() {
        assert!(Coordinate::new(24.15, 120.67).is_ok());
        assert!(Coordinate::new(90.0, 180.0).is_ok());
        assert!(Coordinate::new(-90.0, -180.0).is_ok());
        assert!(Coordinate::new(90.1, 0.0).is_err());
        assert!(Coordinate::new(0.0, -180.5).is_err());
        assert!(Coordinate::new(f64::NAN, 0.0).is_err());
        assert!(Coordinate::new(0.0, f64::INFINITY).is_err());
    }

    #[test]
    fn test_coordinate_distance() {
        let a = Coordinate::new(24.15, 120.67).unwrap();
        let b = Coordinate::new(24.15, 120.67).unwrap();
        assert!(a.distance_m(&b) < f64::EPSILON);

        // Roughly 111 km per degree of latitude.
        let c = Coordinate::new(25.15, 120.67).unwrap();
        let d = a.distance_m(&c);
        assert!((d - 111_000.0).abs() < 2_000.0, "got {d}");
    }

    #[test]
    fn test_coordinate_distance_small_offset() {
        // ~0.0005 degrees of latitude is ~55 m; the throttle radius must be
        // able to tell this apart from a 5 m jitter.
        let a = Coordinate::new(24.15, 120.67).unwrap();
        let b = Coordinate::new(24.1505, 120.67).unwrap();
        let d = a.distance_m(&b);
        assert!(d > 50.0 && d < 60.0, "got {d}");
    }

    #[test]
    fn test_heading_normalization() {
        assert!((Heading::new(0.0).unwrap().degrees() - 0.0).abs() < f64::EPSILON);
        assert!((Heading::new(360.0).unwrap().degrees() - 0.0).abs() < f64::EPSILON);
        assert!((Heading::new(-90.0).unwrap().degrees() - 270.0).abs() < f64::EPSILON);
        assert!((Heading::new(725.0).unwrap().degrees() - 5.0).abs() < 1e-9);
        assert!(Heading::new(f64::NAN).is_err());
    }

    #[test]
    fn test_alert_stamp_ordering() {
        let a = AlertStamp::from_epoch_seconds(1000.0);
        let b = AlertStamp::from_epoch_seconds(1001.0);
        assert!(b.supersedes(&a));
        assert!(!a.supersedes(&b));
        assert!(!a.supersedes(&a));
    }

    #[test]
    fn test_alert_event_lifecycle() {
        let coord = Coordinate::new(24.15, 120.67).unwrap();
        let mut event = AlertEvent::new(coord, None, AlertStamp::from_epoch_seconds(1000.0));
        assert!(event.is_active());
        assert!(event.address().is_none());

        event.set_address("Taichung");
        assert_eq!(event.address(), Some("Taichung"));

        event.clear();
        assert!(!event.is_active());
        assert_eq!(event.status(), AlertStatus::Cleared);
    }

    #[test]
    fn test_location_sample_completeness() {
        let coord = Coordinate::new(24.15, 120.67).unwrap();
        let with_heading = LocationSample::new(coord, Some(Heading::new(90.0).unwrap()));
        assert!(with_heading.is_complete());

        let without = LocationSample::new(coord, None);
        assert!(!without.is_complete());
    }

    #[test]
    fn test_session_state() {
        let mut state = SessionState::new(SessionRole::Observer);
        assert!(!state.is_connected());
        assert!(state.last_error.is_none());

        state.status = ConnectionStatus::Connected;
        assert!(state.is_connected());
    }
}
