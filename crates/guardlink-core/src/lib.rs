//! # GuardLink Core
//!
//! Core types, errors, and collaborator traits for the GuardLink live
//! location / SOS synchronization system.
//!
//! This crate provides the foundational building blocks shared by both
//! client roles:
//!
//! - **Core Data Types**: [`Coordinate`], [`LocationSample`], [`AlertEvent`],
//!   [`AlertStamp`], and [`SessionState`] for representing position fixes,
//!   emergency alerts, and session lifecycle.
//!
//! - **Error Types**: the error taxonomy via the [`error`] module, with
//!   specific error types for the transport, codec, and geocoding
//!   subsystems. No error in this crate is fatal to the process.
//!
//! - **Traits**: the platform seams [`PositionSource`], [`Notifier`], and
//!   [`ReverseGeocoder`] that the synchronization core is injected with.
//!
//! ## Example
//!
//! ```rust
//! use guardlink_core::{AlertEvent, AlertStamp, Coordinate};
//!
//! let position = Coordinate::new(24.15, 120.67).unwrap();
//! let alert = AlertEvent::new(position, None, AlertStamp::from_epoch_seconds(1000.0));
//!
//! assert!(alert.is_active());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

// Re-export commonly used types at the crate root
pub use error::{DecodeError, GeocodeError, SyncError, SyncResult, TransportError};
pub use traits::{LogNotifier, Notifier, PositionSource, ReverseGeocoder};
pub use types::{
    // Geography
    Coordinate, Heading,
    // Location
    LocationSample,
    // Alerting
    AlertEvent, AlertStamp, AlertStatus,
    // Session
    ConnectionStatus, SessionRole, SessionState,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        AlertEvent, AlertStamp, AlertStatus, ConnectionStatus, Coordinate, DecodeError,
        GeocodeError, Heading, LocationSample, Notifier, PositionSource, ReverseGeocoder,
        SessionRole, SessionState, SyncError, SyncResult, TransportError,
    };
}
