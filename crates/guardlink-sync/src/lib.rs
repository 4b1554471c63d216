//! # GuardLink Sync
//!
//! The live location / SOS synchronization core.
//!
//! This crate keeps a tracked user's device and one or more family observer
//! devices consistent about the user's position and emergency alert state,
//! despite unreliable mobile connectivity. It provides:
//!
//! - **Wire Codec** ([`wire`]): typed JSON envelopes over text or binary
//!   frames, tolerant of unrecognized message types.
//! - **Session Transport** ([`transport`]): one logical duplex channel to
//!   the relay with transparent, cancellable reconnection.
//! - **Alert State Machine** ([`alert`]): at-most-one outstanding alert,
//!   deduplicated by the monotonic `raised_at` stamp.
//! - **Throttled Geocoder** ([`geocode`]): coordinate-to-address resolution
//!   rate-limited by time and distance, last-write-wins by issue order.
//! - **Role Clients** ([`tracker`], [`observer`]): the two sides of the
//!   protocol.
//! - **HTTP Fallback** ([`fallback`]): the relay's polling interface for
//!   deployments without a push session.
//!
//! ## Architecture
//!
//! ```text
//!   ┌──────────┐  location/sos   ┌───────┐  sos_alert/...  ┌──────────┐
//!   │ Tracker  ├────────────────▶│ relay │────────────────▶│ Observer │
//!   │ client   │◀────────────────┤ (hub) │◀────────────────┤ client   │
//!   └────┬─────┘  sos_cleared    └───────┘  clear_sos      └────┬─────┘
//!        │                                                      │
//!   SessionTransport                                      SessionTransport
//!   (reconnecting)                                        (reconnecting)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use guardlink_core::{LogNotifier, SessionRole};
//! use guardlink_sync::config::SyncConfig;
//! use guardlink_sync::observer::Observer;
//! use guardlink_sync::transport::{SessionTransport, TransportConfig, WebSocketConnector};
//!
//! # async fn run(geocoder: Arc<dyn guardlink_core::ReverseGeocoder>) -> guardlink_core::SyncResult<()> {
//! let config = SyncConfig::builder()
//!     .relay_url(url::Url::parse("wss://relay.example").unwrap())
//!     .build()?;
//!
//! let endpoint = config.session_endpoint("observer-1")?;
//! let (transport, events) = SessionTransport::connect(
//!     SessionRole::Observer,
//!     endpoint,
//!     Arc::new(WebSocketConnector),
//!     TransportConfig::default(),
//! );
//!
//! let observer = Observer::new(
//!     Arc::new(transport),
//!     geocoder,
//!     Arc::new(LogNotifier),
//!     config,
//! );
//! observer.run_events(events).await;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod alert;
pub mod config;
pub mod fallback;
pub mod geocode;
pub mod observer;
pub mod tracker;
pub mod transport;
pub mod wire;

// Re-export the main types at the crate root
pub use alert::{AlertMonitor, AlertState, RaiseOutcome};
pub use config::{GeocodeThrottle, SyncConfig, SyncConfigBuilder};
pub use fallback::FallbackClient;
pub use geocode::{ResolvedAddress, ThrottledGeocoder};
pub use observer::Observer;
pub use tracker::Tracker;
pub use transport::{
    link::{LinkConnector, RelayLink},
    SessionTransport, TransportConfig, TransportEvent, WebSocketConnector,
};
pub use wire::{ClientMessage, Decoded, RelayMessage, WireFrame};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
