//! Configuration for the synchronization core.

use std::time::Duration;

use url::Url;

use guardlink_core::{SyncError, SyncResult};

/// Throttle parameters for reverse-geocoding lookups.
#[derive(Debug, Clone, Copy)]
pub struct GeocodeThrottle {
    /// Minimum time between underlying lookups
    pub min_interval: Duration,
    /// Minimum movement (meters) before a new lookup is issued
    pub min_distance_m: f64,
}

impl Default for GeocodeThrottle {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(10),
            min_distance_m: 50.0,
        }
    }
}

/// Configuration for one client session.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// WebSocket base URL of the relay (e.g. `wss://relay.example`)
    pub relay_url: Url,
    /// HTTP base URL for the polling fallback, if one is deployed
    pub fallback_url: Option<Url>,
    /// Interval between tracker location uploads
    pub location_interval: Duration,
    /// Interval between fallback location polls
    pub location_poll_interval: Duration,
    /// Interval between fallback SOS polls
    pub sos_poll_interval: Duration,
    /// Fixed delay before the single reconnect attempt after a failure
    pub reconnect_backoff: Duration,
    /// Outbound message queue depth
    pub outbound_queue: usize,
    /// Reverse-geocoding throttle parameters
    pub geocode: GeocodeThrottle,
}

impl SyncConfig {
    /// Create a new configuration builder.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Returns the per-client session endpoint (`<relay>/ws/<client-id>`).
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the joined URL is not valid.
    pub fn session_endpoint(&self, client_id: &str) -> SyncResult<Url> {
        let base = self.relay_url.as_str().trim_end_matches('/');
        Url::parse(&format!("{base}/ws/{client_id}")).map_err(|e| {
            SyncError::configuration(format!("Invalid session endpoint for '{client_id}': {e}"))
        })
    }
}

/// Builder for [`SyncConfig`].
#[derive(Debug, Default)]
pub struct SyncConfigBuilder {
    relay_url: Option<Url>,
    fallback_url: Option<Url>,
    location_interval: Option<Duration>,
    location_poll_interval: Option<Duration>,
    sos_poll_interval: Option<Duration>,
    reconnect_backoff: Option<Duration>,
    outbound_queue: Option<usize>,
    geocode: Option<GeocodeThrottle>,
}

impl SyncConfigBuilder {
    /// Set the relay WebSocket base URL (required).
    pub fn relay_url(mut self, url: Url) -> Self {
        self.relay_url = Some(url);
        self
    }

    /// Set the HTTP fallback base URL.
    pub fn fallback_url(mut self, url: Url) -> Self {
        self.fallback_url = Some(url);
        self
    }

    /// Set the location upload interval (clamped to at least 1 s).
    pub fn location_interval(mut self, interval: Duration) -> Self {
        self.location_interval = Some(interval.max(Duration::from_secs(1)));
        self
    }

    /// Set the fallback location poll interval (clamped to at least 1 s).
    pub fn location_poll_interval(mut self, interval: Duration) -> Self {
        self.location_poll_interval = Some(interval.max(Duration::from_secs(1)));
        self
    }

    /// Set the fallback SOS poll interval (clamped to at least 1 s).
    pub fn sos_poll_interval(mut self, interval: Duration) -> Self {
        self.sos_poll_interval = Some(interval.max(Duration::from_secs(1)));
        self
    }

    /// Set the reconnect backoff delay.
    pub fn reconnect_backoff(mut self, backoff: Duration) -> Self {
        self.reconnect_backoff = Some(backoff);
        self
    }

    /// Set the outbound queue depth (clamped to at least 1).
    pub fn outbound_queue(mut self, depth: usize) -> Self {
        self.outbound_queue = Some(depth.max(1));
        self
    }

    /// Set the geocode throttle parameters.
    pub fn geocode(mut self, throttle: GeocodeThrottle) -> Self {
        self.geocode = Some(throttle);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if no relay URL was provided.
    pub fn build(self) -> SyncResult<SyncConfig> {
        let relay_url = self
            .relay_url
            .ok_or_else(|| SyncError::configuration("relay_url is required"))?;

        Ok(SyncConfig {
            relay_url,
            fallback_url: self.fallback_url,
            location_interval: self.location_interval.unwrap_or(Duration::from_secs(5)),
            location_poll_interval: self
                .location_poll_interval
                .unwrap_or(Duration::from_secs(5)),
            sos_poll_interval: self.sos_poll_interval.unwrap_or(Duration::from_secs(3)),
            reconnect_backoff: self.reconnect_backoff.unwrap_or(Duration::from_secs(3)),
            outbound_queue: self.outbound_queue.unwrap_or(32),
            geocode: self.geocode.unwrap_or_default(),
        })
    }
}
