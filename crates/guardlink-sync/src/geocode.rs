//! Throttled reverse-geocoding.
//!
//! Converts coordinates to display addresses without saturating the external
//! geocoding service. Lookups are suppressed when the last attempt was less
//! than the throttle interval ago or the coordinate has moved less than the
//! throttle radius; in either case the single-slot cache answers instead.
//!
//! When a newer lookup is issued while an older one is still in flight, the
//! older result is discarded on arrival: last-write-wins by issue order, not
//! arrival order, so a stale address can never overwrite a fresher one. The
//! same generation guard makes late completions no-ops after the owner has
//! moved on.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use guardlink_core::{Coordinate, ReverseGeocoder};

use crate::config::GeocodeThrottle;

/// A cached geocoding outcome.
///
/// `Unavailable` records that a lookup was attempted and failed, which is
/// deliberately distinct from "never queried" (an empty cache slot).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedAddress {
    /// The service resolved an address
    Resolved(String),
    /// The last lookup failed; retried on the next eligible window
    Unavailable,
}

impl ResolvedAddress {
    /// Returns the resolved address, if one is held.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Resolved(address) => Some(address),
            Self::Unavailable => None,
        }
    }

    /// Returns a user-facing string for this outcome.
    #[must_use]
    pub fn display_text(&self) -> &str {
        match self {
            Self::Resolved(address) => address,
            Self::Unavailable => "address unavailable",
        }
    }
}

/// Single-slot cache state.
#[derive(Debug, Clone)]
struct CacheSlot {
    /// When the recorded lookup was issued (successful or not)
    queried_at: Instant,
    /// The coordinate the recorded lookup was issued for
    queried: Coordinate,
    /// The most recent outcome
    resolved: ResolvedAddress,
}

/// Rate-limited wrapper around a [`ReverseGeocoder`].
pub struct ThrottledGeocoder {
    inner: Arc<dyn ReverseGeocoder>,
    throttle: GeocodeThrottle,
    cache: Mutex<Option<CacheSlot>>,
    /// Issue-order generation counter; the newest issued lookup wins.
    generation: AtomicU64,
}

impl ThrottledGeocoder {
    /// Creates a throttled wrapper around a raw geocoder.
    pub fn new(inner: Arc<dyn ReverseGeocoder>, throttle: GeocodeThrottle) -> Self {
        Self {
            inner,
            throttle,
            cache: Mutex::new(None),
            generation: AtomicU64::new(0),
        }
    }

    /// Resolves a coordinate to a display address, consulting the cache
    /// when the throttle suppresses a fresh lookup.
    pub async fn resolve(&self, coordinate: Coordinate) -> ResolvedAddress {
        let generation = {
            let mut cache = self.cache.lock();

            if let Some(slot) = cache.as_ref() {
                let too_soon = slot.queried_at.elapsed() < self.throttle.min_interval;
                let too_close = slot.queried.distance_m(&coordinate) < self.throttle.min_distance_m;
                if too_soon || too_close {
                    tracing::trace!(%coordinate, too_soon, too_close, "Geocode throttled");
                    return slot.resolved.clone();
                }
            }

            // Record the attempt up front: the throttle measures from issue
            // time, and concurrent callers must be suppressed while this
            // lookup is in flight.
            let previous = cache
                .as_ref()
                .map(|slot| slot.resolved.clone())
                .unwrap_or(ResolvedAddress::Unavailable);
            *cache = Some(CacheSlot {
                queried_at: Instant::now(),
                queried: coordinate,
                resolved: previous,
            });

            self.generation.fetch_add(1, Ordering::SeqCst) + 1
        };

        let resolved = match self.inner.reverse_geocode(coordinate).await {
            Ok(address) => ResolvedAddress::Resolved(address),
            Err(error) => {
                tracing::warn!(%coordinate, %error, "Reverse geocode failed");
                ResolvedAddress::Unavailable
            }
        };

        let mut cache = self.cache.lock();
        if self.generation.load(Ordering::SeqCst) != generation {
            // A newer lookup was issued while this one was in flight; its
            // result owns the cache. Hand back whatever is current instead.
            tracing::debug!(%coordinate, "Discarding superseded geocode result");
            return cache
                .as_ref()
                .map(|slot| slot.resolved.clone())
                .unwrap_or(resolved);
        }

        if let Some(slot) = cache.as_mut() {
            slot.resolved = resolved.clone();
        }
        resolved
    }

    /// Returns the most recent cached outcome, if any lookup was attempted.
    #[must_use]
    pub fn last_resolved(&self) -> Option<ResolvedAddress> {
        self.cache.lock().as_ref().map(|slot| slot.resolved.clone())
    }
}
