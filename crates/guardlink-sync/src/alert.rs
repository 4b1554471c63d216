//! Alert lifecycle state machine.
//!
//! Both roles run an [`AlertMonitor`]: the observer to deduplicate relay
//! broadcasts before alerting the family member, the tracker to track the
//! relay's acknowledgement of its own SOS. At most one alert is outstanding
//! at a time; the monotonic [`AlertStamp`] carried by every `sos_alert` is
//! the sole defense against duplicate or replayed deliveries across
//! reconnects.
//!
//! # Transitions
//!
//! - `Idle --raise(t)--> Active(t)` when `t` is strictly newer than every
//!   stamp seen so far
//! - `Active(t) --raise(t' > t)--> Active(t')` (superseded, treated as a new
//!   alert)
//! - `Active(t) --raise(t'' <= t)--> Active(t)` (duplicate delivery, no-op)
//! - `clear` from any state yields `Idle`
//!
//! The highest stamp ever observed is retained across `clear`, so after a
//! clear only a strictly newer `raised_at` can re-open an alert. Side
//! effects belong to the caller and must fire only when [`AlertMonitor::raise`]
//! reports [`RaiseOutcome::Raised`].

use guardlink_core::{AlertEvent, AlertStamp};

/// Current state of the alert monitor.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertState {
    /// No alert outstanding
    Idle,
    /// An alert is outstanding
    Active(AlertEvent),
}

/// Outcome of feeding an alert event through the monitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaiseOutcome {
    /// A genuine new alert; the caller must fire side effects exactly once
    Raised,
    /// A duplicate or out-of-date delivery; silently ignored
    Stale,
}

/// Deduplicating alert lifecycle monitor.
#[derive(Debug, Default)]
pub struct AlertMonitor {
    state: Option<AlertEvent>,
    highest_seen: Option<AlertStamp>,
}

impl AlertMonitor {
    /// Creates a monitor in the `Idle` state with no stamps seen.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds an alert event through the monitor.
    ///
    /// Returns [`RaiseOutcome::Raised`] only when the event's stamp is
    /// strictly newer than every stamp seen so far; side effects must be
    /// keyed off that outcome.
    pub fn raise(&mut self, event: AlertEvent) -> RaiseOutcome {
        if let Some(highest) = self.highest_seen {
            if !event.raised_at().supersedes(&highest) {
                tracing::debug!(
                    raised_at = %event.raised_at(),
                    highest_seen = %highest,
                    "Ignoring stale alert delivery"
                );
                return RaiseOutcome::Stale;
            }
        }

        tracing::info!(raised_at = %event.raised_at(), "Alert raised");
        self.highest_seen = Some(event.raised_at());
        self.state = Some(event);
        RaiseOutcome::Raised
    }

    /// Clears the outstanding alert, if any.
    ///
    /// Returns `true` if the state actually changed (an alert was active).
    /// The highest stamp seen is retained so a replay of the cleared alert
    /// cannot re-open it.
    pub fn clear(&mut self) -> bool {
        match self.state.take() {
            Some(event) => {
                tracing::info!(raised_at = %event.raised_at(), "Alert cleared");
                true
            }
            None => false,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> AlertState {
        match &self.state {
            Some(event) => AlertState::Active(event.clone()),
            None => AlertState::Idle,
        }
    }

    /// Returns the outstanding alert event, if any.
    #[must_use]
    pub fn active_event(&self) -> Option<&AlertEvent> {
        self.state.as_ref()
    }

    /// Returns `true` if an alert is outstanding.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.state.is_some()
    }

    /// Attaches a resolved address to the outstanding alert, but only if it
    /// is still the one raised at `stamp`.
    ///
    /// Geocoding completes after the raise transition; by then the alert may
    /// have been cleared or superseded, in which case the late address must
    /// not be applied.
    pub fn set_address_if_current(&mut self, stamp: AlertStamp, address: impl Into<String>) {
        if let Some(event) = self.state.as_mut() {
            if event.raised_at() == stamp {
                event.set_address(address);
            }
        }
    }
}
