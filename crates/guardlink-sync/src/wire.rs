//! Wire protocol for the relay connection.
//!
//! Every message is a JSON envelope with a `"type"` discriminator:
//!
//! ```json
//! {"type": "sos_alert", "lat": 24.15, "lng": 120.67, "timestamp": 1000, "address": "Taichung"}
//! ```
//!
//! ## Message Types
//!
//! Client → relay ([`ClientMessage`]):
//!
//! - `location` - periodic position/heading upload
//! - `sos` - raise an emergency alert
//! - `clear_sos` - request the outstanding alert be cleared
//! - `navigation_signal` - opaque navigation payload, routed untouched
//!
//! Relay → client ([`RelayMessage`]):
//!
//! - `location` / `location_update` - tracked user position broadcast
//! - `sos_alert` - an alert is outstanding (carries the monotonic timestamp)
//! - `sos_cleared` - the outstanding alert was cleared
//! - `navigation_instruction` - opaque navigation payload, routed untouched
//!
//! ## Decode Policy
//!
//! An envelope with an unrecognized `type` is not an error: it decodes to
//! [`Decoded::Unknown`] so the receive loop can log it and move on (forward
//! compatibility). A recognized envelope with missing or invalid required
//! fields is a [`DecodeError`] delivered to the owning role client; a single
//! bad message never terminates the session.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use guardlink_core::DecodeError;

/// Envelope types this client understands.
///
/// An inbound `type` outside this list decodes to [`Decoded::Unknown`].
const RECOGNIZED_TYPES: &[&str] = &[
    "location",
    "location_update",
    "sos_alert",
    "sos_cleared",
    "navigation_instruction",
];

/// A raw frame as carried by the transport.
///
/// The relay may deliver either text or binary frames; both carry the same
/// UTF-8 JSON payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireFrame {
    /// A text frame
    Text(String),
    /// A binary frame (UTF-8 JSON bytes)
    Binary(Vec<u8>),
}

impl WireFrame {
    /// Returns the frame payload as a string slice.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::InvalidUtf8`] if a binary frame does not hold
    /// valid UTF-8.
    pub fn as_text(&self) -> Result<&str, DecodeError> {
        match self {
            Self::Text(text) => Ok(text),
            Self::Binary(bytes) => std::str::from_utf8(bytes).map_err(|e| {
                DecodeError::InvalidUtf8 {
                    reason: e.to_string(),
                }
            }),
        }
    }
}

/// Messages sent from a role client to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Periodic position/heading upload from the tracker
    Location {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lng: f64,
        /// Compass heading in decimal degrees
        heading: f64,
        /// Capture time, seconds since the Unix epoch
        timestamp: f64,
    },
    /// Raise an emergency alert at the given position
    Sos {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lng: f64,
    },
    /// Request the outstanding alert be cleared for all peers
    ClearSos,
    /// Opaque navigation payload, routed untouched
    NavigationSignal {
        /// The opaque payload
        payload: String,
    },
}

impl ClientMessage {
    /// Encodes the message as a text wire frame.
    ///
    /// # Errors
    ///
    /// Returns the underlying serializer error; with these types this only
    /// occurs under allocation failure.
    pub fn to_frame(&self) -> Result<WireFrame, serde_json::Error> {
        Ok(WireFrame::Text(serde_json::to_string(self)?))
    }
}

/// Messages broadcast from the relay to a role client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RelayMessage {
    /// Full position broadcast (tracker-originated)
    Location {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lng: f64,
        /// Compass heading in decimal degrees
        heading: f64,
        /// Capture time, seconds since the Unix epoch
        timestamp: f64,
    },
    /// Position-only broadcast
    LocationUpdate {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lng: f64,
    },
    /// An alert is outstanding
    SosAlert {
        /// Latitude in decimal degrees
        lat: f64,
        /// Longitude in decimal degrees
        lng: f64,
        /// Monotonic alert id, seconds since the Unix epoch
        timestamp: f64,
        /// Pre-resolved address, if the relay supplied one
        #[serde(default)]
        address: Option<String>,
    },
    /// The outstanding alert was cleared
    SosCleared,
    /// Opaque navigation payload, routed untouched
    NavigationInstruction {
        /// The opaque payload
        payload: String,
    },
}

/// Result of decoding one inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    /// A recognized, well-formed message
    Message(RelayMessage),
    /// An envelope whose `type` this client does not recognize; carries the
    /// unrecognized discriminator for logging
    Unknown(String),
}

/// Decodes an inbound frame into a relay message.
///
/// # Errors
///
/// Returns a [`DecodeError`] for frames that are not UTF-8 JSON objects,
/// envelopes without a `type`, or recognized envelopes with malformed
/// payloads. Unrecognized envelope types are **not** errors.
pub fn decode_frame(frame: &WireFrame) -> Result<Decoded, DecodeError> {
    let text = frame.as_text()?;

    let value: Value = serde_json::from_str(text).map_err(|e| DecodeError::InvalidJson {
        reason: e.to_string(),
    })?;

    let message_type = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or(DecodeError::MissingType)?;

    if !RECOGNIZED_TYPES.contains(&message_type) {
        return Ok(Decoded::Unknown(message_type.to_string()));
    }

    let message_type = message_type.to_string();
    serde_json::from_value(value)
        .map(Decoded::Message)
        .map_err(|e| DecodeError::MalformedPayload {
            message_type,
            reason: e.to_string(),
        })
}
