//! Error types for the GuardLink synchronization core.
//!
//! This module provides the error taxonomy using [`thiserror`] for
//! automatic `Display` and `Error` trait implementations.
//!
//! # Error Hierarchy
//!
//! - [`SyncError`]: Top-level error type that encompasses all subsystem errors
//! - [`TransportError`]: Errors from the relay session transport
//! - [`DecodeError`]: Errors from decoding wire messages
//! - [`GeocodeError`]: Errors from reverse-geocoding lookups
//!
//! None of these errors is fatal to the process: transport errors are
//! recovered by the scheduled reconnect, decode errors drop the offending
//! message and keep the receive loop alive, and geocode errors degrade to a
//! cached "unavailable" address. The worst case under sustained failure is
//! degraded freshness, never incorrect alert suppression.

use thiserror::Error;

/// A specialized `Result` type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Top-level error type for the GuardLink core.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum SyncError {
    /// Session transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// Wire message decode error
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Reverse-geocoding error
    #[error("Geocode error: {0}")]
    Geocode(#[from] GeocodeError),

    /// Validation error for input data
    #[error("Validation error: {message}")]
    Validation {
        /// Description of what validation failed
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Configuration {
        /// Description of the configuration error
        message: String,
    },
}

impl SyncError {
    /// Creates a new validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Recoverable errors are retried or degrade gracefully; the others
    /// indicate a caller bug (bad input, bad configuration).
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_recoverable(),
            Self::Decode(_) | Self::Geocode(_) => true,
            Self::Validation { .. } | Self::Configuration { .. } => false,
        }
    }
}

/// Errors from the relay session transport.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    /// Connecting to the relay endpoint failed
    #[error("Failed to connect to '{endpoint}': {reason}")]
    ConnectFailed {
        /// The endpoint that was dialed
        endpoint: String,
        /// Reason for the failure
        reason: String,
    },

    /// Sending a message over the link failed
    #[error("Send failed: {reason}")]
    SendFailed {
        /// Reason for the failure
        reason: String,
    },

    /// Receiving from the link failed
    #[error("Receive failed: {reason}")]
    ReceiveFailed {
        /// Reason for the failure
        reason: String,
    },

    /// The remote peer closed the connection
    #[error("Connection closed by peer")]
    ClosedByPeer,

    /// The session has been shut down locally
    #[error("Session is not connected")]
    NotConnected,

    /// The outbound queue is full
    #[error("Outbound queue full ({capacity} messages pending)")]
    QueueFull {
        /// Queue capacity at the time of rejection
        capacity: usize,
    },
}

impl TransportError {
    /// Creates a connect failure from an endpoint and an underlying error.
    #[must_use]
    pub fn connect_failed(endpoint: impl Into<String>, reason: impl ToString) -> Self {
        Self::ConnectFailed {
            endpoint: endpoint.into(),
            reason: reason.to_string(),
        }
    }

    /// Creates a send failure from an underlying error.
    #[must_use]
    pub fn send_failed(reason: impl ToString) -> Self {
        Self::SendFailed {
            reason: reason.to_string(),
        }
    }

    /// Creates a receive failure from an underlying error.
    #[must_use]
    pub fn receive_failed(reason: impl ToString) -> Self {
        Self::ReceiveFailed {
            reason: reason.to_string(),
        }
    }

    /// Returns `true` if this error is recoverable.
    ///
    /// Everything except a local shutdown is recovered by the reconnect
    /// policy; `NotConnected` means the caller tore the session down and
    /// must connect again explicitly.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        match self {
            Self::ConnectFailed { .. }
            | Self::SendFailed { .. }
            | Self::ReceiveFailed { .. }
            | Self::ClosedByPeer
            | Self::QueueFull { .. } => true,
            Self::NotConnected => false,
        }
    }
}

/// Errors from decoding inbound wire messages.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// The frame payload was not valid UTF-8
    #[error("Frame is not valid UTF-8: {reason}")]
    InvalidUtf8 {
        /// Reason for the failure
        reason: String,
    },

    /// The frame payload was not a JSON object
    #[error("Frame is not a JSON object: {reason}")]
    InvalidJson {
        /// Reason for the failure
        reason: String,
    },

    /// The envelope is missing its `type` discriminator
    #[error("Envelope has no 'type' field")]
    MissingType,

    /// A recognized envelope is missing or carries an invalid required field
    #[error("Malformed '{message_type}' envelope: {reason}")]
    MalformedPayload {
        /// The recognized envelope type
        message_type: String,
        /// Reason for the failure
        reason: String,
    },
}

/// Errors from reverse-geocoding lookups.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GeocodeError {
    /// The lookup service returned an error
    #[error("Lookup failed: {reason}")]
    LookupFailed {
        /// Reason for the failure
        reason: String,
    },

    /// The lookup produced no address for the coordinate
    #[error("No address found for coordinate")]
    NoResult,
}

impl GeocodeError {
    /// Creates a lookup failure from an underlying error.
    #[must_use]
    pub fn lookup_failed(reason: impl ToString) -> Self {
        Self::LookupFailed {
            reason: reason.to_string(),
        }
    }
}
