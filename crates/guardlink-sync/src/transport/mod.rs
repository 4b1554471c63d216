//! Reconnecting session transport.
//!
//! [`SessionTransport`] presents one logical duplex channel to the relay
//! over an unreliable substrate. It owns the [`SessionState`] and a
//! background session task that:
//!
//! 1. dials the relay through the injected [`LinkConnector`],
//! 2. pumps outbound messages and inbound frames concurrently,
//! 3. on a receive failure or abrupt close, records the error, emits a
//!    `Disconnected` event, and schedules exactly one reconnect attempt
//!    after a fixed backoff (re-armed on every failure, no exponential
//!    growth),
//! 4. tears everything down when [`SessionTransport::disconnect`] is
//!    called, including a reconnect timer still pending, which would
//!    otherwise resurrect a session the caller believed closed.
//!
//! Decoded inbound traffic and transport lifecycle changes are delivered as
//! a single ordered stream of [`TransportEvent`]s consumed by the owning
//! role client. A malformed message surfaces as `DecodeFailed` and the
//! receive loop continues; an unrecognized envelope type is logged and
//! dropped.

pub mod link;

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use url::Url;

use guardlink_core::{ConnectionStatus, SessionRole, SessionState, TransportError};

use crate::wire::{self, ClientMessage, Decoded};
use link::{LinkConnector, RelayLink};

pub use link::WebSocketConnector;

/// Events delivered to the owning role client.
#[derive(Debug)]
pub enum TransportEvent {
    /// The link was established (first connect or reconnect)
    Connected,
    /// The link was lost; a reconnect is scheduled unless the session is
    /// being torn down
    Disconnected {
        /// Why the link was lost
        reason: String,
    },
    /// A decoded inbound message
    Message(wire::RelayMessage),
    /// An inbound message that failed to decode; the session continues
    DecodeFailed(guardlink_core::DecodeError),
    /// An outbound message could not be sent; the session continues
    SendFailed {
        /// Why the send failed
        reason: String,
    },
}

/// Transport tuning parameters.
#[derive(Debug, Clone, Copy)]
pub struct TransportConfig {
    /// Fixed delay before the single reconnect attempt after a failure
    pub reconnect_backoff: Duration,
    /// Outbound queue depth
    pub outbound_queue: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            reconnect_backoff: Duration::from_secs(3),
            outbound_queue: 32,
        }
    }
}

/// One logical duplex channel to the relay, with transparent reconnection.
pub struct SessionTransport {
    state: Arc<RwLock<SessionState>>,
    outbound_tx: mpsc::Sender<ClientMessage>,
    shutdown_tx: watch::Sender<bool>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionTransport {
    /// Opens a session to `endpoint` and returns the transport handle
    /// together with its event stream.
    ///
    /// The stream is lazy and unbounded in duration; it ends only when the
    /// session is torn down.
    pub fn connect(
        role: SessionRole,
        endpoint: Url,
        connector: Arc<dyn LinkConnector>,
        config: TransportConfig,
    ) -> (Self, mpsc::Receiver<TransportEvent>) {
        let state = Arc::new(RwLock::new(SessionState::new(role)));
        let (outbound_tx, outbound_rx) = mpsc::channel(config.outbound_queue.max(1));
        let (events_tx, events_rx) = mpsc::channel(64);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let task = tokio::spawn(session_task(
            endpoint,
            connector,
            Arc::clone(&state),
            outbound_rx,
            events_tx,
            shutdown_rx,
            config.reconnect_backoff,
        ));

        (
            Self {
                state,
                outbound_tx,
                shutdown_tx,
                task: Mutex::new(Some(task)),
            },
            events_rx,
        )
    }

    /// Enqueues a message for transmission.
    ///
    /// Never blocks: if the session is down the message is dropped into the
    /// failure path (a [`TransportError`] here, a `SendFailed` event if the
    /// link dies mid-flight), never a panic.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::QueueFull`] when the outbound queue is at
    /// capacity and [`TransportError::NotConnected`] after teardown.
    pub fn send(&self, message: ClientMessage) -> Result<(), TransportError> {
        self.outbound_tx
            .try_send(message)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => TransportError::QueueFull {
                    capacity: self.outbound_tx.max_capacity(),
                },
                mpsc::error::TrySendError::Closed(_) => TransportError::NotConnected,
            })
    }

    /// Returns a snapshot of the session state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state.read().clone()
    }

    /// Tears the session down: cancels any pending reconnect, closes the
    /// link, and waits for the session task to finish. Idempotent.
    pub async fn disconnect(&self) {
        let _ = self.shutdown_tx.send(true);
        let task = self.task.lock().await.take();
        if let Some(task) = task {
            let _ = task.await;
        }
        let mut state = self.state.write();
        state.status = ConnectionStatus::Disconnected;
    }
}

/// Why the frame pump stopped.
enum PumpExit {
    /// Local teardown requested
    Shutdown,
    /// The link failed or was closed by the peer
    LinkFailed(String),
}

async fn session_task(
    endpoint: Url,
    connector: Arc<dyn LinkConnector>,
    state: Arc<RwLock<SessionState>>,
    mut outbound_rx: mpsc::Receiver<ClientMessage>,
    events_tx: mpsc::Sender<TransportEvent>,
    mut shutdown_rx: watch::Receiver<bool>,
    backoff: Duration,
) {
    loop {
        if *shutdown_rx.borrow() {
            break;
        }

        state.write().status = ConnectionStatus::Connecting;
        tracing::debug!(%endpoint, "Connecting to relay");

        let connected = tokio::select! {
            result = connector.connect(&endpoint) => result,
            _ = shutdown_rx.changed() => break,
        };

        match connected {
            Ok(mut link) => {
                {
                    let mut state = state.write();
                    state.status = ConnectionStatus::Connected;
                    state.last_error = None;
                }
                tracing::info!(%endpoint, "Session connected");
                if events_tx.send(TransportEvent::Connected).await.is_err() {
                    link.close().await;
                    break;
                }

                let exit = pump(
                    link.as_mut(),
                    &mut outbound_rx,
                    &events_tx,
                    &mut shutdown_rx,
                )
                .await;
                link.close().await;

                match exit {
                    PumpExit::Shutdown => break,
                    PumpExit::LinkFailed(reason) => {
                        tracing::warn!(%endpoint, %reason, "Session lost");
                        {
                            let mut state = state.write();
                            state.status = ConnectionStatus::Disconnected;
                            state.last_error = Some(reason.clone());
                        }
                        if events_tx
                            .send(TransportEvent::Disconnected { reason })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                }
            }
            Err(error) => {
                let reason = error.to_string();
                tracing::warn!(%endpoint, %reason, "Connect attempt failed");
                {
                    let mut state = state.write();
                    state.status = ConnectionStatus::Disconnected;
                    state.last_error = Some(reason.clone());
                }
                if events_tx
                    .send(TransportEvent::Disconnected { reason })
                    .await
                    .is_err()
                {
                    break;
                }
            }
        }

        // Exactly one reconnect attempt per failure, after a fixed backoff.
        // A teardown during the backoff window cancels the attempt.
        tracing::debug!(?backoff, "Reconnect scheduled");
        tokio::select! {
            _ = tokio::time::sleep(backoff) => {}
            _ = shutdown_rx.changed() => break,
        }
    }

    state.write().status = ConnectionStatus::Disconnected;
    tracing::debug!("Session task finished");
}

async fn pump(
    link: &mut dyn RelayLink,
    outbound_rx: &mut mpsc::Receiver<ClientMessage>,
    events_tx: &mpsc::Sender<TransportEvent>,
    shutdown_rx: &mut watch::Receiver<bool>,
) -> PumpExit {
    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(message) => match message.to_frame() {
                    Ok(frame) => {
                        if let Err(error) = link.send(frame).await {
                            let reason = error.to_string();
                            let _ = events_tx
                                .send(TransportEvent::SendFailed { reason: reason.clone() })
                                .await;
                            return PumpExit::LinkFailed(reason);
                        }
                    }
                    Err(error) => {
                        // Serialization failure affects only this message.
                        let _ = events_tx
                            .send(TransportEvent::SendFailed {
                                reason: error.to_string(),
                            })
                            .await;
                    }
                },
                // The transport handle was dropped.
                None => return PumpExit::Shutdown,
            },
            inbound = link.next_frame() => match inbound {
                Some(Ok(frame)) => match wire::decode_frame(&frame) {
                    Ok(Decoded::Message(message)) => {
                        if events_tx.send(TransportEvent::Message(message)).await.is_err() {
                            return PumpExit::Shutdown;
                        }
                    }
                    Ok(Decoded::Unknown(message_type)) => {
                        tracing::debug!(message_type, "Ignoring unrecognized envelope type");
                    }
                    Err(error) => {
                        if events_tx.send(TransportEvent::DecodeFailed(error)).await.is_err() {
                            return PumpExit::Shutdown;
                        }
                    }
                },
                Some(Err(error)) => return PumpExit::LinkFailed(error.to_string()),
                None => return PumpExit::LinkFailed("connection closed by peer".to_string()),
            },
            _ = shutdown_rx.changed() => return PumpExit::Shutdown,
        }
    }
}
