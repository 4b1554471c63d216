//! Shared test doubles for the integration suites.

// Not every suite uses every helper.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use url::Url;

use guardlink_core::{Notifier, TransportError};
use guardlink_sync::transport::link::{LinkConnector, RelayLink};
use guardlink_sync::wire::WireFrame;

/// One scripted connection attempt.
pub enum ConnectOutcome {
    /// The attempt fails with the given reason
    Fail(String),
    /// The attempt succeeds with this link
    Link(TestLink),
}

/// Connector that replays a script of connection outcomes and counts
/// attempts.
pub struct ScriptedConnector {
    scripts: Mutex<VecDeque<ConnectOutcome>>,
    attempts: AtomicUsize,
}

impl ScriptedConnector {
    pub fn new(scripts: Vec<ConnectOutcome>) -> Arc<Self> {
        Arc::new(Self {
            scripts: Mutex::new(scripts.into()),
            attempts: AtomicUsize::new(0),
        })
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LinkConnector for ScriptedConnector {
    async fn connect(&self, endpoint: &Url) -> Result<Box<dyn RelayLink>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        match self.scripts.lock().pop_front() {
            Some(ConnectOutcome::Link(link)) => Ok(Box::new(link)),
            Some(ConnectOutcome::Fail(reason)) => {
                Err(TransportError::connect_failed(endpoint.as_str(), reason))
            }
            None => Err(TransportError::connect_failed(
                endpoint.as_str(),
                "script exhausted",
            )),
        }
    }
}

/// An in-memory link driven by the test through a [`LinkHandle`].
pub struct TestLink {
    inbound_rx: mpsc::UnboundedReceiver<Result<WireFrame, TransportError>>,
    outbound_tx: mpsc::UnboundedSender<WireFrame>,
}

/// The test's side of a [`TestLink`].
pub struct LinkHandle {
    /// Push inbound frames (or receive errors) to the client under test;
    /// dropping this sender closes the link like a peer disconnect.
    pub inbound_tx: mpsc::UnboundedSender<Result<WireFrame, TransportError>>,
    /// Frames the client under test transmitted.
    pub outbound_rx: mpsc::UnboundedReceiver<WireFrame>,
}

impl TestLink {
    pub fn pair() -> (Self, LinkHandle) {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        (
            Self {
                inbound_rx,
                outbound_tx,
            },
            LinkHandle {
                inbound_tx,
                outbound_rx,
            },
        )
    }
}

#[async_trait]
impl RelayLink for TestLink {
    async fn send(&mut self, frame: WireFrame) -> Result<(), TransportError> {
        self.outbound_tx
            .send(frame)
            .map_err(|e| TransportError::send_failed(e))
    }

    async fn next_frame(&mut self) -> Option<Result<WireFrame, TransportError>> {
        self.inbound_rx.recv().await
    }

    async fn close(&mut self) {}
}

/// Notifier that records every delivered body.
#[derive(Default)]
pub struct RecordingNotifier {
    bodies: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn count(&self) -> usize {
        self.bodies.lock().len()
    }

    pub fn bodies(&self) -> Vec<String> {
        self.bodies.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _title: &str, body: &str) {
        self.bodies.lock().push(body.to_string());
    }
}

/// Polls `cond` until it holds or a short deadline passes.
pub async fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..400 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}
