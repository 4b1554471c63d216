//! Session runners for the track and observe commands.
//!
//! Both runners wire the role client to a live relay, print protocol
//! activity to the console, and tear the session down cleanly on Ctrl-C.
//! The tracker uses a simulated position source (a slow walk from the
//! starting coordinate) so the protocol can be exercised without GPS
//! hardware; `sos` / `clear` typed on stdin drive the user actions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};

use guardlink_core::{
    Coordinate, GeocodeError, Heading, LocationSample, Notifier, PositionSource, ReverseGeocoder,
    SessionRole,
};
use guardlink_sync::config::SyncConfig;
use guardlink_sync::fallback::FallbackClient;
use guardlink_sync::observer::Observer;
use guardlink_sync::tracker::Tracker;
use guardlink_sync::transport::{SessionTransport, TransportConfig, WebSocketConnector};

use crate::{ObserveArgs, TrackArgs};

/// Position source that walks slowly north-east from a starting point.
///
/// Step size is ~1.5 m per sample, enough to exercise the geocode throttle
/// radius over a few minutes of runtime.
struct SimulatedWalk {
    state: Mutex<(f64, f64, f64)>,
}

impl SimulatedWalk {
    fn new(lat: f64, lng: f64) -> Self {
        Self {
            state: Mutex::new((lat, lng, 45.0)),
        }
    }
}

impl PositionSource for SimulatedWalk {
    fn latest_sample(&self) -> Option<LocationSample> {
        let mut state = self.state.lock();
        state.0 += 0.00001;
        state.1 += 0.00001;
        state.2 = (state.2 + 1.0) % 360.0;

        let coordinate = Coordinate::new(state.0, state.1).ok()?;
        let heading = Heading::new(state.2).ok();
        Some(LocationSample::new(coordinate, heading))
    }
}

/// Notifier that prints to the console.
struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, title: &str, body: &str) {
        println!("\n*** {title} ***\n{body}\n");
    }
}

/// Geocoder that labels a coordinate with its raw components.
///
/// Stands in for a real geocoding service so the observer pipeline runs
/// end-to-end without external credentials.
struct CoordinateLabelGeocoder;

#[async_trait]
impl ReverseGeocoder for CoordinateLabelGeocoder {
    async fn reverse_geocode(&self, coordinate: Coordinate) -> Result<String, GeocodeError> {
        Ok(format!("near {coordinate}"))
    }
}

fn client_id(explicit: Option<String>, role: SessionRole) -> String {
    explicit.unwrap_or_else(|| format!("{role}-{}", uuid::Uuid::new_v4()))
}

/// Runs the tracked-user role until Ctrl-C.
pub async fn run_tracker(args: TrackArgs) -> Result<()> {
    let config = SyncConfig::builder()
        .relay_url(args.relay)
        .location_interval(Duration::from_secs(args.interval))
        .build()
        .context("invalid configuration")?;

    let id = client_id(args.id, SessionRole::Tracker);
    let endpoint = config.session_endpoint(&id)?;
    println!("Connecting as tracker '{id}' to {endpoint}");

    let (transport, events) = SessionTransport::connect(
        SessionRole::Tracker,
        endpoint,
        Arc::new(WebSocketConnector),
        TransportConfig {
            reconnect_backoff: config.reconnect_backoff,
            outbound_queue: config.outbound_queue,
        },
    );
    let transport = Arc::new(transport);

    let tracker = Tracker::new(
        Arc::clone(&transport),
        Arc::new(SimulatedWalk::new(args.lat, args.lng)),
        Arc::new(ConsoleNotifier),
        config,
    );

    let event_loop = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.run_events(events).await })
    };
    let sampling_loop = {
        let tracker = tracker.clone();
        tokio::spawn(async move { tracker.run_sampling().await })
    };

    println!("Type 'sos' + Enter to raise an alert; Ctrl-C to quit.");
    let stdin_loop = {
        let tracker = tracker.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().eq_ignore_ascii_case("sos") {
                    match tracker.raise_sos() {
                        Ok(()) => println!("SOS raised"),
                        Err(error) => println!("SOS failed: {error}"),
                    }
                } else if !line.trim().is_empty() {
                    println!("unknown command: {line}");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down");
    tracker.stop_sampling();
    transport.disconnect().await;
    event_loop.abort();
    sampling_loop.abort();
    stdin_loop.abort();

    Ok(())
}

/// Runs the family-observer role until Ctrl-C.
pub async fn run_observer(args: ObserveArgs) -> Result<()> {
    let mut builder = SyncConfig::builder().relay_url(args.relay);
    if let Some(fallback) = args.fallback.clone() {
        builder = builder.fallback_url(fallback);
    }
    let config = builder.build().context("invalid configuration")?;

    let geocoder: Arc<dyn ReverseGeocoder> = Arc::new(CoordinateLabelGeocoder);
    let notifier = Arc::new(ConsoleNotifier);

    // Polling mode when a fallback URL is given and no socket is wanted.
    if let Some(fallback_url) = args.fallback {
        let client = Arc::new(FallbackClient::new(fallback_url)?);
        let observer = Observer::polling_only(geocoder, notifier, config);
        println!("Polling relay over HTTP; type 'clear' + Enter to clear an alert; Ctrl-C to quit.");

        let poll_loop = {
            let observer = observer.clone();
            let client = Arc::clone(&client);
            tokio::spawn(async move { observer.run_polling(&client).await })
        };
        let print_loop = spawn_position_printer(observer.clone());
        let stdin_loop = {
            let observer = observer.clone();
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                let mut lines = BufReader::new(tokio::io::stdin()).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if line.trim().eq_ignore_ascii_case("clear") {
                        observer.clear_alert_fallback(&client).await;
                        println!("alert cleared");
                    } else if !line.trim().is_empty() {
                        println!("unknown command: {line}");
                    }
                }
            })
        };

        tokio::signal::ctrl_c().await?;
        println!("\nShutting down");
        observer.stop_polling();
        poll_loop.abort();
        print_loop.abort();
        stdin_loop.abort();
        return Ok(());
    }

    let id = client_id(args.id, SessionRole::Observer);
    let endpoint = config.session_endpoint(&id)?;
    println!("Connecting as observer '{id}' to {endpoint}");

    let (transport, events) = SessionTransport::connect(
        SessionRole::Observer,
        endpoint,
        Arc::new(WebSocketConnector),
        TransportConfig {
            reconnect_backoff: config.reconnect_backoff,
            outbound_queue: config.outbound_queue,
        },
    );
    let transport = Arc::new(transport);

    let observer = Observer::new(Arc::clone(&transport), geocoder, notifier, config);

    let event_loop = {
        let observer = observer.clone();
        tokio::spawn(async move { observer.run_events(events).await })
    };
    let print_loop = spawn_position_printer(observer.clone());

    println!("Type 'clear' + Enter to clear an alert; Ctrl-C to quit.");
    let stdin_loop = {
        let observer = observer.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if line.trim().eq_ignore_ascii_case("clear") {
                    observer.clear_alert();
                    println!("alert cleared");
                } else if !line.trim().is_empty() {
                    println!("unknown command: {line}");
                }
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    println!("\nShutting down");
    transport.disconnect().await;
    event_loop.abort();
    print_loop.abort();
    stdin_loop.abort();

    Ok(())
}

/// Prints the target position whenever it moves.
fn spawn_position_printer(observer: Observer) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut last = None;
        loop {
            let current = observer.target_position();
            if current != last {
                if let Some(position) = current {
                    println!("target position: {position}");
                }
                last = current;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    })
}
