//! GuardLink CLI
//!
//! Command-line harness for the GuardLink location/SOS synchronization
//! core. Runs either protocol role against a live relay for field testing.
//!
//! # Usage
//!
//! ```bash
//! # Run the tracked-user side with a simulated position source
//! guardlink track --relay wss://relay.example --interval 5
//!
//! # Run the family side and print broadcasts as they arrive
//! guardlink observe --relay wss://relay.example
//!
//! # Raise an SOS from the tracker by typing "sos" + Enter
//! ```

use clap::{Args, Parser, Subcommand};

pub mod session;

/// GuardLink Command Line Interface
#[derive(Parser, Debug)]
#[command(name = "guardlink")]
#[command(author, version, about = "Live location and SOS synchronization client")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the tracked-user role (uploads location, can raise SOS)
    Track(TrackArgs),

    /// Run the family-observer role (consumes broadcasts, can clear SOS)
    Observe(ObserveArgs),

    /// Display version information
    Version,
}

/// Arguments for the track command
#[derive(Args, Debug)]
pub struct TrackArgs {
    /// Relay WebSocket base URL
    #[arg(short, long)]
    pub relay: url::Url,

    /// Client identifier (a fresh UUID when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// Location upload interval in seconds
    #[arg(short, long, default_value = "5")]
    pub interval: u64,

    /// Starting latitude for the simulated position source
    #[arg(long, default_value = "24.15")]
    pub lat: f64,

    /// Starting longitude for the simulated position source
    #[arg(long, default_value = "120.67")]
    pub lng: f64,
}

/// Arguments for the observe command
#[derive(Args, Debug)]
pub struct ObserveArgs {
    /// Relay WebSocket base URL
    #[arg(short, long)]
    pub relay: url::Url,

    /// Client identifier (a fresh UUID when omitted)
    #[arg(long)]
    pub id: Option<String>,

    /// HTTP fallback base URL; when set, poll instead of using the socket
    #[arg(long)]
    pub fallback: Option<url::Url>,
}
