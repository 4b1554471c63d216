//! GuardLink CLI Entry Point
//!
//! This is the main entry point for the guardlink command-line tool.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use guardlink_cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Track(args) => {
            guardlink_cli::session::run_tracker(args).await?;
        }
        Commands::Observe(args) => {
            guardlink_cli::session::run_observer(args).await?;
        }
        Commands::Version => {
            println!("guardlink {}", env!("CARGO_PKG_VERSION"));
            println!("sync core version: {}", guardlink_sync::VERSION);
        }
    }

    Ok(())
}
