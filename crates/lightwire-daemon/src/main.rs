//! Lightwire Daemon - Main entry point
//!
//! Runs light discovery, keeps the shadow in sync and serves the HTTP and
//! WebSocket surface.

mod api;
mod config;
mod server;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

/// Quiet period after which a single scan is considered complete
const SCAN_SETTLE: Duration = Duration::from_secs(2);

#[derive(Parser, Debug)]
#[command(name = "lightwire")]
#[command(about = "Smart-light discovery and device shadow daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "lightwire.toml")]
    config: PathBuf,

    /// Bind address for web server
    #[arg(short, long)]
    bind: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Run a single discovery round and exit
    #[arg(long)]
    scan_once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Lightwire v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = config::load_config(&args.config)?;

    // Override bind address if specified
    if let Some(bind) = args.bind {
        config.daemon.bind = bind;
    }

    info!(
        type_filter = %config.discovery.type_filter,
        interval_secs = config.daemon.discovery_interval().as_secs(),
        liveness_window_secs = config.daemon.liveness_window_secs,
        "Configuration loaded"
    );
    if let Some(warning) = config.daemon.liveness_warning() {
        warn!("{}", warning);
    }

    // Create application state
    let bind = config.daemon.bind.clone();
    let (state, mut events) = state::AppState::new(config).await?;

    if args.scan_once {
        // Single scan mode
        info!("Running single discovery round");
        state.pipeline.discover();
        while let Ok(Some(event)) = timeout(SCAN_SETTLE, events.recv()).await {
            state.pipeline.handle_event(event).await;
        }

        let entries = state.pipeline.registry().entries().await;
        println!("Discovered {} resources:", entries.len());
        for entry in entries {
            println!(
                "  - {} ({}) at {}",
                entry.resource.name, entry.resource.kind, entry.resource.uri
            );
            if let Some(parent) = &entry.parent {
                println!("    Parent: {}", parent);
            }
        }

        let snapshot = state.snapshot().await;
        println!("Shadow: {} lights", snapshot.light_devices.len());
        for light in snapshot.light_devices {
            println!(
                "  - {}: {} at {}%",
                light.name,
                if light.power_on { "on" } else { "off" },
                light.brightness
            );
        }
    } else {
        // Daemon mode - run web server, discovery and sweeps
        server::run(state, events, &bind).await?;
    }

    Ok(())
}
