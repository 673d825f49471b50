use std::path::PathBuf;

use clap::Parser;
use fleetcast_server::ServerConfig;

/// Broker that pushes operator messages and attachments to a fleet of
/// devices over persistent sockets, queueing for the ones that are away.
#[derive(Debug, Parser)]
#[command(name = "fleetcast", version)]
struct Args {
    /// Port for the HTTP/WebSocket listener.
    #[arg(long, default_value_t = 3000)]
    port: u16,

    /// Roster file listing known device names, one per line.
    #[arg(long, default_value = "devices.roster")]
    roster: PathBuf,

    /// Directory for per-device queue files.
    #[arg(long, default_value = "queues")]
    queue_dir: PathBuf,

    /// Directory for persisted attachment uploads.
    #[arg(long, default_value = "uploads")]
    upload_dir: PathBuf,
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Starting fleetcast broker");

    let config = ServerConfig {
        port: args.port,
        roster_path: args.roster,
        queue_dir: args.queue_dir,
        upload_dir: args.upload_dir,
        ..ServerConfig::default()
    };

    let handle = fleetcast_server::start(config)
        .await
        .expect("Failed to start broker");

    tracing::info!(port = handle.port, "fleetcast broker ready");

    // Wait for shutdown signal
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to listen for ctrl+c");

    tracing::info!("Shutting down");
}
