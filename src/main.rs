//! echoline: a line-oriented TCP echo server
//!
//! Greets each client, echoes back every line it sends, and ends the
//! session on a blank line or disconnect.
//!
//! Features:
//! - One session task per connection; a failing session never takes down
//!   the rest of the server
//! - Timed shutdown for unattended runs, Ctrl-C for interactive ones
//! - Configuration via CLI arguments or TOML file

mod config;
mod protocol;
mod server;
mod session;

use config::Config;
use server::EchoServer;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        host = %config.host,
        port = config.port,
        run_for = config.run_for,
        "Starting echoline server"
    );

    let server = EchoServer::with_host(config.host, config.port);
    server.start().await?;

    if config.run_for > 0 {
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_secs(config.run_for)) => {
                info!(seconds = config.run_for, "Run duration elapsed, shutting down");
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Ctrl-C received, shutting down");
            }
        }
    } else {
        tokio::signal::ctrl_c().await?;
        info!("Ctrl-C received, shutting down");
    }

    server.stop();
    Ok(())
}
