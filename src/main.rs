//! Multi-room TCP Chat Server - Entry Point
//!
//! Loads configuration, binds the listening socket and hands it to the
//! ChatServer.

use std::env;

use tokio::net::lookup_host;
use tracing::info;
use tracing_subscriber::EnvFilter;

use roomchat::{bind, serve, ServerConfig};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging with environment filter
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=roomchat=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("roomchat=info")),
        )
        .init();

    let config = ServerConfig::load()?;

    // Get bind address from command line or use configuration
    let addr = env::args().nth(1).unwrap_or_else(|| config.get_addr());
    let socket_addr = lookup_host(&addr)
        .await?
        .next()
        .ok_or_else(|| format!("Could not resolve {}", addr))?;

    // Start TCP listener
    let listener = bind(socket_addr)?;
    info!("Listening for connections on {}...", listener.local_addr()?);

    serve(listener, config).await;

    Ok(())
}
