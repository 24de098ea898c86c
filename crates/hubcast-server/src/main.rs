//! # Hubcast Server
//!
//! Real-time chat broadcast hub.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! hubcast
//!
//! # Run with a config file at one of the default paths
//! # (hubcast.toml, /etc/hubcast/hubcast.toml, ~/.config/hubcast/hubcast.toml)
//!
//! # Run with environment variables
//! HUBCAST_PORT=8080 HUBCAST_HOST=0.0.0.0 hubcast
//! ```

mod config;
mod handlers;
mod metrics;
mod store;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hubcast=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    tracing::info!("Starting hubcast server on {}:{}", config.host, config.port);

    // Initialize metrics
    metrics::init_metrics();

    // Start the server
    handlers::run_server(config).await?;

    Ok(())
}
