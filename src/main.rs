//! Relay proxy.
//!
//! Accepts HTTP/1.x clients and relays every request to one fixed origin
//! over a small pool of reused backend connections.
//!
//! ```text
//!   client ──▶ net::listener ──▶ proxy::handler ──▶ upstream::pool ──▶ origin
//!                                      │
//!                                      ├── stats (X-Bytes)
//!                                      └── http::compat
//! ```

use clap::Parser;
use std::path::PathBuf;

use relay_proxy::config::{self, validation::validate_config, ConfigError, ProxyConfig};
use relay_proxy::lifecycle::{signals, startup, Shutdown};
use relay_proxy::observability::logging;

#[derive(Debug, Parser)]
#[command(name = "relay-proxy")]
#[command(about = "HTTP/1.x relay proxy with a pooled origin connection set", long_about = None)]
struct Cli {
    /// TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(long)]
    listen: Option<String>,

    /// Override `origin.address`.
    #[arg(long)]
    origin: Option<String>,
}

fn load(cli: &Cli) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(listen) = &cli.listen {
        config.listener.bind_address = listen.clone();
    }
    if let Some(origin) = &cli.origin {
        config.origin.address = origin.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load(&cli)?;

    logging::init(&config.observability.log_level);
    tracing::info!("relay-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        origin = %config.origin.address,
        pool_capacity = config.pool.capacity,
        acquire_wait_ms = config.pool.acquire_wait_ms,
        release_wait_ms = config.pool.release_wait_ms,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    signals::trigger_on_signal(shutdown.clone());

    startup::run(config, &shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
