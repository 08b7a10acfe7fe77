//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize metrics export
//! - Build the proxy (origin, pool, stats)
//! - Bind the listener and run until shutdown
//!
//! # Design Decisions
//! - Fail fast: an invalid origin or a bind failure is fatal
//! - The listener binds last, so traffic only arrives once everything is ready

use thiserror::Error;

use crate::config::ProxyConfig;
use crate::lifecycle::shutdown::Shutdown;
use crate::net::{Listener, ListenerError};
use crate::observability::metrics;
use crate::proxy::ProxyServer;
use crate::upstream::DialError;

/// Fatal startup failures.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Origin(#[from] DialError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Start every subsystem and serve until `shutdown` fires.
pub async fn run(config: ProxyConfig, shutdown: &Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let server = ProxyServer::new(config.clone())?;
    let listener = Listener::bind(&config.listener).await?;

    server.run(listener, shutdown.subscribe()).await;
    Ok(())
}
