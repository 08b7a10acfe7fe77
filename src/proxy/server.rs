//! Proxy server: the accept loop.
//!
//! # Responsibilities
//! - Build the shared services (pool, stats table) once from config
//! - Accept client connections and spawn one handler task per connection
//! - Start the optional admin endpoint
//! - Stop accepting when the shutdown signal fires

use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::admin;
use crate::config::ProxyConfig;
use crate::http::Limits;
use crate::net::{ClientTracker, Listener};
use crate::proxy::handler::{handle_connection, ProxyState};
use crate::stats::StatsTable;
use crate::upstream::{BackendPool, DialError, Origin};

/// The relay proxy.
pub struct ProxyServer {
    config: ProxyConfig,
    state: ProxyState,
    tracker: ClientTracker,
}

impl ProxyServer {
    /// Create a new proxy server with the given configuration.
    pub fn new(config: ProxyConfig) -> Result<Self, DialError> {
        let origin = Origin::from_config(&config.origin)?;
        let pool = Arc::new(BackendPool::new(origin, &config.pool));
        let state = ProxyState {
            pool,
            stats: Arc::new(StatsTable::new()),
            limits: Limits::from(&config.limits),
        };

        Ok(Self {
            config,
            state,
            tracker: ClientTracker::new(),
        })
    }

    /// Shared services, for inspection.
    pub fn state(&self) -> &ProxyState {
        &self.state
    }

    /// Live client connection tracker.
    pub fn tracker(&self) -> &ClientTracker {
        &self.tracker
    }

    /// Run the accept loop until `shutdown` fires (or its sender is dropped).
    ///
    /// Connections still open at that point are abandoned, along with any
    /// backends they hold.
    pub async fn run(self, listener: Listener, mut shutdown: broadcast::Receiver<()>) {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(
                address = %addr,
                origin = %self.state.pool.origin().addr(),
                pool_capacity = self.state.pool.capacity(),
                "Proxy server starting"
            );
        }

        if self.config.admin.enabled {
            let admin_state = admin::AdminState {
                pool: self.state.pool.clone(),
                stats: self.state.stats.clone(),
                api_key: self.config.admin.api_key.clone(),
            };
            let bind_address = self.config.admin.bind_address.clone();
            tokio::spawn(async move {
                if let Err(e) = admin::serve(&bind_address, admin_state).await {
                    tracing::error!(address = %bind_address, error = %e, "Admin endpoint failed");
                }
            });
        }

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let session = self.tracker.admit(peer);
                        let state = self.state.clone();
                        let span = tracing::info_span!(
                            "connection",
                            client_id = %session.id(),
                            peer = %peer
                        );
                        tokio::spawn(
                            async move {
                                let _session = session;
                                handle_connection(stream, state).await;
                            }
                            .instrument(span),
                        );
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Accept failed");
                    }
                },
            }
        }

        tracing::info!(
            open_connections = self.tracker.active(),
            accepted = self.tracker.accepted(),
            "Proxy server stopped"
        );
    }
}
