//! Read-only admin endpoint.
//!
//! Exposes the stats table and pool occupancy as JSON behind bearer-token
//! auth, on its own listener.

pub mod auth;
pub mod handlers;

use axum::{middleware, routing::get, Router};
use std::sync::Arc;
use tokio::net::TcpListener;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::stats::StatsTable;
use crate::upstream::BackendPool;

/// State shared with admin handlers.
#[derive(Debug, Clone)]
pub struct AdminState {
    pub pool: Arc<BackendPool>,
    pub stats: Arc<StatsTable>,
    pub api_key: String,
}

pub fn setup_admin_router(state: AdminState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/pool", get(get_pool))
        .route("/admin/stats", get(get_stats))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Bind `bind_address` and serve the admin router until the task is dropped.
pub async fn serve(bind_address: &str, state: AdminState) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Admin endpoint listening");
    axum::serve(listener, setup_admin_router(state)).await
}
