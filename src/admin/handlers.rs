use axum::{extract::State, Json};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::admin::AdminState;

#[derive(Debug, Serialize)]
pub struct SystemStatus {
    pub version: &'static str,
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct PoolStatus {
    pub origin: String,
    pub capacity: usize,
    pub idle: usize,
    pub acquire_wait_ms: u64,
    pub release_wait_ms: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsSummary {
    pub paths: usize,
    pub bytes: BTreeMap<String, i64>,
}

pub async fn get_status() -> Json<SystemStatus> {
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION"),
        status: "operational",
    })
}

pub async fn get_pool(State(state): State<AdminState>) -> Json<PoolStatus> {
    let pool = &state.pool;
    Json(PoolStatus {
        origin: pool.origin().addr().to_string(),
        capacity: pool.capacity(),
        idle: pool.idle_count(),
        acquire_wait_ms: pool.acquire_wait().as_millis() as u64,
        release_wait_ms: pool.release_wait().as_millis() as u64,
    })
}

pub async fn get_stats(State(state): State<AdminState>) -> Json<StatsSummary> {
    let bytes = state.stats.snapshot();
    Json(StatsSummary {
        paths: bytes.len(),
        bytes,
    })
}
