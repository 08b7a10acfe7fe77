//! Configuration schema.
//!
//! One section per subsystem. Every field has a default, so an empty file
//! (or no file at all) yields a proxy on `0.0.0.0:8080` relaying to
//! `127.0.0.1:3003`.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Client-facing socket.
    pub listener: ListenerConfig,

    /// The single origin every request is relayed to.
    pub origin: OriginConfig,

    /// Backend connection pool settings.
    pub pool: PoolConfig,

    /// Size limits applied while parsing HTTP messages.
    pub limits: LimitsConfig,

    /// Logging and Prometheus export.
    pub observability: ObservabilityConfig,

    /// Read-only inspection endpoint.
    pub admin: AdminConfig,
}

/// Where clients connect.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// `ip:port` to accept clients on.
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Origin server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OriginConfig {
    /// Origin address (e.g., "127.0.0.1:3003").
    pub address: String,

    /// Upper bound on a single dial to the origin, in milliseconds.
    pub connect_timeout_ms: u64,
}

impl OriginConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3003".to_string(),
            connect_timeout_ms: 5_000,
        }
    }
}

/// Backend connection pool configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of idle backends kept for reuse.
    pub capacity: usize,

    /// How long `acquire` waits for an idle backend before dialing, in milliseconds.
    pub acquire_wait_ms: u64,

    /// How long `release` waits for a free slot before closing the backend, in milliseconds.
    pub release_wait_ms: u64,
}

impl PoolConfig {
    pub fn acquire_wait(&self) -> Duration {
        Duration::from_millis(self.acquire_wait_ms)
    }

    pub fn release_wait(&self) -> Duration {
        Duration::from_millis(self.release_wait_ms)
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 10,
            acquire_wait_ms: 100,
            release_wait_ms: 1_000,
        }
    }
}

/// Parser limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a request or response head (start line + headers).
    pub max_header_bytes: usize,

    /// Maximum size of a buffered request or response body.
    pub max_body_bytes: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 64 * 1024,
            max_body_bytes: 16 * 1024 * 1024, // 16MB
        }
    }
}

/// Logging and metrics.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive; `RUST_LOG` overrides it.
    pub log_level: String,

    /// Serve Prometheus metrics on `metrics_address`.
    pub metrics_enabled: bool,

    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin endpoint. Off unless explicitly enabled.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    pub enabled: bool,

    /// Expected bearer token.
    pub api_key: String,

    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // Placeholder; validation only rejects an empty key.
            api_key: "change-me".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
