//! Proxy subsystem: accept loop and per-connection relay.
//!
//! # Data Flow
//! ```text
//! server.rs (accept) ──spawn per connection──▶ handler.rs
//!     handler.rs: read request
//!         → upstream::BackendPool::acquire
//!         → forward request, read response
//!         → stats::StatsTable::update → X-Bytes
//!         → http::compat::normalize → write to client
//!         → release backend in background (or close it)
//! ```
//!
//! # Design Decisions
//! - Pool and stats are service objects built once and shared via Arc
//! - No admission control and no per-connection concurrency: one request
//!   at a time per client, unbounded clients

pub mod handler;
pub mod server;

pub use handler::{handle_connection, ProxyState};
pub use server::ProxyServer;
