//! Client connection bookkeeping.
//!
//! Every accepted client gets a [`ClientSession`] for as long as its
//! handler task runs. The session carries the id used in the connection
//! span and keeps the live-connection gauge current.

use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::observability::metrics;

static NEXT_CLIENT_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id of an accepted client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(u64);

impl ClientId {
    fn next() -> Self {
        Self(NEXT_CLIENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

#[derive(Debug, Default)]
struct Counters {
    active: AtomicU64,
    accepted: AtomicU64,
}

/// Counts live and total accepted client connections.
#[derive(Debug, Clone, Default)]
pub struct ClientTracker {
    counters: Arc<Counters>,
}

impl ClientTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a freshly accepted client. The session unregisters on drop.
    pub fn admit(&self, peer: SocketAddr) -> ClientSession {
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        let active = self.counters.active.fetch_add(1, Ordering::SeqCst) + 1;
        metrics::record_active_connections(active);
        ClientSession {
            counters: Arc::clone(&self.counters),
            id: ClientId::next(),
            peer,
            opened: Instant::now(),
        }
    }

    /// Clients whose handler is still running.
    pub fn active(&self) -> u64 {
        self.counters.active.load(Ordering::SeqCst)
    }

    /// Clients accepted since startup.
    pub fn accepted(&self) -> u64 {
        self.counters.accepted.load(Ordering::Relaxed)
    }
}

/// Registration of one live client connection.
#[derive(Debug)]
pub struct ClientSession {
    counters: Arc<Counters>,
    id: ClientId,
    peer: SocketAddr,
    opened: Instant,
}

impl ClientSession {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        let active = self.counters.active.fetch_sub(1, Ordering::SeqCst) - 1;
        metrics::record_active_connections(active);
        tracing::debug!(
            client_id = %self.id,
            peer = %self.peer,
            duration_ms = self.opened.elapsed().as_millis() as u64,
            "Client disconnected"
        );
    }
}
