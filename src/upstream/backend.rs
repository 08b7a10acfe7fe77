//! Backend connection abstraction.
//!
//! # Responsibilities
//! - Own one live TCP connection to the origin
//! - Provide buffered read and write halves over it
//! - Carry a unique ID for tracing and ownership checks
//!
//! A `Backend` is deliberately not `Clone`: it lives either in the pool's idle
//! queue or in exactly one connection handler, and moves between them by value.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncWriteExt, BufReader, BufWriter};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::observability::metrics;

/// Global atomic counter for backend IDs.
static BACKEND_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a backend connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendId(u64);

impl BackendId {
    fn next() -> Self {
        Self(BACKEND_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "backend-{}", self.0)
    }
}

/// A live connection to the origin with buffered I/O.
#[derive(Debug)]
pub struct Backend {
    id: BackendId,
    peer: SocketAddr,
    /// Buffered read side; responses are parsed from here.
    pub reader: BufReader<OwnedReadHalf>,
    /// Buffered write side; requests are serialized into here.
    pub writer: BufWriter<OwnedWriteHalf>,
}

impl Backend {
    /// Wrap a freshly dialed stream.
    pub fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        // Small request/response exchanges; don't let Nagle hold them back.
        let _ = stream.set_nodelay(true);
        let (read_half, write_half) = stream.into_split();
        Self {
            id: BackendId::next(),
            peer,
            reader: BufReader::new(read_half),
            writer: BufWriter::new(write_half),
        }
    }

    pub fn id(&self) -> BackendId {
        self.id
    }

    /// Origin address this backend is connected to.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Shut down the write side and drop the connection.
    pub async fn close(mut self, reason: &'static str) {
        let _ = self.writer.shutdown().await;
        metrics::record_backend_closed(reason);
        tracing::debug!(backend_id = %self.id, reason, "Backend closed");
    }
}
